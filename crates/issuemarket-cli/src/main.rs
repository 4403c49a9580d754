use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use issuemarket_ledger::Ledgers;
use issuemarket_settlement::LncliBackend;
use tracing_subscriber::filter::LevelFilter;

mod cli;
mod commands;
mod config;
mod feedback;

fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout carries only the command's result.
    let fmt_builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal());

    // Use the compact formatter if we're in a terminal, otherwise use the JSON formatter.
    if std::io::stderr().is_terminal() {
        tracing::subscriber::set_global_default(fmt_builder.compact().finish())?;
    } else {
        tracing::subscriber::set_global_default(fmt_builder.json().finish())?;
    }

    // Exits on its own for `--help`, `--version` and invalid usage.
    let options = cli::Options::parse();

    let config = match config::load(&options.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return Ok(ExitCode::FAILURE);
        }
    };
    let ledgers = Ledgers::open(&config.ledger);
    let backend = LncliBackend::new(config.lnd.clone());

    match commands::execute(&options.command, &config, &ledgers, &backend) {
        Ok(output) => {
            println!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Ok(ExitCode::from(commands::report_failure(
            &ledgers,
            &options.command,
            &err,
        ))),
    }
}
