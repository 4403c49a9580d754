use std::time::Duration;

use issuemarket_settlement::process::run_bounded;
use issuemarket_types::{BackendError, BackendStep, FeedbackConfig, Result};

/// Printed when the engine exits cleanly without saying anything.
pub const NO_RESPONSE: &str = "No response from the feedback engine.";

/// Run the feedback engine with `query` as its only argument and return
/// what it printed.
pub fn query(config: &FeedbackConfig, timeout: Duration, query: &str) -> Result<String> {
    let step = BackendStep::FeedbackQuery;
    let out = run_bounded(step, &config.engine_path, &[query.to_string()], timeout)?;
    if !out.status.success() {
        return Err(BackendError::Failed {
            step,
            detail: out.failure_detail(),
        }
        .into());
    }
    let response = out.stdout.trim();
    if response.is_empty() {
        return Ok(NO_RESPONSE.to_string());
    }
    Ok(response.to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use issuemarket_types::MarketError;

    use super::*;

    fn engine(dir: &Path, script: &str) -> FeedbackConfig {
        let path = dir.join("feedback_engine");
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        FeedbackConfig { engine_path: path }
    }

    #[test]
    fn passes_query_as_single_argument() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine(dir.path(), "echo \"$# args: $1\"");
        let answer = query(&config, Duration::from_secs(5), "open auctions for I1?").unwrap();
        assert_eq!(answer, "1 args: open auctions for I1?");
    }

    #[test]
    fn empty_answer_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine(dir.path(), "exit 0");
        assert_eq!(query(&config, Duration::from_secs(5), "q").unwrap(), NO_RESPONSE);
    }

    #[test]
    fn failing_engine_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine(dir.path(), "echo broken >&2; exit 2");
        let err = query(&config, Duration::from_secs(5), "q").unwrap_err();
        assert!(
            matches!(&err, MarketError::Backend(BackendError::Failed { detail, .. }) if detail.contains("broken")),
            "got {err:?}"
        );
    }

    #[test]
    fn missing_engine_is_an_error() {
        let config = FeedbackConfig {
            engine_path: "/nonexistent/feedback_engine".into(),
        };
        assert!(query(&config, Duration::from_secs(1), "q").is_err());
    }
}
