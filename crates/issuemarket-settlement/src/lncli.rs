//! [`PaymentBackend`] over the `lncli` command-line client.
//!
//! Each call is one or a few bounded `lncli` invocations with the
//! node's TLS certificate and macaroon. Responses are JSON; anything else is
//! reported as [`BackendError::Malformed`], except `payinvoice`, whose text
//! output is kept verbatim.

use issuemarket_types::{
    BackendError, BackendStep, CreatedInvoice, InvoiceLookup, LndConfig, OpenedChannel,
    PaymentBackend, PublicKey,
};
use serde_json::{Value, json};

use crate::process::{CommandOutput, run_bounded};

/// Drives an LND node through `lncli`.
#[derive(Debug, Clone)]
pub struct LncliBackend {
    config: LndConfig,
}

impl LncliBackend {
    #[must_use]
    pub fn new(config: LndConfig) -> Self {
        Self { config }
    }

    fn args(&self, command: &[&str]) -> Vec<String> {
        let mut args = vec![
            "--tlscertpath".to_string(),
            self.config.tls_cert_path.display().to_string(),
            "--macaroonpath".to_string(),
            self.config.macaroon_path.display().to_string(),
        ];
        if let Some(rpc) = &self.config.rpc_server {
            args.extend(["--rpcserver".to_string(), rpc.clone()]);
        }
        if let Some(network) = &self.config.network {
            args.extend(["--network".to_string(), network.clone()]);
        }
        args.extend(command.iter().map(ToString::to_string));
        args
    }

    /// Run one subcommand and require a zero exit.
    fn exec(&self, step: BackendStep, command: &[&str]) -> Result<CommandOutput, BackendError> {
        tracing::debug!(%step, ?command, "lncli call");
        let out = run_bounded(
            step,
            &self.config.lncli_path,
            &self.args(command),
            self.config.timeout(),
        )?;
        if !out.status.success() {
            return Err(BackendError::Failed {
                step,
                detail: out.failure_detail(),
            });
        }
        tracing::debug!(%step, stdout = %out.stdout.trim(), "lncli response");
        Ok(out)
    }

    /// Run one subcommand and parse its JSON response.
    fn exec_json(&self, step: BackendStep, command: &[&str]) -> Result<Value, BackendError> {
        let out = self.exec(step, command)?;
        serde_json::from_str(&out.stdout).map_err(|e| BackendError::Malformed {
            step,
            reason: format!("{e}: {}", out.stdout.trim()),
        })
    }
}

fn required_str<'a>(value: &'a Value, field: &str, step: BackendStep) -> Result<&'a str, BackendError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BackendError::Malformed {
            step,
            reason: format!("response has no {field}"),
        })
}

/// A channel `close_channel` will ask `lncli` to close.
#[derive(Debug, PartialEq, Eq)]
struct CloseTarget {
    channel_point: String,
    pending: bool,
}

/// Channels with `peer` from `listchannels --peer` and `pendingchannels`,
/// restricted to `funding_txid` when given.
fn close_targets(
    listed: &Value,
    pending: &Value,
    peer: &PublicKey,
    funding_txid: Option<&str>,
) -> Vec<CloseTarget> {
    let active = listed
        .get("channels")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|c| c.get("channel_point").and_then(Value::as_str))
        .map(|point| CloseTarget {
            channel_point: point.to_string(),
            pending: false,
        });
    let opening = pending
        .get("pending_open_channels")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|p| p.get("channel"))
        .filter(|c| c.get("remote_node_pub").and_then(Value::as_str) == Some(peer.as_str()))
        .filter_map(|c| c.get("channel_point").and_then(Value::as_str))
        .map(|point| CloseTarget {
            channel_point: point.to_string(),
            pending: true,
        });

    active
        .chain(opening)
        .filter(|t| {
            funding_txid.is_none_or(|txid| t.channel_point.split(':').next() == Some(txid))
        })
        .collect()
}

impl PaymentBackend for LncliBackend {
    fn get_identity(&self) -> Result<String, BackendError> {
        let step = BackendStep::GetIdentity;
        let info = self.exec_json(step, &["getinfo"])?;
        required_str(&info, "identity_pubkey", step).map(str::to_string)
    }

    fn create_invoice(&self, amount_msat: u64, memo: &str) -> Result<CreatedInvoice, BackendError> {
        let step = BackendStep::CreateInvoice;
        let amount = amount_msat.to_string();
        let raw = self.exec_json(step, &["addinvoice", "--amt_msat", &amount, "--memo", memo])?;
        Ok(CreatedInvoice {
            payment_request: required_str(&raw, "payment_request", step)?.to_string(),
            payment_hash: required_str(&raw, "r_hash", step)?.to_string(),
            raw,
        })
    }

    fn open_channel(
        &self,
        peer: &PublicKey,
        capacity_sat: u64,
    ) -> Result<OpenedChannel, BackendError> {
        let capacity = capacity_sat.to_string();
        let raw = self.exec_json(
            BackendStep::OpenChannel,
            &["openchannel", "--node_key", peer.as_str(), "--local_amt", &capacity],
        )?;
        let funding_txid = raw
            .get("funding_txid")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(OpenedChannel { funding_txid, raw })
    }

    fn pay_invoice(&self, payment_request: &str) -> Result<Value, BackendError> {
        let out = self.exec(
            BackendStep::PayInvoice,
            &["payinvoice", "--force", "--json", payment_request],
        )?;
        Ok(serde_json::from_str(&out.stdout)
            .unwrap_or_else(|_| Value::String(out.stdout.trim().to_string())))
    }

    fn lookup_invoice(&self, payment_request: &str) -> Result<InvoiceLookup, BackendError> {
        let step = BackendStep::LookupInvoice;
        let decoded = self.exec_json(step, &["decodepayreq", payment_request])?;
        let hash = required_str(&decoded, "payment_hash", step)?;

        // The invoice lives on the payee's node; the payer only knows its
        // own payment attempts.
        let listed = self.exec_json(step, &["listpayments", "--include_incomplete"])?;
        let attempts: Vec<&Value> = listed
            .get("payments")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|p| p.get("payment_hash").and_then(Value::as_str) == Some(hash))
            .collect();
        let succeeded = attempts
            .iter()
            .find(|p| p.get("status").and_then(Value::as_str) == Some("SUCCEEDED"));
        Ok(InvoiceLookup {
            settled: succeeded.is_some(),
            raw: succeeded
                .or(attempts.last())
                .map_or(Value::Null, |p| (*p).clone()),
        })
    }

    fn close_channel(
        &self,
        peer: &PublicKey,
        funding_txid: Option<&str>,
    ) -> Result<Value, BackendError> {
        let step = BackendStep::CloseChannel;
        let listed = self.exec_json(step, &["listchannels", "--peer", peer.as_str()])?;
        let pending = self.exec_json(step, &["pendingchannels"])?;
        let targets = close_targets(&listed, &pending, peer, funding_txid);
        if targets.is_empty() {
            return Err(BackendError::Failed {
                step,
                detail: match funding_txid {
                    Some(txid) => format!("no channel with {peer} funded by {txid}"),
                    None => format!("no open or pending channel with {peer}"),
                },
            });
        }

        let mut closed = Vec::with_capacity(targets.len());
        for target in &targets {
            let mut command = vec!["closechannel", "--chan_point", target.channel_point.as_str()];
            // A channel still waiting for confirmation can only be force closed.
            if target.pending {
                command.push("--force");
            }
            closed.push(self.exec_json(step, &command)?);
        }
        Ok(json!({ "closed": closed }))
    }

    fn wallet_balance(&self) -> Result<Value, BackendError> {
        self.exec_json(BackendStep::WalletBalance, &["walletbalance"])
    }
}
