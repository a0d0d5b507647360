//! Transaction submitter.
//!
//! Signs the aggregator's unsigned transaction with the wallet key,
//! broadcasts it once, then polls the signature until it is confirmed,
//! lands with an error, or the observation window closes. A broadcast is
//! never repeated: after a timeout the transaction may still land, but it
//! is not tracked any further.

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::chain::ChainClient;
use crate::config::ConfirmationConfig;
use crate::error::SwapError;
use crate::types::{Confirmation, SignablePayload};
use crate::wallet::WalletIdentity;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How a broadcast transaction is watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub skip_preflight: bool,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
            skip_preflight: true,
        }
    }
}

impl From<&ConfirmationConfig> for ConfirmationPolicy {
    fn from(cfg: &ConfirmationConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            max_wait: Duration::from_millis(cfg.max_wait_ms),
            skip_preflight: cfg.skip_preflight,
        }
    }
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    /// The fee payer's signature, known before broadcast.
    pub signature: String,
}

// ---------------------------------------------------------------------------
// Submitter
// ---------------------------------------------------------------------------

pub struct TransactionSubmitter {
    chain: Arc<dyn ChainClient>,
    policy: ConfirmationPolicy,
}

impl TransactionSubmitter {
    pub fn new(chain: Arc<dyn ChainClient>, policy: ConfirmationPolicy) -> Self {
        Self { chain, policy }
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    /// Decode, sign and re-serialize. The payload is consumed.
    pub fn sign(
        &self,
        payload: SignablePayload,
        wallet: &WalletIdentity,
    ) -> anyhow::Result<SignedTransaction> {
        let bytes = STANDARD
            .decode(payload.transaction_base64.trim())
            .context("Swap payload is not valid base64")?;
        let unsigned: VersionedTransaction =
            bincode::deserialize(&bytes).context("Swap payload is not a versioned transaction")?;

        let signed = wallet.sign(unsigned.message)?;
        let signature = signed
            .signatures
            .first()
            .map(|s| s.to_string())
            .context("Signed transaction has no signatures")?;
        let raw = bincode::serialize(&signed).context("Failed to serialize signed transaction")?;

        Ok(SignedTransaction { raw, signature })
    }

    /// Broadcast once. Returns the signature reported by the network.
    pub async fn broadcast(&self, tx: &SignedTransaction) -> anyhow::Result<String> {
        let signature = self
            .chain
            .send_raw_transaction(&tx.raw, self.policy.skip_preflight)
            .await
            .context("Failed to broadcast transaction")?;

        if signature != tx.signature {
            warn!(
                local = %tx.signature,
                remote = %signature,
                "Network reported a different signature than the one signed"
            );
        }
        info!(signature = %signature, "Transaction broadcast");
        Ok(signature)
    }

    /// Poll until `confirmed`/`finalized` or `max_wait` elapses.
    ///
    /// Status-query failures are logged and polling continues; each query
    /// is bounded by the time left in the window, so this returns within
    /// `max_wait` whatever the network does.
    pub async fn await_confirmation(&self, signature: &str) -> Result<Confirmation, SwapError> {
        let start = Instant::now();
        let max_wait = self.policy.max_wait;
        let mut polls = 0u32;

        while start.elapsed() < max_wait {
            let remaining = max_wait.saturating_sub(start.elapsed());
            polls += 1;

            match timeout(remaining, self.chain.get_signature_status(signature)).await {
                Ok(Ok(Some(status))) if status.level.is_settled() => {
                    if let Some(reason) = status.err {
                        return Err(SwapError::TransactionFailed {
                            signature: signature.to_string(),
                            reason,
                        });
                    }
                    debug!(signature, polls, level = %status.level, "Transaction settled");
                    return Ok(Confirmation {
                        signature: signature.to_string(),
                        level: status.level,
                        polls,
                    });
                }
                Ok(Ok(status)) => {
                    debug!(signature, polls, status = ?status.map(|s| s.level), "Not settled yet");
                }
                Ok(Err(e)) => {
                    warn!(signature, polls, error = %e, "Signature status query failed");
                }
                Err(_) => break,
            }

            let remaining = max_wait.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            sleep(self.policy.poll_interval.min(remaining)).await;
        }

        Err(SwapError::ConfirmationTimeout {
            signature: signature.to_string(),
            waited: max_wait,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
