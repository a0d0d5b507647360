//! Error taxonomy for one sell attempt.
//!
//! The first four variants are expected outcomes that the scheduler turns
//! into skips or warnings. Everything else travels as `Other`.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("no route found for {amount} lamports")]
    NoRouteFound { amount: u64 },

    #[error("swap endpoint returned no transaction payload")]
    PayloadMissing,

    #[error("transaction {signature} not confirmed within {}s", waited.as_secs())]
    ConfirmationTimeout { signature: String, waited: Duration },

    #[error("transaction {signature} failed on-chain: {reason}")]
    TransactionFailed { signature: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
