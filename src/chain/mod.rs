//! Network access.
//!
//! Defines the `ChainClient` trait the scheduler and submitter talk to,
//! and the JSON-RPC implementation used in production.

pub mod rpc;

use anyhow::Result;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::types::SignatureStatus;

/// The three network calls an attempt needs.
///
/// Implementors must not retry `send_raw_transaction`: a payload is
/// single-use and a second broadcast needs a fresh quote.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance of `owner` in lamports.
    async fn get_balance(&self, owner: &Pubkey) -> Result<u64>;

    /// Broadcast a signed, serialized transaction. Returns its signature.
    async fn send_raw_transaction(&self, raw: &[u8], skip_preflight: bool) -> Result<String>;

    /// Current status of `signature`, or `None` if the network has not seen it.
    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>>;
}
