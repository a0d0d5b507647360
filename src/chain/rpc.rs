//! Solana JSON-RPC client.
//!
//! Wraps the nonblocking `RpcClient`. Raw transactions are sent through the
//! `sendTransaction` method as base64 so the bytes broadcast are exactly
//! the bytes the submitter signed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::RpcRequest;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::ChainClient;
use crate::config::NetworkConfig;
use crate::types::{ConfirmationLevel, SignatureStatus};

pub struct SolanaRpc {
    rpc: RpcClient,
}

impl SolanaRpc {
    pub fn new(config: &NetworkConfig) -> Self {
        let rpc = RpcClient::new_with_timeout_and_commitment(
            config.rpc_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
            CommitmentConfig::confirmed(),
        );
        Self { rpc }
    }

    pub fn url(&self) -> String {
        self.rpc.url()
    }
}

/// JSON params for `sendTransaction` with a base64 payload.
fn send_params(raw: &[u8], skip_preflight: bool) -> serde_json::Value {
    serde_json::json!([
        STANDARD.encode(raw),
        {
            "encoding": "base64",
            "skipPreflight": skip_preflight,
            "preflightCommitment": "confirmed",
            "maxRetries": 0,
        }
    ])
}

#[async_trait]
impl ChainClient for SolanaRpc {
    async fn get_balance(&self, owner: &Pubkey) -> Result<u64> {
        self.rpc
            .get_balance(owner)
            .await
            .with_context(|| format!("getBalance failed for {owner}"))
    }

    async fn send_raw_transaction(&self, raw: &[u8], skip_preflight: bool) -> Result<String> {
        let signature: String = self
            .rpc
            .send(RpcRequest::SendTransaction, send_params(raw, skip_preflight))
            .await
            .context("sendTransaction failed")?;

        debug!(signature = %signature, bytes = raw.len(), skip_preflight, "Transaction broadcast");
        Ok(signature)
    }

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        let sig = Signature::from_str(signature)
            .with_context(|| format!("Invalid transaction signature: {signature}"))?;

        let response = self
            .rpc
            .get_signature_statuses(&[sig])
            .await
            .context("getSignatureStatuses failed")?;

        let status = response.value.into_iter().next().flatten().map(|s| {
            let level = if s.satisfies_commitment(CommitmentConfig::finalized()) {
                ConfirmationLevel::Finalized
            } else if s.satisfies_commitment(CommitmentConfig::confirmed()) {
                ConfirmationLevel::Confirmed
            } else {
                ConfirmationLevel::Processed
            };
            SignatureStatus {
                level,
                err: s.err.as_ref().map(|e| e.to_string()),
            }
        });

        Ok(status)
    }
}
