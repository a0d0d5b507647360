//! In-memory chain and aggregator for integration testing.
//!
//! `MockChain` keeps a single wallet balance and debits it when a
//! broadcast transaction carries a system transfer. `MockAggregator`
//! quotes at a fixed price and builds unsigned transfer transactions, so
//! a "swap" moves lamports out of the wallet exactly like the real thing
//! from the balance's point of view. Everything is deterministic and
//! controllable from test code.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use solana_sdk::hash::Hash;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_instruction::{self, SystemInstruction};
use solana_sdk::transaction::VersionedTransaction;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use incremental_sell::aggregator::{QuoteSource, SwapSource};
use incremental_sell::chain::ChainClient;
use incremental_sell::error::SwapError;
use incremental_sell::notify::Notifier;
use incremental_sell::types::*;

/// USDC base units paid per SOL.
pub const PRICE_USDC_UNITS_PER_SOL: u64 = 150_000_000;

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// How broadcast transactions behave once sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Confirmed after this many status polls.
    AfterPolls(u32),
    /// Never seen by the cluster.
    Never,
}

pub struct MockChain {
    balance: Arc<Mutex<u64>>,
    settlement: Arc<Mutex<Settlement>>,
    /// Signature → status polls so far.
    pending: Arc<Mutex<HashMap<String, u32>>>,
    sent: Arc<Mutex<Vec<String>>>,
    /// If set, every balance query fails with this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockChain {
    pub fn new(balance: u64) -> Self {
        Self {
            balance: Arc::new(Mutex::new(balance)),
            settlement: Arc::new(Mutex::new(Settlement::AfterPolls(1))),
            pending: Arc::new(Mutex::new(HashMap::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn balance(&self) -> u64 {
        *self.balance.lock().unwrap()
    }

    pub fn set_settlement(&self, settlement: Settlement) {
        *self.settlement.lock().unwrap() = settlement;
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Signatures of every broadcast, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn transfer_amount(tx: &VersionedTransaction) -> Result<u64> {
        let ix = tx
            .message
            .instructions()
            .first()
            .ok_or_else(|| anyhow!("transaction has no instructions"))?;
        match bincode::deserialize::<SystemInstruction>(&ix.data)? {
            SystemInstruction::Transfer { lamports } => Ok(lamports),
            other => bail!("unexpected instruction {other:?}"),
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_balance(&self, _owner: &Pubkey) -> Result<u64> {
        if let Some(ref err) = *self.force_error.lock().unwrap() {
            bail!("{err}");
        }
        Ok(self.balance())
    }

    async fn send_raw_transaction(&self, raw: &[u8], _skip_preflight: bool) -> Result<String> {
        let tx: VersionedTransaction = bincode::deserialize(raw)?;
        if !tx.verify_with_results().iter().all(|ok| *ok) {
            bail!("signature verification failed");
        }
        let signature = tx.signatures[0].to_string();

        if *self.settlement.lock().unwrap() != Settlement::Never {
            let amount = Self::transfer_amount(&tx)?;
            let mut balance = self.balance.lock().unwrap();
            *balance = balance.checked_sub(amount).ok_or_else(|| anyhow!("insufficient funds"))?;
        }

        self.pending.lock().unwrap().insert(signature.clone(), 0);
        self.sent.lock().unwrap().push(signature.clone());
        Ok(signature)
    }

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        let settlement = *self.settlement.lock().unwrap();
        let mut pending = self.pending.lock().unwrap();
        let Some(polls) = pending.get_mut(signature) else {
            return Ok(None);
        };
        *polls += 1;

        Ok(match settlement {
            Settlement::AfterPolls(n) if *polls >= n => Some(SignatureStatus {
                level: ConfirmationLevel::Confirmed,
                err: None,
            }),
            Settlement::AfterPolls(_) => Some(SignatureStatus {
                level: ConfirmationLevel::Processed,
                err: None,
            }),
            Settlement::Never => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

pub struct MockAggregator {
    pool: Pubkey,
    routes_available: Arc<Mutex<bool>>,
    payload_missing: Arc<Mutex<bool>>,
    quote_requests: Arc<Mutex<Vec<QuoteRequest>>>,
    swaps_built: Arc<Mutex<Vec<u64>>>,
}

impl MockAggregator {
    pub fn new() -> Self {
        Self {
            pool: Pubkey::new_unique(),
            routes_available: Arc::new(Mutex::new(true)),
            payload_missing: Arc::new(Mutex::new(false)),
            quote_requests: Arc::new(Mutex::new(Vec::new())),
            swaps_built: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_routes_available(&self, available: bool) {
        *self.routes_available.lock().unwrap() = available;
    }

    pub fn set_payload_missing(&self, missing: bool) {
        *self.payload_missing.lock().unwrap() = missing;
    }

    pub fn quote_requests(&self) -> Vec<QuoteRequest> {
        self.quote_requests.lock().unwrap().clone()
    }

    /// `in_amount` of every quote turned into a transaction.
    pub fn swaps_built(&self) -> Vec<u64> {
        self.swaps_built.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteSource for MockAggregator {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError> {
        self.quote_requests.lock().unwrap().push(request.clone());

        if !*self.routes_available.lock().unwrap() {
            return Err(SwapError::NoRouteFound {
                amount: request.amount,
            });
        }

        let out_amount =
            (request.amount as u128 * PRICE_USDC_UNITS_PER_SOL as u128 / LAMPORTS_PER_SOL as u128) as u64;
        Ok(Quote {
            input_mint: request.input_mint.clone(),
            output_mint: request.output_mint.clone(),
            in_amount: request.amount,
            out_amount,
            other_amount_threshold: out_amount * (10_000 - request.slippage_bps as u64) / 10_000,
            price_impact_pct: Some("0.0001".into()),
            hops: 1,
            raw: serde_json::json!({ "inAmount": request.amount.to_string() }),
        })
    }
}

#[async_trait]
impl SwapSource for MockAggregator {
    async fn build_swap(&self, quote: Quote, owner: &Pubkey) -> Result<SignablePayload, SwapError> {
        if *self.payload_missing.lock().unwrap() {
            return Err(SwapError::PayloadMissing);
        }
        self.swaps_built.lock().unwrap().push(quote.in_amount);

        let ix = system_instruction::transfer(owner, &self.pool, quote.in_amount);
        let tx = VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::Legacy(Message::new_with_blockhash(
                &[ix],
                Some(owner),
                &Hash::new_unique(),
            )),
        };
        let bytes = bincode::serialize(&tx).map_err(|e| SwapError::Other(e.into()))?;

        Ok(SignablePayload {
            transaction_base64: STANDARD.encode(bytes),
            last_valid_block_height: Some(100),
            priority_fee_lamports: Some(5_000),
        })
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Keeps every delivered message.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.sent.lock().unwrap().push(message.to_string());
    }

    fn name(&self) -> &str {
        "recording"
    }
}
