//! Shared types for the sell agent.
//!
//! These types form the data model passed between the scheduler, the
//! aggregator client, the submitter and the journal. Quotes and payloads
//! are deliberately not `Clone`: each is consumed exactly once.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Wrapped SOL mint (the asset being sold).
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const SOL_DECIMALS: u32 = 9;

/// USDC mint (the asset being bought).
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDC_DECIMALS: u32 = 6;

/// Exact SOL value of a lamport amount.
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(lamports as i128, SOL_DECIMALS)
}

/// Exact USDC value of an amount in the mint's smallest unit.
pub fn usdc_units_to_usdc(units: u64) -> Decimal {
    Decimal::from_i128_with_scale(units as i128, USDC_DECIMALS)
}

// ---------------------------------------------------------------------------
// Quote / payload
// ---------------------------------------------------------------------------

/// Parameters of a single quote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    /// Input amount in the input mint's smallest unit.
    pub amount: u64,
    pub slippage_bps: u16,
    pub restrict_intermediate_tokens: bool,
}

impl QuoteRequest {
    /// SOL → USDC for `lamports`.
    pub fn sell_sol(lamports: u64, slippage_bps: u16, restrict_intermediate_tokens: bool) -> Self {
        Self {
            input_mint: SOL_MINT.to_string(),
            output_mint: USDC_MINT.to_string(),
            amount: lamports,
            slippage_bps,
            restrict_intermediate_tokens,
        }
    }
}

/// A priced route for one (input, output, amount) triple.
///
/// `raw` is the aggregator's response verbatim; it must be echoed back
/// unchanged when building the swap.
#[derive(Debug)]
pub struct Quote {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Minimum output after slippage.
    pub other_amount_threshold: u64,
    pub price_impact_pct: Option<String>,
    /// Number of hops in the route plan.
    pub hops: usize,
    pub raw: serde_json::Value,
}

/// Unsigned, serialized transaction bound to one quote and one wallet.
#[derive(Debug)]
pub struct SignablePayload {
    /// Base64 of a bincode-serialized `VersionedTransaction`.
    pub transaction_base64: String,
    pub last_valid_block_height: Option<u64>,
    pub priority_fee_lamports: Option<u64>,
}

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

/// Commitment reached by a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl ConfirmationLevel {
    /// Confirmed or better.
    pub fn is_settled(&self) -> bool {
        *self >= ConfirmationLevel::Confirmed
    }
}

impl fmt::Display for ConfirmationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationLevel::Processed => write!(f, "processed"),
            ConfirmationLevel::Confirmed => write!(f, "confirmed"),
            ConfirmationLevel::Finalized => write!(f, "finalized"),
        }
    }
}

/// Network view of one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub level: ConfirmationLevel,
    /// On-chain execution error, if the transaction landed but failed.
    pub err: Option<String>,
}

/// A broadcast transaction that reached `confirmed` or `finalized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub signature: String,
    pub level: ConfirmationLevel,
    pub polls: u32,
}

// ---------------------------------------------------------------------------
// Scheduler phases
// ---------------------------------------------------------------------------

/// Where the scheduler is within one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SellPhase {
    Idle,
    Sizing,
    Quoting,
    Building,
    Submitting,
    Confirming,
    Cooldown,
}

impl fmt::Display for SellPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SellPhase::Idle => "idle",
            SellPhase::Sizing => "sizing",
            SellPhase::Quoting => "quoting",
            SellPhase::Building => "building",
            SellPhase::Submitting => "submitting",
            SellPhase::Confirming => "confirming",
            SellPhase::Cooldown => "cooldown",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Journal entries
// ---------------------------------------------------------------------------

/// One line of the per-wallet trade journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// `[2024-05-01T12:00:00.000Z] message`
    pub fn line(&self) -> String {
        format!(
            "[{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.message
        )
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
