//! Sell scheduler — the main balance → size → quote → swap → submit loop.
//!
//! One `attempt` runs a single iteration and always returns a tagged
//! `AttemptOutcome`; it never propagates an error. `step` journals the
//! outcome, picks the cooldown from it and sleeps. `run` repeats `step`
//! forever. Nothing here can end the process.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::sizing::{RandomSource, SizeDecision, Sizer};
use super::submitter::{ConfirmationPolicy, TransactionSubmitter};
use crate::aggregator::{QuoteSource, SwapSource};
use crate::chain::ChainClient;
use crate::config::{AppConfig, TradeConfig};
use crate::error::SwapError;
use crate::journal::TradeJournal;
use crate::types::{lamports_to_sol, usdc_units_to_usdc, Confirmation, QuoteRequest, SellPhase};
use crate::wallet::WalletIdentity;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why an iteration stopped before broadcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Excess over the reserve was zero or below the dust threshold.
    NoExcess { balance: u64, excess: u64 },
    /// The aggregator found no route for `amount` lamports.
    NoRoute { amount: u64 },
    /// The swap endpoint returned no transaction.
    PayloadMissing { amount: u64 },
}

/// Result of one iteration.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Broadcast and confirmed.
    Sold {
        amount: u64,
        quoted_out: u64,
        confirmation: Confirmation,
    },
    /// Broadcast, but not confirmed inside the observation window. It may
    /// still land; it is not tracked further.
    Unconfirmed { amount: u64, signature: String },
    Skipped(SkipReason),
    /// Any other failure, with the phase it happened in.
    Failed { phase: SellPhase, error: SwapError },
}

impl AttemptOutcome {
    /// True when a transaction was broadcast.
    pub fn broadcast(&self) -> bool {
        match self {
            AttemptOutcome::Sold { .. } | AttemptOutcome::Unconfirmed { .. } => true,
            AttemptOutcome::Failed { error, .. } => {
                matches!(error, SwapError::TransactionFailed { .. })
            }
            AttemptOutcome::Skipped(_) => false,
        }
    }
}

/// Summary of a complete attempt → cooldown iteration.
#[derive(Debug)]
pub struct IterationReport {
    pub iteration: u64,
    pub outcome: AttemptOutcome,
    pub cooldown: Duration,
}

/// Running totals since startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SellStats {
    pub iterations: u64,
    pub sold: u64,
    pub unconfirmed: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Lamports in confirmed sales.
    pub lamports_sold: u64,
}

impl SellStats {
    fn record(&mut self, outcome: &AttemptOutcome) {
        match outcome {
            AttemptOutcome::Sold { amount, .. } => {
                self.sold += 1;
                self.lamports_sold += amount;
            }
            AttemptOutcome::Unconfirmed { .. } => self.unconfirmed += 1,
            AttemptOutcome::Skipped(_) => self.skipped += 1,
            AttemptOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// The external services an attempt talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainClient>,
    pub quotes: Arc<dyn QuoteSource>,
    pub swaps: Arc<dyn SwapSource>,
}

pub struct SellScheduler<R: RandomSource> {
    trade: TradeConfig,
    slippage_bps: u16,
    restrict_intermediate_tokens: bool,
    wallet: WalletIdentity,
    chain: Arc<dyn ChainClient>,
    quotes: Arc<dyn QuoteSource>,
    swaps: Arc<dyn SwapSource>,
    submitter: TransactionSubmitter,
    journal: TradeJournal,
    sizer: Sizer<R>,
    phase: SellPhase,
    stats: SellStats,
}

impl<R: RandomSource> SellScheduler<R> {
    pub fn new(
        config: &AppConfig,
        wallet: WalletIdentity,
        collaborators: Collaborators,
        journal: TradeJournal,
        rng: R,
    ) -> Self {
        let submitter = TransactionSubmitter::new(
            collaborators.chain.clone(),
            ConfirmationPolicy::from(&config.confirmation),
        );

        Self {
            trade: config.trade.clone(),
            slippage_bps: config.jupiter.slippage_bps,
            restrict_intermediate_tokens: config.jupiter.restrict_intermediate_tokens,
            wallet,
            chain: collaborators.chain,
            quotes: collaborators.quotes,
            swaps: collaborators.swaps,
            submitter,
            journal,
            sizer: Sizer::new(&config.trade, rng),
            phase: SellPhase::Idle,
            stats: SellStats::default(),
        }
    }

    pub fn phase(&self) -> SellPhase {
        self.phase
    }

    pub fn stats(&self) -> &SellStats {
        &self.stats
    }

    pub fn wallet(&self) -> &WalletIdentity {
        &self.wallet
    }

    /// Run forever. Only process termination stops this.
    pub async fn run(&mut self) {
        info!(
            wallet = %self.wallet.pubkey(),
            reserve_sol = %self.trade.reserve_sol,
            min_sol = %self.trade.min_sol,
            max_sol = %self.trade.max_sol,
            wait_min_mins = self.trade.wait_min_mins,
            wait_max_mins = self.trade.wait_max_mins,
            poll_interval_ms = self.submitter.policy().poll_interval.as_millis() as u64,
            confirm_window_ms = self.submitter.policy().max_wait.as_millis() as u64,
            "Sell loop started"
        );

        loop {
            self.step().await;
        }
    }

    /// One attempt, its journal entries, and the cooldown sleep.
    pub async fn step(&mut self) -> IterationReport {
        let outcome = self.attempt().await;
        let cooldown = self.cooldown_for(&outcome);

        self.phase = SellPhase::Cooldown;
        self.stats.record(&outcome);
        self.stats.iterations += 1;
        self.journal_outcome(&outcome, cooldown).await;

        info!(
            iteration = self.stats.iterations,
            sold = self.stats.sold,
            unconfirmed = self.stats.unconfirmed,
            skipped = self.stats.skipped,
            failed = self.stats.failed,
            total_sold_sol = %lamports_to_sol(self.stats.lamports_sold),
            cooldown_secs = cooldown.as_secs(),
            "Iteration complete"
        );

        tokio::time::sleep(cooldown).await;
        self.phase = SellPhase::Idle;

        IterationReport {
            iteration: self.stats.iterations,
            outcome,
            cooldown,
        }
    }

    /// Run one iteration up to (not including) the cooldown.
    pub async fn attempt(&mut self) -> AttemptOutcome {
        let attempt_id = Uuid::new_v4();
        debug!(%attempt_id, "Attempt started");

        match self.try_attempt().await {
            Ok(outcome) => outcome,
            Err(error) => AttemptOutcome::Failed {
                phase: self.phase,
                error,
            },
        }
    }

    /// Cooldown for `outcome`: fixed shortcuts for the two skip paths that
    /// have one, otherwise a fresh uniform draw.
    pub fn cooldown_for(&mut self, outcome: &AttemptOutcome) -> Duration {
        match outcome {
            AttemptOutcome::Skipped(SkipReason::NoExcess { .. }) => self.trade.no_excess_wait(),
            AttemptOutcome::Skipped(SkipReason::NoRoute { .. }) => self.trade.no_route_wait(),
            _ => self.sizer.cooldown(),
        }
    }

    async fn try_attempt(&mut self) -> Result<AttemptOutcome, SwapError> {
        self.phase = SellPhase::Idle;
        let owner = self.wallet.pubkey();

        let balance = self
            .chain
            .get_balance(&owner)
            .await
            .context("Failed to fetch wallet balance")?;

        self.phase = SellPhase::Sizing;
        let amount = match self.sizer.decide(balance) {
            SizeDecision::NoExcess { balance, excess } => {
                return Ok(AttemptOutcome::Skipped(SkipReason::NoExcess { balance, excess }));
            }
            SizeDecision::Sell { amount, .. } => amount,
        };

        self.journal
            .info(format!("🟢 Attempting to sell {:.9} SOL", lamports_to_sol(amount)))
            .await;

        self.phase = SellPhase::Quoting;
        let request =
            QuoteRequest::sell_sol(amount, self.slippage_bps, self.restrict_intermediate_tokens);
        let quote = match self.quotes.quote(&request).await {
            Ok(quote) => quote,
            Err(SwapError::NoRouteFound { .. }) => {
                return Ok(AttemptOutcome::Skipped(SkipReason::NoRoute { amount }));
            }
            Err(e) => return Err(e),
        };
        let quoted_out = quote.out_amount;

        self.phase = SellPhase::Building;
        let payload = match self.swaps.build_swap(quote, &owner).await {
            Ok(payload) => payload,
            Err(SwapError::PayloadMissing) => {
                return Ok(AttemptOutcome::Skipped(SkipReason::PayloadMissing { amount }));
            }
            Err(e) => return Err(e),
        };

        self.phase = SellPhase::Submitting;
        let signed = self.submitter.sign(payload, &self.wallet)?;
        let signature = self.submitter.broadcast(&signed).await?;

        self.phase = SellPhase::Confirming;
        match self.submitter.await_confirmation(&signature).await {
            Ok(confirmation) => Ok(AttemptOutcome::Sold {
                amount,
                quoted_out,
                confirmation,
            }),
            Err(SwapError::ConfirmationTimeout { signature, .. }) => {
                Ok(AttemptOutcome::Unconfirmed { amount, signature })
            }
            Err(e) => Err(e),
        }
    }

    async fn journal_outcome(&self, outcome: &AttemptOutcome, cooldown: Duration) {
        match outcome {
            AttemptOutcome::Skipped(SkipReason::NoExcess { balance, .. }) => {
                self.journal
                    .info(format!(
                        "💤 No excess SOL (balance {:.9} SOL, reserve {} SOL). Retrying in {} minutes.",
                        lamports_to_sol(*balance),
                        self.trade.reserve_sol,
                        self.trade.no_excess_wait_mins
                    ))
                    .await;
                return;
            }
            AttemptOutcome::Skipped(SkipReason::NoRoute { amount }) => {
                self.journal
                    .warn(format!(
                        "⚠️ No route found for {:.9} SOL. Retrying in {} minutes.",
                        lamports_to_sol(*amount),
                        self.trade.no_route_wait_mins
                    ))
                    .await;
                return;
            }
            AttemptOutcome::Skipped(SkipReason::PayloadMissing { .. }) => {
                self.journal
                    .warn("❌ No transaction returned from swap endpoint.")
                    .await;
            }
            AttemptOutcome::Sold {
                amount,
                quoted_out,
                confirmation,
            } => {
                self.journal
                    .info(format!(
                        "✅ Sold {:.9} SOL → USDC (~{:.2} USDC) | TX: {}",
                        lamports_to_sol(*amount),
                        usdc_units_to_usdc(*quoted_out).round_dp(2),
                        confirmation.signature
                    ))
                    .await;
            }
            AttemptOutcome::Unconfirmed { signature, .. } => {
                self.journal
                    .warn(format!("⚠️ Timeout waiting for TX: {signature}"))
                    .await;
            }
            AttemptOutcome::Failed {
                error: SwapError::TransactionFailed { signature, reason },
                ..
            } => {
                self.journal
                    .error(format!("❌ TX {signature} failed on-chain: {reason}"))
                    .await;
            }
            AttemptOutcome::Failed { phase, error } => {
                debug!(phase = %phase, "Attempt failed");
                self.journal
                    .error(format!("❌ Error occurred: {error:#}"))
                    .await;
            }
        }

        self.journal
            .info(format!(
                "🕒 Waiting {:.1} minutes until next attempt",
                cooldown.as_secs_f64() / 60.0
            ))
            .await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
