//! Trade sizing and pacing.
//!
//! Decides whether there is anything to sell, how much, and how long to
//! wait afterwards. All randomness comes from an injected `RandomSource`
//! so the draws are reproducible under test.

use rand::rngs::StdRng;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

use crate::config::{minutes_to_duration, TradeConfig};

// ---------------------------------------------------------------------------
// Random source
// ---------------------------------------------------------------------------

/// Uniform draws in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_fraction(&mut self) -> f64;
}

impl RandomSource for StdRng {
    fn next_fraction(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Always returns the same fraction (clamped into `[0, 1)`).
#[derive(Debug, Clone, Copy)]
pub struct FixedFraction(pub f64);

impl RandomSource for FixedFraction {
    fn next_fraction(&mut self) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

// ---------------------------------------------------------------------------
// Sizer
// ---------------------------------------------------------------------------

/// Sizing decision for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDecision {
    /// Excess below the dust threshold (or zero): nothing to sell.
    NoExcess { balance: u64, excess: u64 },
    /// Sell `amount` lamports out of `excess`.
    Sell { balance: u64, excess: u64, amount: u64 },
}

pub struct Sizer<R: RandomSource> {
    reserve: u64,
    dust_threshold: u64,
    min_trade: u64,
    max_trade: u64,
    wait_min_mins: f64,
    wait_max_mins: f64,
    rng: R,
}

impl<R: RandomSource> Sizer<R> {
    pub fn new(config: &TradeConfig, rng: R) -> Self {
        Self {
            reserve: config.reserve_lamports(),
            dust_threshold: config.dust_threshold_lamports(),
            min_trade: config.min_trade_lamports(),
            max_trade: config.max_trade_lamports(),
            wait_min_mins: config.wait_min_mins,
            wait_max_mins: config.wait_max_mins,
            rng,
        }
    }

    /// `balance - reserve`, floored at zero.
    pub fn excess(&self, balance: u64) -> u64 {
        balance.saturating_sub(self.reserve)
    }

    /// Apply the dust rule and draw a trade size capped at the excess.
    pub fn decide(&mut self, balance: u64) -> SizeDecision {
        let excess = self.excess(balance);

        // Zero excess is never tradeable, even with a zero dust threshold.
        if excess == 0 || excess < self.dust_threshold {
            return SizeDecision::NoExcess { balance, excess };
        }

        let amount = self.trade_amount(excess);
        debug!(balance, excess, amount, "Trade sized");
        SizeDecision::Sell {
            balance,
            excess,
            amount,
        }
    }

    /// `min(uniform[min, max], excess)` in lamports.
    pub fn trade_amount(&mut self, excess: u64) -> u64 {
        let span = self.max_trade.saturating_sub(self.min_trade);
        let offset = (span as f64 * self.rng.next_fraction()).floor() as u64;
        let drawn = self.min_trade + offset.min(span);
        drawn.min(excess)
    }

    /// Uniform draw in `[wait_min, wait_max]` minutes.
    pub fn cooldown(&mut self) -> Duration {
        let span = (self.wait_max_mins - self.wait_min_mins).max(0.0);
        let minutes = self.wait_min_mins + span * self.rng.next_fraction();
        minutes_to_duration(minutes.min(self.wait_max_mins).max(self.wait_min_mins))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
