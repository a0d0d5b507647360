//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` (optional) and deserializes into strongly-typed
//! structs. Every field carries a default, so a bare deployment can be
//! driven entirely by the environment variables the operator already uses
//! (`WALLET`, `PRUDENT_RESERVE`, `MIN_SOL`, ...). The webhook URL is a
//! secret and is referenced by env-var name, resolved at startup.

use anyhow::{bail, Context, Result};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::types::LAMPORTS_PER_SOL;

/// Longest wait any trade timer may be set to (one week).
pub const MAX_WAIT_MINS: f64 = 7.0 * 24.0 * 60.0;

/// Largest SOL amount that still fits in `u64` lamports.
fn max_sol_amount() -> Decimal {
    Decimal::from(u64::MAX / LAMPORTS_PER_SOL)
}

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub wallet: WalletConfig,
    pub network: NetworkConfig,
    pub jupiter: JupiterConfig,
    pub trade: TradeConfig,
    pub confirmation: ConfirmationConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WalletConfig {
    /// Path to a keypair file (JSON array of 64 bytes).
    pub path: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            path: "./wallets/wallet1.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Per-request RPC timeout.
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JupiterConfig {
    pub base_url: String,
    pub slippage_bps: u16,
    pub restrict_intermediate_tokens: bool,
    /// Ceiling for the priority fee Jupiter may attach to the swap.
    pub max_priority_fee_lamports: u64,
    /// "medium" | "high" | "veryHigh"
    pub priority_level: String,
    pub request_timeout_secs: u64,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://quote-api.jup.ag/v6".to_string(),
            slippage_bps: 50,
            restrict_intermediate_tokens: true,
            max_priority_fee_lamports: 1_000_000,
            priority_level: "veryHigh".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Sizing and pacing of the sell loop. SOL amounts are exact decimals.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TradeConfig {
    /// Balance that must never be sold (SOL).
    pub reserve_sol: Decimal,
    pub min_sol: Decimal,
    pub max_sol: Decimal,
    /// Excess below this is treated as nothing to sell (SOL).
    pub dust_threshold_sol: Decimal,
    pub wait_min_mins: f64,
    pub wait_max_mins: f64,
    /// Fixed wait after finding no excess balance.
    pub no_excess_wait_mins: f64,
    /// Fixed wait after the aggregator reports no route.
    pub no_route_wait_mins: f64,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            reserve_sol: dec!(0.1),
            min_sol: dec!(0.1),
            max_sol: dec!(0.2),
            dust_threshold_sol: dec!(0.1),
            wait_min_mins: 30.0,
            wait_max_mins: 60.0,
            no_excess_wait_mins: 15.0,
            no_route_wait_mins: 5.0,
        }
    }
}

impl TradeConfig {
    pub fn reserve_lamports(&self) -> u64 {
        sol_to_lamports(self.reserve_sol)
    }

    pub fn min_trade_lamports(&self) -> u64 {
        sol_to_lamports(self.min_sol)
    }

    pub fn max_trade_lamports(&self) -> u64 {
        sol_to_lamports(self.max_sol)
    }

    pub fn dust_threshold_lamports(&self) -> u64 {
        sol_to_lamports(self.dust_threshold_sol)
    }

    pub fn no_excess_wait(&self) -> Duration {
        minutes_to_duration(self.no_excess_wait_mins)
    }

    pub fn no_route_wait(&self) -> Duration {
        minutes_to_duration(self.no_route_wait_mins)
    }

    /// Check the range invariants. Called once at startup.
    pub fn validate(&self) -> Result<()> {
        if self.reserve_sol.is_sign_negative() {
            bail!("trade.reserve_sol must be >= 0 (got {})", self.reserve_sol);
        }
        if self.dust_threshold_sol.is_sign_negative() {
            bail!(
                "trade.dust_threshold_sol must be >= 0 (got {})",
                self.dust_threshold_sol
            );
        }
        for (name, sol) in [
            ("reserve_sol", self.reserve_sol),
            ("min_sol", self.min_sol),
            ("max_sol", self.max_sol),
            ("dust_threshold_sol", self.dust_threshold_sol),
        ] {
            if sol > max_sol_amount() {
                bail!("trade.{name} must be <= {} SOL (got {sol})", max_sol_amount());
            }
        }
        if self.min_sol.is_sign_negative() || self.min_sol > self.max_sol {
            bail!(
                "trade size range invalid: need 0 <= min_sol <= max_sol (got {}..{})",
                self.min_sol,
                self.max_sol
            );
        }
        for (name, mins) in [
            ("wait_min_mins", self.wait_min_mins),
            ("wait_max_mins", self.wait_max_mins),
            ("no_excess_wait_mins", self.no_excess_wait_mins),
            ("no_route_wait_mins", self.no_route_wait_mins),
        ] {
            if !mins.is_finite() || mins < 0.0 {
                bail!("trade.{name} must be a finite, non-negative number (got {mins})");
            }
            if mins > MAX_WAIT_MINS {
                bail!("trade.{name} must be <= {MAX_WAIT_MINS} minutes (got {mins})");
            }
        }
        if self.wait_min_mins > self.wait_max_mins {
            bail!(
                "wait range invalid: need wait_min_mins <= wait_max_mins (got {}..{})",
                self.wait_min_mins,
                self.wait_max_mins
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConfirmationConfig {
    pub poll_interval_ms: u64,
    pub max_wait_ms: u64,
    /// Broadcast without local pre-flight simulation.
    pub skip_preflight: bool,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            max_wait_ms: 60_000,
            skip_preflight: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertsConfig {
    /// Env var holding the Discord webhook URL. Unset or blank disables alerts.
    pub discord_webhook_env: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            discord_webhook_env: "DISCORD_WEBHOOK_URL".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory holding one `<pubkey>.log` journal per wallet.
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply the process environment on top of the file values.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in
    /// production, a map in tests). Blank values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("WALLET") {
            self.wallet.path = v;
        }
        if let Some(v) = get("RPC_URL") {
            self.network.rpc_url = v;
        }
        if let Some(v) = get("PRUDENT_RESERVE") {
            self.trade.reserve_sol = parse_decimal("PRUDENT_RESERVE", &v)?;
        }
        if let Some(v) = get("MIN_SOL") {
            self.trade.min_sol = parse_decimal("MIN_SOL", &v)?;
        }
        if let Some(v) = get("MAX_SOL") {
            self.trade.max_sol = parse_decimal("MAX_SOL", &v)?;
        }
        if let Some(v) = get("MIN_MINS") {
            self.trade.wait_min_mins = parse_minutes("MIN_MINS", &v)?;
        }
        if let Some(v) = get("MAX_MINS") {
            self.trade.wait_max_mins = parse_minutes("MAX_MINS", &v)?;
        }
        Ok(self)
    }

    /// Validate all sections. Any failure is a fatal startup error.
    pub fn validate(&self) -> Result<()> {
        self.trade.validate()?;

        let c = &self.confirmation;
        if c.poll_interval_ms == 0 {
            bail!("confirmation.poll_interval_ms must be > 0");
        }
        if c.max_wait_ms < c.poll_interval_ms {
            bail!(
                "confirmation.max_wait_ms ({}) must be >= poll_interval_ms ({})",
                c.max_wait_ms,
                c.poll_interval_ms
            );
        }
        if self.jupiter.slippage_bps > 10_000 {
            bail!(
                "jupiter.slippage_bps must be <= 10000 (got {})",
                self.jupiter.slippage_bps
            );
        }
        if self.wallet.path.trim().is_empty() {
            bail!("wallet.path must not be empty");
        }
        Ok(())
    }
}

/// Convert SOL to lamports, truncating sub-lamport precision.
/// Negative amounts clamp to zero, amounts beyond `u64` lamports to `u64::MAX`.
pub fn sol_to_lamports(sol: Decimal) -> u64 {
    if sol.is_sign_negative() {
        return 0;
    }
    sol.checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .and_then(|lamports| lamports.trunc().to_u64())
        .unwrap_or(u64::MAX)
}

/// Convert minutes to a `Duration`. Negative or NaN is zero; anything too
/// large for a `Duration` saturates.
pub fn minutes_to_duration(mins: f64) -> Duration {
    if mins.is_nan() || mins <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(mins * 60.0).unwrap_or(Duration::MAX)
}

fn parse_decimal(name: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .with_context(|| format!("{name} must be a decimal number (got {raw:?})"))
}

fn parse_minutes(name: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("{name} must be a number of minutes (got {raw:?})"))
}
