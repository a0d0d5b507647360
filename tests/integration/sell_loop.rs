//! End-to-end sell loop scenarios.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal_macros::dec;
use solana_sdk::signature::Keypair;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use incremental_sell::config::AppConfig;
use incremental_sell::engine::{
    AttemptOutcome, Collaborators, FixedFraction, RandomSource, SellScheduler, SkipReason,
};
use incremental_sell::journal::TradeJournal;
use incremental_sell::types::{SellPhase, LAMPORTS_PER_SOL};
use incremental_sell::wallet::WalletIdentity;

use crate::mock_chain::{MockAggregator, MockChain, RecordingNotifier, Settlement};

const SOL: u64 = LAMPORTS_PER_SOL;
const MINUTE: Duration = Duration::from_secs(60);

struct Fixture<R: RandomSource> {
    scheduler: SellScheduler<R>,
    chain: Arc<MockChain>,
    aggregator: Arc<MockAggregator>,
    notifier: Arc<RecordingNotifier>,
    journal_path: PathBuf,
    dir: PathBuf,
}

impl<R: RandomSource> Fixture<R> {
    fn journal_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.journal_path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl<R: RandomSource> Drop for Fixture<R> {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn fixture<R: RandomSource>(balance: u64, config: AppConfig, rng: R) -> Fixture<R> {
    let mut dir = std::env::temp_dir();
    dir.push(format!("incremental_sell_it_{}", uuid::Uuid::new_v4()));

    let wallet = WalletIdentity::new(Keypair::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let journal =
        TradeJournal::open(&dir, &wallet.pubkey().to_string(), notifier.clone()).unwrap();
    let journal_path = journal.path().to_path_buf();

    let chain = Arc::new(MockChain::new(balance));
    let aggregator = Arc::new(MockAggregator::new());
    let collaborators = Collaborators {
        chain: chain.clone(),
        quotes: aggregator.clone(),
        swaps: aggregator.clone(),
    };

    Fixture {
        scheduler: SellScheduler::new(&config, wallet, collaborators, journal, rng),
        chain,
        aggregator,
        notifier,
        journal_path,
        dir,
    }
}

#[tokio::test(start_paused = true)]
async fn test_drains_excess_down_to_reserve() {
    let mut f = fixture(SOL / 2, AppConfig::default(), FixedFraction(0.5));

    let mut sold = Vec::new();
    let report = loop {
        let report = f.scheduler.step().await;
        match report.outcome {
            AttemptOutcome::Sold { amount, .. } => sold.push(amount),
            _ => break report,
        }
        assert!(sold.len() < 10, "loop never ran out of excess");
    };

    // 0.5 → 0.35 → 0.2 → 0.1; the last sale is capped at the excess.
    assert_eq!(sold, vec![150_000_000, 150_000_000, 100_000_000]);
    assert_eq!(f.chain.balance(), SOL / 10);
    assert!(matches!(
        report.outcome,
        AttemptOutcome::Skipped(SkipReason::NoExcess { excess: 0, .. })
    ));
    assert_eq!(report.cooldown, 15 * MINUTE);
    assert_eq!(f.scheduler.stats().sold, 3);
    assert_eq!(f.scheduler.stats().lamports_sold, 400_000_000);
    assert_eq!(f.scheduler.phase(), SellPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_random_sizes_respect_range_and_reserve() {
    let mut config = AppConfig::default();
    config.trade.reserve_sol = dec!(0.25);
    config.trade.dust_threshold_sol = dec!(0.01);
    let mut f = fixture(3 * SOL, config, StdRng::seed_from_u64(42));

    for _ in 0..40 {
        let before = f.chain.balance();
        let report = f.scheduler.step().await;

        match report.outcome {
            AttemptOutcome::Sold { amount, .. } => {
                let excess = before - 250_000_000;
                assert!(amount <= excess);
                assert!(amount <= 200_000_000);
                // Only a capped sale may go below the configured minimum.
                assert!(amount >= 100_000_000 || amount == excess);
                assert!((30 * MINUTE..=60 * MINUTE).contains(&report.cooldown));
            }
            AttemptOutcome::Skipped(SkipReason::NoExcess { .. }) => {
                assert_eq!(report.cooldown, 15 * MINUTE);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(f.chain.balance() >= 250_000_000);
    }

    // Whatever is left over is below the dust threshold.
    assert!(f.chain.balance() - 250_000_000 < 10_000_000);
}

#[tokio::test(start_paused = true)]
async fn test_no_route_retries_after_five_minutes() {
    let mut f = fixture(SOL, AppConfig::default(), FixedFraction(0.0));
    f.aggregator.set_routes_available(false);

    let start = Instant::now();
    let first = f.scheduler.step().await;
    assert!(matches!(
        first.outcome,
        AttemptOutcome::Skipped(SkipReason::NoRoute { amount: 100_000_000 })
    ));
    assert_eq!(start.elapsed(), 5 * MINUTE);
    assert!(f.aggregator.swaps_built().is_empty());
    assert!(f.chain.sent().is_empty());

    f.aggregator.set_routes_available(true);
    let second = f.scheduler.step().await;
    assert!(matches!(second.outcome, AttemptOutcome::Sold { .. }));
    assert_eq!(f.aggregator.quote_requests().len(), 2);
    assert_eq!(f.chain.balance(), 900_000_000);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_is_not_rebroadcast() {
    let mut f = fixture(SOL, AppConfig::default(), FixedFraction(0.5));
    f.chain.set_settlement(Settlement::Never);

    let first = f.scheduler.step().await;
    let signature = match &first.outcome {
        AttemptOutcome::Unconfirmed { signature, .. } => signature.clone(),
        other => panic!("expected timeout, got {other:?}"),
    };
    assert_eq!(first.cooldown, 45 * MINUTE);

    f.chain.set_settlement(Settlement::AfterPolls(2));
    let second = f.scheduler.step().await;
    match &second.outcome {
        AttemptOutcome::Sold { confirmation, .. } => {
            assert_ne!(confirmation.signature, signature);
            assert_eq!(confirmation.polls, 2);
        }
        other => panic!("expected sale, got {other:?}"),
    }

    // Each iteration quoted and built its own transaction.
    assert_eq!(f.aggregator.quote_requests().len(), 2);
    assert_eq!(f.aggregator.swaps_built().len(), 2);
    assert_eq!(f.chain.sent().len(), 2);
    assert_eq!(f.chain.sent()[0], signature);
}

#[tokio::test(start_paused = true)]
async fn test_rpc_outage_does_not_stop_the_loop() {
    let mut f = fixture(SOL, AppConfig::default(), FixedFraction(0.5));
    f.chain.set_error("503 Service Unavailable");

    for _ in 0..3 {
        let report = f.scheduler.step().await;
        assert!(matches!(
            report.outcome,
            AttemptOutcome::Failed {
                phase: SellPhase::Idle,
                ..
            }
        ));
        assert_eq!(report.cooldown, 45 * MINUTE);
    }

    f.chain.clear_error();
    let report = f.scheduler.step().await;
    assert!(matches!(report.outcome, AttemptOutcome::Sold { .. }));
    assert_eq!(f.scheduler.stats().failed, 3);
    assert_eq!(f.scheduler.stats().iterations, 4);
}

#[tokio::test(start_paused = true)]
async fn test_missing_payload_skips_broadcast() {
    let mut f = fixture(SOL, AppConfig::default(), FixedFraction(0.5));
    f.aggregator.set_payload_missing(true);

    let report = f.scheduler.step().await;

    assert!(matches!(
        report.outcome,
        AttemptOutcome::Skipped(SkipReason::PayloadMissing { amount: 150_000_000 })
    ));
    assert!(f.chain.sent().is_empty());
    assert_eq!(f.chain.balance(), SOL);
}

#[tokio::test(start_paused = true)]
async fn test_journal_and_alerts_follow_the_loop() {
    let mut f = fixture(SOL / 4, AppConfig::default(), FixedFraction(0.5));

    f.scheduler.step().await;
    f.scheduler.step().await;

    let lines = f.journal_lines();
    assert_eq!(lines.len(), 4, "{lines:#?}");
    assert!(lines[0].ends_with("] 🟢 Attempting to sell 0.150000000 SOL"));
    assert!(lines[1].contains("] ✅ Sold 0.150000000 SOL → USDC (~22.50 USDC) | TX: "));
    assert!(lines[2].ends_with("] 🕒 Waiting 45.0 minutes until next attempt"));
    assert!(lines[3].contains("] 💤 No excess SOL"));
    assert!(lines.iter().all(|l| l.starts_with('[')));

    let identity = f.scheduler.wallet().pubkey().to_string();
    let messages = f.notifier.messages();
    assert_eq!(messages.len(), 4);
    assert!(messages
        .iter()
        .all(|m| m.starts_with(&format!("[{identity}] "))));
}
