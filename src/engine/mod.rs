//! Core engine — the main balance → size → quote → swap → submit loop.

pub mod sizing;
pub mod submitter;
pub mod scheduler;

pub use scheduler::{AttemptOutcome, Collaborators, IterationReport, SellScheduler, SellStats, SkipReason};
pub use sizing::{FixedFraction, RandomSource, SizeDecision, Sizer};
pub use submitter::{ConfirmationPolicy, SignedTransaction, TransactionSubmitter};
