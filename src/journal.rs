//! Trade journal.
//!
//! One append-only text file per wallet (`<dir>/<pubkey>.log`). Every entry
//! is also mirrored to `tracing` and forwarded to the notifier, prefixed
//! with the wallet's public key so several instances can share a channel.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn, Level};

use crate::notify::Notifier;
use crate::types::LogEntry;

pub struct TradeJournal {
    path: PathBuf,
    identity: String,
    notifier: Arc<dyn Notifier>,
}

impl TradeJournal {
    /// Open (or create on first write) the journal for `identity` under `dir`.
    pub fn open(dir: impl AsRef<Path>, identity: &str, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        Ok(Self {
            path: dir.join(format!("{identity}.log")),
            identity: identity.to_string(),
            notifier,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn info(&self, message: impl Into<String>) -> LogEntry {
        self.record(Level::INFO, message.into()).await
    }

    pub async fn warn(&self, message: impl Into<String>) -> LogEntry {
        self.record(Level::WARN, message.into()).await
    }

    pub async fn error(&self, message: impl Into<String>) -> LogEntry {
        self.record(Level::ERROR, message.into()).await
    }

    /// Append, mirror, notify. Never fails: a broken log file must not stop
    /// the sell loop.
    pub async fn record(&self, level: Level, message: String) -> LogEntry {
        let entry = LogEntry::now(message);

        if let Err(e) = self.append(&entry) {
            warn!(path = %self.path.display(), error = %e, "Failed to write journal entry");
        }

        if level == Level::ERROR {
            error!(wallet = %self.identity, "{}", entry.message);
        } else if level == Level::WARN {
            warn!(wallet = %self.identity, "{}", entry.message);
        } else {
            info!(wallet = %self.identity, "{}", entry.message);
        }

        self.notifier
            .notify(&format!("[{}] {}", self.identity, entry.message))
            .await;

        entry
    }

    fn append(&self, entry: &LogEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.line())
    }
}
