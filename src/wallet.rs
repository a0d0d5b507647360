//! Wallet identity.
//!
//! SECURITY: this is the only place the private key lives.
//! - Loaded once at startup from a Solana CLI keypair file
//! - Never serialized, never logged (`Debug` prints the public key only)
//! - Only reachable through `sign`

use anyhow::{anyhow, Context, Result};
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::signer::keypair::read_keypair_file;
use solana_sdk::transaction::VersionedTransaction;
use std::fmt;
use std::path::Path;

/// The keypair controlling the funds this process sells.
pub struct WalletIdentity {
    keypair: Keypair,
}

impl WalletIdentity {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load a keypair file (JSON array of 64 bytes).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let keypair = read_keypair_file(path)
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("Failed to load wallet from {}", path.display()))?;
        Ok(Self { keypair })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Sign `message`, replacing whatever signature placeholders it carried.
    pub fn sign(&self, message: VersionedMessage) -> Result<VersionedTransaction> {
        VersionedTransaction::try_new(message, &[&self.keypair])
            .context("Failed to sign transaction with wallet key")
    }
}

impl fmt::Debug for WalletIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletIdentity")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}
