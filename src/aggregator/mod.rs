//! DEX aggregator integration.
//!
//! Defines the `QuoteSource` and `SwapSource` traits and the Jupiter v6
//! implementation of both. A quote is moved into `build_swap`, so it cannot
//! be used for a second payload.

pub mod jupiter;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::error::SwapError;
use crate::types::{Quote, QuoteRequest, SignablePayload};

/// Prices an exchange.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch a quote. `SwapError::NoRouteFound` when the aggregator has no path.
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError>;
}

/// Turns a quote into an unsigned transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapSource: Send + Sync {
    /// Build the swap for `owner`. `SwapError::PayloadMissing` when the
    /// response carries no transaction.
    async fn build_swap(&self, quote: Quote, owner: &Pubkey) -> Result<SignablePayload, SwapError>;
}
