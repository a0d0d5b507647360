//! Jupiter swap aggregator (v6 API).
//!
//! API docs: https://station.jup.ag/docs/apis/swap-api
//! Base URL: https://quote-api.jup.ag/v6
//! Auth: none for the public tier.
//!
//! `/quote` prices SOL → USDC for an exact input amount; `/swap` turns the
//! quote into an unsigned versioned transaction for our wallet. Both calls
//! are side-effect free, so 429/5xx responses are retried with backoff.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{QuoteSource, SwapSource};
use crate::config::JupiterConfig;
use crate::error::SwapError;
use crate::types::{Quote, QuoteRequest, SignablePayload};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 500;

/// `errorCode` values Jupiter uses when no path exists for the pair/amount.
const NO_ROUTE_CODES: &[&str] = &["COULD_NOT_FIND_ANY_ROUTE", "NO_ROUTES_FOUND"];

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

/// The fields of a quote response we read. The full body is kept as `Value`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteFields {
    #[serde(default)]
    input_mint: Option<String>,
    #[serde(default)]
    output_mint: Option<String>,
    /// Amounts are decimal strings.
    #[serde(default)]
    in_amount: Option<String>,
    #[serde(default)]
    out_amount: Option<String>,
    #[serde(default)]
    other_amount_threshold: Option<String>,
    #[serde(default)]
    price_impact_pct: Option<String>,
    #[serde(default)]
    route_plan: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest<'a> {
    quote_response: &'a Value,
    user_public_key: String,
    dynamic_slippage: bool,
    dynamic_compute_unit_limit: bool,
    prioritization_fee_lamports: PrioritizationFee<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrioritizationFee<'a> {
    priority_level_with_max_lamports: PriorityLevelWithMax<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PriorityLevelWithMax<'a> {
    max_lamports: u64,
    priority_level: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    #[serde(default)]
    swap_transaction: Option<String>,
    #[serde(default)]
    last_valid_block_height: Option<u64>,
    #[serde(default)]
    prioritization_fee_lamports: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct JupiterClient {
    http: Client,
    config: JupiterConfig,
}

impl JupiterClient {
    pub fn new(config: JupiterConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("incremental-sell/0.1.0")
            .build()
            .context("Failed to build HTTP client for Jupiter")?;

        Ok(Self { http, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn quote_url(&self, req: &QuoteRequest) -> String {
        format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}&restrictIntermediateTokens={}",
            self.base_url(),
            urlencoding::encode(&req.input_mint),
            urlencoding::encode(&req.output_mint),
            req.amount,
            req.slippage_bps,
            req.restrict_intermediate_tokens,
        )
    }

    fn swap_request<'a>(&'a self, quote: &'a Value, owner: &Pubkey) -> SwapRequest<'a> {
        SwapRequest {
            quote_response: quote,
            user_public_key: owner.to_string(),
            dynamic_slippage: true,
            dynamic_compute_unit_limit: true,
            prioritization_fee_lamports: PrioritizationFee {
                priority_level_with_max_lamports: PriorityLevelWithMax {
                    max_lamports: self.config.max_priority_fee_lamports,
                    priority_level: &self.config.priority_level,
                },
            },
        }
    }

    /// Send a request with retry + backoff. Returns the final status and body.
    async fn call_api<F>(&self, label: &str, make: F) -> anyhow::Result<(StatusCode, String)>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(label, attempt, delay_ms = delay, "Retrying Jupiter call");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match make().send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();

                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(label, status = %status, attempt, "Retryable Jupiter error");
                        last_error = Some(format!("HTTP {status}: {body}"));
                        continue;
                    }

                    return Ok((status, body));
                }
                Err(e) => {
                    warn!(label, attempt, error = %e, "Jupiter request failed");
                    last_error = Some(format!("Request error: {e}"));
                }
            }
        }

        Err(anyhow!(
            "Jupiter {label} failed after {MAX_RETRIES} retries: {}",
            last_error.unwrap_or_default()
        ))
    }
}

/// Interpret a successful `/quote` body.
fn parse_quote(raw: Value, requested: u64) -> Result<Quote, SwapError> {
    let fields: QuoteFields = serde_json::from_value(raw.clone())
        .context("Failed to parse Jupiter quote response")?;

    let hops = fields.route_plan.as_ref().map(Vec::len).unwrap_or(0);
    if hops == 0 {
        return Err(SwapError::NoRouteFound { amount: requested });
    }

    let in_amount = match fields.in_amount.as_deref() {
        Some(s) => parse_amount("inAmount", s)?,
        None => requested,
    };
    let out_amount = parse_amount(
        "outAmount",
        fields
            .out_amount
            .as_deref()
            .context("Jupiter quote missing outAmount")?,
    )?;
    let other_amount_threshold = match fields.other_amount_threshold.as_deref() {
        Some(s) => parse_amount("otherAmountThreshold", s)?,
        None => out_amount,
    };

    Ok(Quote {
        input_mint: fields.input_mint.unwrap_or_default(),
        output_mint: fields.output_mint.unwrap_or_default(),
        in_amount,
        out_amount,
        other_amount_threshold,
        price_impact_pct: fields.price_impact_pct,
        hops,
        raw,
    })
}

/// Interpret a non-success `/quote` response.
fn quote_error(status: StatusCode, body: &str, requested: u64) -> SwapError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|b| b.error_code.as_deref());

    if code.is_some_and(|c| NO_ROUTE_CODES.contains(&c)) {
        return SwapError::NoRouteFound { amount: requested };
    }

    let message = parsed
        .and_then(|b| b.error)
        .unwrap_or_else(|| body.to_string());
    SwapError::Other(anyhow!("Jupiter quote error {status}: {message}"))
}

/// Interpret a successful `/swap` body.
fn parse_swap(body: &str) -> Result<SignablePayload, SwapError> {
    let swap: SwapResponse =
        serde_json::from_str(body).context("Failed to parse Jupiter swap response")?;

    match swap.swap_transaction.filter(|tx| !tx.trim().is_empty()) {
        Some(transaction_base64) => Ok(SignablePayload {
            transaction_base64,
            last_valid_block_height: swap.last_valid_block_height,
            priority_fee_lamports: swap.prioritization_fee_lamports,
        }),
        None => {
            if let Some(error) = swap.error {
                warn!(error = %error, "Jupiter swap response carried an error");
            }
            Err(SwapError::PayloadMissing)
        }
    }
}

fn parse_amount(field: &str, raw: &str) -> anyhow::Result<u64> {
    raw.parse::<u64>()
        .with_context(|| format!("Jupiter quote has invalid {field}: {raw:?}"))
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl QuoteSource for JupiterClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError> {
        let url = self.quote_url(request);
        debug!(url = %url, "Requesting Jupiter quote");

        let (status, body) = self.call_api("quote", || self.http.get(&url)).await?;

        if !status.is_success() {
            return Err(quote_error(status, &body, request.amount));
        }

        let raw: Value =
            serde_json::from_str(&body).context("Jupiter quote response is not JSON")?;
        let quote = parse_quote(raw, request.amount)?;

        info!(
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            hops = quote.hops,
            price_impact = quote.price_impact_pct.as_deref().unwrap_or("?"),
            "Jupiter quote received"
        );
        Ok(quote)
    }
}

#[async_trait]
impl SwapSource for JupiterClient {
    async fn build_swap(&self, quote: Quote, owner: &Pubkey) -> Result<SignablePayload, SwapError> {
        let url = format!("{}/swap", self.base_url());
        let request = self.swap_request(&quote.raw, owner);

        let (status, body) = self
            .call_api("swap", || self.http.post(&url).json(&request))
            .await?;

        if !status.is_success() {
            return Err(SwapError::Other(anyhow!(
                "Jupiter swap error {status}: {body}"
            )));
        }

        let payload = parse_swap(&body)?;
        debug!(
            last_valid_block_height = ?payload.last_valid_block_height,
            priority_fee = ?payload.priority_fee_lamports,
            "Jupiter swap transaction built"
        );
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
