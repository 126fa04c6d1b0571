//! Exchange quote API client
//!
//! Batch-fetches best bid/ask and spreads for YES tokens from the CLOB-style
//! quote endpoints. No credentials are required for quote reads.

use crate::config::ExchangeConfig;
use crate::error::Result;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Best bid/ask for one token.
///
/// The upstream returns `{BUY, SELL}` price strings per token: BUY is what a
/// taker pays (the ask), SELL is what a taker receives (the bid).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenQuote {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

impl TokenQuote {
    pub fn mid(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            (Some(bid), None) => Some(bid),
            (None, Some(ask)) => Some(ask),
            (None, None) => None,
        }
    }

    pub fn ask_f64(&self) -> Option<f64> {
        self.ask.and_then(|a| a.to_f64())
    }

    /// Relative spread `(ask - bid) / mid`, when both sides are present
    pub fn spread_pct(&self) -> Option<f64> {
        let (bid, ask) = (self.bid?, self.ask?);
        let mid = (bid + ask) / Decimal::from(2);
        if mid <= Decimal::ZERO {
            return None;
        }
        ((ask - bid) / mid).to_f64()
    }
}

/// Single-market response from `GET /markets/<condition_id>`
#[derive(Debug, Clone, Deserialize)]
pub struct MarketSnapshotResponse {
    #[serde(default)]
    pub tokens: Vec<MarketToken>,
    #[serde(default)]
    pub volume: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketToken {
    pub token_id: String,
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl MarketSnapshotResponse {
    /// Locate a token by identity. Token order in the response is not
    /// meaningful and must never be used to pick the YES side.
    pub fn price_for(&self, token_id: &str) -> Option<Decimal> {
        self.tokens
            .iter()
            .find(|t| t.token_id == token_id)
            .and_then(|t| t.price)
    }
}

#[derive(Serialize)]
struct PriceRequest<'a> {
    token_id: &'a str,
    side: &'a str,
}

#[derive(Serialize)]
struct SpreadRequest<'a> {
    token_id: &'a str,
}

/// Per-token `{BUY, SELL}` price strings
#[derive(Debug, Deserialize)]
struct SidePrices {
    #[serde(rename = "BUY")]
    buy: Option<String>,
    #[serde(rename = "SELL")]
    sell: Option<String>,
}

/// Exchange quote API client
pub struct ExchangeClient {
    client: reqwest::Client,
    config: ExchangeConfig,
}

impl ExchangeClient {
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Batch-fetch best bid/ask for every token. Requests both sides per
    /// token, chunked to respect payload limits. A failed chunk is logged
    /// and skipped; partial maps are the norm, not an error.
    pub async fn batch_quotes(&self, token_ids: &[String]) -> HashMap<String, TokenQuote> {
        let mut quotes: HashMap<String, TokenQuote> = HashMap::new();

        for chunk in token_ids.chunks(self.config.price_chunk_size) {
            match self.fetch_price_chunk(chunk).await {
                Ok(partial) => quotes.extend(partial),
                Err(e) => {
                    warn!(chunk_len = chunk.len(), "Price chunk failed: {}", e);
                }
            }
        }

        debug!(
            requested = token_ids.len(),
            quoted = quotes.len(),
            "Batch quote fetch complete"
        );
        quotes
    }

    async fn fetch_price_chunk(&self, token_ids: &[String]) -> Result<HashMap<String, TokenQuote>> {
        let url = format!("{}/prices", self.config.base_url);
        let body: Vec<PriceRequest> = token_ids
            .iter()
            .flat_map(|id| {
                [
                    PriceRequest {
                        token_id: id,
                        side: "BUY",
                    },
                    PriceRequest {
                        token_id: id,
                        side: "SELL",
                    },
                ]
            })
            .collect();

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(crate::error::EdgelineError::MarketDataUnavailable(format!(
                "prices endpoint {}: {}",
                status, text
            )));
        }

        let raw: HashMap<String, SidePrices> = response.json().await?;

        let quotes = raw
            .into_iter()
            .map(|(token_id, sides)| {
                let quote = TokenQuote {
                    // BUY is the ask, SELL is the bid
                    ask: sides.buy.as_deref().and_then(parse_price),
                    bid: sides.sell.as_deref().and_then(parse_price),
                };
                (token_id, quote)
            })
            .collect();

        Ok(quotes)
    }

    /// Batch-fetch absolute spreads (in price units) per token
    pub async fn batch_spreads(&self, token_ids: &[String]) -> HashMap<String, f64> {
        let mut spreads: HashMap<String, f64> = HashMap::new();

        for chunk in token_ids.chunks(self.config.price_chunk_size) {
            match self.fetch_spread_chunk(chunk).await {
                Ok(partial) => spreads.extend(partial),
                Err(e) => {
                    warn!(chunk_len = chunk.len(), "Spread chunk failed: {}", e);
                }
            }
        }

        spreads
    }

    async fn fetch_spread_chunk(&self, token_ids: &[String]) -> Result<HashMap<String, f64>> {
        let url = format!("{}/spreads", self.config.base_url);
        let body: Vec<SpreadRequest> = token_ids
            .iter()
            .map(|id| SpreadRequest { token_id: id })
            .collect();

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(crate::error::EdgelineError::MarketDataUnavailable(format!(
                "spreads endpoint {}: {}",
                status, text
            )));
        }

        let raw: HashMap<String, String> = response.json().await?;
        Ok(raw
            .into_iter()
            .filter_map(|(id, s)| s.parse::<f64>().ok().map(|v| (id, v)))
            .collect())
    }

    /// Single-market fallback when the batch map is missing a token
    pub async fn fetch_market(&self, condition_id: &str) -> Result<MarketSnapshotResponse> {
        let url = format!("{}/markets/{}", self.config.base_url, condition_id);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(crate::error::EdgelineError::MarketDataUnavailable(format!(
                "market endpoint {} for {}: {}",
                status, condition_id, text
            )));
        }

        Ok(response.json().await?)
    }
}

fn parse_price(s: &str) -> Option<Decimal> {
    s.parse::<Decimal>().ok()
}
