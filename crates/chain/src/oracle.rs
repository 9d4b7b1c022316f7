//! Chainlink aggregator price oracle.
//!
//! Each asset maps to one aggregator contract read with `latestRoundData()`.
//! Reads share the gateway's rate gate through the common [`RpcClient`].

use async_trait::async_trait;
use binopt_core::{ChainError, FeedConfig, OracleConfig, OracleError, PriceOracle, PriceQuote};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::abi;
use crate::rpc::RpcClient;

/// Words returned by `latestRoundData()`:
/// (roundId, answer, startedAt, updatedAt, answeredInRound).
const ROUND_DATA_WORDS: usize = 5;

pub struct ChainlinkOracle {
    rpc: RpcClient,
    feeds: HashMap<String, FeedConfig>,
    max_staleness: Duration,
    selector: String,
}

impl ChainlinkOracle {
    #[must_use]
    pub fn new(rpc: RpcClient, config: &OracleConfig) -> Self {
        let feeds = config
            .feeds
            .iter()
            .map(|(asset, feed)| (asset.to_ascii_uppercase(), feed.clone()))
            .collect();

        Self {
            rpc,
            feeds,
            // Bounds beyond chrono's range mean "never stale".
            max_staleness: i64::try_from(config.max_staleness_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            selector: abi::to_hex(&abi::selector(abi::LATEST_ROUND_DATA)),
        }
    }

    #[must_use]
    pub fn assets(&self) -> Vec<&str> {
        let mut assets: Vec<&str> = self.feeds.keys().map(String::as_str).collect();
        assets.sort_unstable();
        assets
    }

    fn parse_round(
        &self,
        asset: &str,
        feed: &FeedConfig,
        data: &str,
        now: DateTime<Utc>,
    ) -> Result<PriceQuote, OracleError> {
        let words = abi::words(data).map_err(|e| OracleError::unavailable(asset, e))?;
        if words.len() < ROUND_DATA_WORDS {
            return Err(OracleError::unavailable(
                asset,
                format!("latestRoundData returned {} words", words.len()),
            ));
        }

        // int256 answer: a set top bit means a negative price.
        if words[1].chars().next().is_some_and(|c| c >= '8') {
            return Err(OracleError::unavailable(asset, "feed reported a negative answer"));
        }
        let answer = abi::word_to_u128(words[1]).map_err(|e| OracleError::unavailable(asset, e))?;
        let price = abi::fixed_to_decimal(answer, feed.decimals)
            .map_err(|e| OracleError::unavailable(asset, e))?;
        if price <= Decimal::ZERO {
            return Err(OracleError::unavailable(asset, format!("non-positive answer {price}")));
        }

        let updated_secs = abi::word_to_u128(words[3])
            .ok()
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| OracleError::unavailable(asset, "invalid updatedAt"))?;

        let age = now - updated_secs;
        if age > self.max_staleness {
            return Err(OracleError::unavailable(
                asset,
                format!("answer is stale ({}s old)", age.num_seconds()),
            ));
        }

        Ok(PriceQuote {
            asset: asset.to_string(),
            price,
            updated_at: updated_secs,
        })
    }
}

#[async_trait]
impl PriceOracle for ChainlinkOracle {
    async fn quote(&self, asset: &str) -> Result<PriceQuote, OracleError> {
        let symbol = asset.to_ascii_uppercase();
        let feed = self
            .feeds
            .get(&symbol)
            .ok_or_else(|| OracleError::unavailable(&symbol, "no price feed configured"))?;

        let data = self
            .rpc
            .eth_call(&feed.address, &self.selector)
            .await
            .map_err(|e: ChainError| {
                warn!(asset = %symbol, error = %e, "Price feed read failed");
                OracleError::unavailable(&symbol, e)
            })?;

        let quote = self.parse_round(&symbol, feed, &data, Utc::now())?;
        debug!(asset = %symbol, price = %quote.price, updated_at = %quote.updated_at, "Price quote");
        Ok(quote)
    }
}
