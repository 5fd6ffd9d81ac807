//! Provider boundary: the pluggable upstream a [`crate::MarketData`] client
//! fetches bars and spot prices through.
//!
//! This module defines only the trait and request/response shapes plus one
//! concrete HTTP-backed provider. Retry, fallback-plan, and resampling logic
//! live in the crate root and `resample` respectively and apply uniformly to
//! any provider.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use mqk_schemas::Bar;

/// A supported OHLCV interval string, e.g. `"1h"`, `"1d"`, `"5m"`.
pub type Interval = str;

/// Parameters for one historical-bars fetch against a provider.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub symbol: String,
    /// Lookback window, e.g. `"30d"`, `"60d"`.
    pub period: String,
    pub interval: String,
}

/// Pluggable historical + spot market-data provider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Fetch bars for `req`. An empty `Vec` (not an error) signals "no data".
    async fn fetch_bars(&self, req: &FetchRequest) -> Result<Vec<Bar>>;

    /// Current spot price, or `0.0` if unavailable.
    async fn spot_price(&self, symbol: &str) -> Result<f64>;

    /// Which intervals this provider can serve directly without resampling.
    fn native_intervals(&self) -> &'static [&'static str];
}

/// CoinGecko-backed provider. Used both by the live engine (OHLCV + spot) and
/// by the benchmark exporter (daily close series, §4.9).
#[derive(Debug, Clone)]
pub struct CoinGeckoProvider {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new() -> Self {
        Self::new_with_base_url("https://api.coingecko.com/api/v3".to_string())
    }

    pub fn new_with_base_url(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Map a `BASE-QUOTE` symbol to a CoinGecko coin id. Falls back to a
    /// lowercased base asset guess when the symbol is not in the static map —
    /// CoinGecko ids are mostly lowercase project slugs, so this is right
    /// often enough to be a useful last resort rather than erroring outright.
    pub fn coin_id_for_symbol(symbol: &str) -> String {
        let base = symbol
            .split(['-', '/'])
            .next()
            .unwrap_or(symbol)
            .to_ascii_uppercase();

        static MAP: &[(&str, &str)] = &[
            ("BTC", "bitcoin"),
            ("ETH", "ethereum"),
            ("SOL", "solana"),
            ("XRP", "ripple"),
            ("ADA", "cardano"),
            ("AVAX", "avalanche-2"),
            ("DOGE", "dogecoin"),
            ("DOT", "polkadot"),
            ("LINK", "chainlink"),
            ("MATIC", "matic-network"),
            ("POL", "matic-network"),
            ("LTC", "litecoin"),
            ("UNI", "uniswap"),
            ("ATOM", "cosmos"),
            ("NEAR", "near"),
            ("APT", "aptos"),
            ("ARB", "arbitrum"),
            ("OP", "optimism"),
            ("SUI", "sui"),
            ("TON", "the-open-network"),
            ("SHIB", "shiba-inu"),
            ("PEPE", "pepe"),
        ];

        MAP.iter()
            .find(|(sym, _)| *sym == base)
            .map(|(_, id)| id.to_string())
            .unwrap_or_else(|| base.to_ascii_lowercase())
    }

    fn market_chart_url(&self, coin_id: &str) -> String {
        format!(
            "{}/coins/{}/market_chart",
            self.base_url.trim_end_matches('/'),
            coin_id
        )
    }

    fn simple_price_url(&self) -> String {
        format!("{}/simple/price", self.base_url.trim_end_matches('/'))
    }

    fn days_for_period(period: &str) -> u32 {
        period
            .trim_end_matches('d')
            .parse::<u32>()
            .unwrap_or(30)
            .max(1)
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Provider for CoinGeckoProvider {
    fn source_name(&self) -> &'static str {
        "coingecko"
    }

    fn native_intervals(&self) -> &'static [&'static str] {
        // CoinGecko's market_chart endpoint returns hourly granularity for
        // short windows and daily for long ones; we treat 1h and 1d as the
        // only natively-servable intervals and resample everything else.
        &["1h", "1d"]
    }

    async fn fetch_bars(&self, req: &FetchRequest) -> Result<Vec<Bar>> {
        let coin_id = Self::coin_id_for_symbol(&req.symbol);
        let days = Self::days_for_period(&req.period);

        let url = self.market_chart_url(&coin_id);
        let resp = self
            .http
            .get(url)
            .query(&[
                ("vs_currency", "usd"),
                ("days", days.to_string().as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("coingecko market_chart request failed for {}", req.symbol))?;

        if !resp.status().is_success() {
            return Err(anyhow!(
                "coingecko http error status={} symbol={}",
                resp.status(),
                req.symbol
            ));
        }

        let body: MarketChartResponse = resp
            .json()
            .await
            .context("coingecko market_chart json decode failed")?;

        // market_chart gives point samples, not OHLC bars; we build
        // close-only bars from consecutive price points (open = prior
        // close), which is the standard degraded-but-usable shape when the
        // upstream has no real OHLC endpoint at this granularity.
        let mut bars = Vec::with_capacity(body.prices.len());
        let mut prev_close: Option<f64> = None;
        let volumes: std::collections::HashMap<i64, f64> = body
            .total_volumes
            .iter()
            .map(|p| (p[0] as i64 / 1000, p[1]))
            .collect();

        for point in &body.prices {
            let ts_ms = point[0] as i64;
            let close = point[1];
            let ts = ts_ms / 1000;
            let open = prev_close.unwrap_or(close);
            let volume = volumes.get(&ts).copied().unwrap_or(0.0);

            bars.push(Bar {
                ts,
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume,
            });
            prev_close = Some(close);
        }

        Ok(bars)
    }

    async fn spot_price(&self, symbol: &str) -> Result<f64> {
        let coin_id = Self::coin_id_for_symbol(symbol);
        let resp = self
            .http
            .get(self.simple_price_url())
            .query(&[("ids", coin_id.as_str()), ("vs_currencies", "usd")])
            .send()
            .await
            .with_context(|| format!("coingecko simple/price request failed for {}", symbol))?;

        if !resp.status().is_success() {
            return Ok(0.0);
        }

        let body: std::collections::HashMap<String, std::collections::HashMap<String, f64>> =
            resp.json().await.unwrap_or_default();

        Ok(body
            .get(&coin_id)
            .and_then(|m| m.get("usd"))
            .copied()
            .unwrap_or(0.0))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MarketChartResponse {
    prices: Vec<[f64; 2]>,
    #[serde(default)]
    total_volumes: Vec<[f64; 2]>,
}

/// Reference timestamp used only by tests that need a stable "now".
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}
