//! `MarketData` client (C1): OHLCV bars + spot price over a pluggable
//! [`Provider`], with the static fallback plan, bounded retries, and
//! interval resampling from §4.1.
//!
//! This crate owns retry/fallback/resampling policy. It does not write to
//! the database and does not know about features, triggers, or the
//! portfolio — callers hand the resulting bars to `mqk-strategy`.

pub mod provider;
pub mod resample;

use std::time::Duration;

use mqk_schemas::Bar;

pub use provider::{CoinGeckoProvider, FetchRequest, Provider};

/// One step of the static fallback plan: `(period, interval)`.
#[derive(Debug, Clone, Copy)]
pub struct FallbackStep {
    pub period: &'static str,
    pub interval: &'static str,
}

/// The fallback plan tried, in order, after the caller's requested
/// `(period, interval)` yields an empty result or an error.
pub const FALLBACK_PLAN: &[FallbackStep] = &[
    FallbackStep {
        period: "30d",
        interval: "1h",
    },
    FallbackStep {
        period: "60d",
        interval: "1d",
    },
];

const MAX_ATTEMPTS_PER_STEP: u32 = 3;
const BACKOFF_SECS_PER_ATTEMPT: f64 = 0.35;

/// Fetch-OHLCV / spot-price client wrapping a [`Provider`] with retry,
/// fallback-plan, and resampling policy.
pub struct MarketData<P: Provider> {
    provider: P,
}

impl<P: Provider> MarketData<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Fetch bars for `(symbol, period, interval)`. Tries the requested
    /// combination first; on empty/error, retries the static fallback plan.
    /// Unsupported intervals are synthesized by fetching the finest native
    /// interval that evenly divides the request and resampling up.
    /// Exhausting the plan with no data yields an empty `Vec`, not an error.
    pub async fn fetch_bars(&self, symbol: &str, period: &str, interval: &str) -> Vec<Bar> {
        if let Some(bars) = self
            .try_fetch_with_retry(symbol, period, interval)
            .await
        {
            if !bars.is_empty() {
                return bars;
            }
        }

        for step in FALLBACK_PLAN {
            if let Some(bars) = self
                .try_fetch_with_retry(symbol, step.period, step.interval)
                .await
            {
                if !bars.is_empty() {
                    return bars;
                }
            }
        }

        Vec::new()
    }

    /// Current spot price, or `0.0` on failure (never an error — an
    /// unavailable spot price is a zero-price sentinel the caller must
    /// check, not a propagated error).
    pub async fn spot_price(&self, symbol: &str) -> f64 {
        self.provider.spot_price(symbol).await.unwrap_or(0.0)
    }

    /// One `(period, interval)` attempt, with up to [`MAX_ATTEMPTS_PER_STEP`]
    /// retries and `0.35 * attempt` second backoff between them. Resamples
    /// if `interval` is not one of the provider's native intervals.
    async fn try_fetch_with_retry(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Option<Vec<Bar>> {
        let native = self.provider.native_intervals();
        let fetch_interval = if native.contains(&interval) {
            interval.to_string()
        } else {
            finest_native_interval(native, interval)?
        };

        let req = FetchRequest {
            symbol: symbol.to_string(),
            period: period.to_string(),
            interval: fetch_interval.clone(),
        };

        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS_PER_STEP {
            match self.provider.fetch_bars(&req).await {
                Ok(bars) => {
                    if fetch_interval == interval {
                        return Some(bars);
                    }
                    let target_secs = resample::interval_secs(interval)?;
                    return Some(resample::resample(&bars, target_secs));
                }
                Err(e) => {
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS_PER_STEP {
                        let backoff = Duration::from_secs_f64(BACKOFF_SECS_PER_ATTEMPT * attempt as f64);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        if let Some(e) = last_err {
            tracing::warn!(symbol, period, interval, error = %e, "market data fetch exhausted retries");
        }
        None
    }
}

/// Pick the finest provider-native interval that evenly divides `target`
/// seconds, so the caller can resample up cleanly.
fn finest_native_interval(native: &[&'static str], target: &str) -> Option<String> {
    let target_secs = resample::interval_secs(target)?;
    native
        .iter()
        .filter_map(|iv| resample::interval_secs(iv).map(|secs| (*iv, secs)))
        .filter(|(_, secs)| *secs <= target_secs && target_secs % secs == 0)
        .max_by_key(|(_, secs)| *secs)
        .map(|(iv, _)| iv.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlakyProvider {
        calls: Arc<AtomicUsize>,
        fail_first_n: usize,
        bars: Vec<Bar>,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn source_name(&self) -> &'static str {
            "flaky"
        }

        fn native_intervals(&self) -> &'static [&'static str] {
            &["1h", "1d"]
        }

        async fn fetch_bars(&self, _req: &FetchRequest) -> Result<Vec<Bar>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                return Err(anyhow::anyhow!("transient failure"));
            }
            Ok(self.bars.clone())
        }

        async fn spot_price(&self, _symbol: &str) -> Result<f64> {
            Ok(42.0)
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds_within_same_step() {
        let provider = FlakyProvider {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_first_n: 2,
            bars: vec![Bar { ts: 0, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 }],
        };
        let md = MarketData::new(provider);
        let bars = md.fetch_bars("BTC-USD", "30d", "1h").await;
        assert_eq!(bars.len(), 1);
    }

    #[tokio::test]
    async fn empty_after_all_attempts_is_not_an_error() {
        struct AlwaysEmpty;
        #[async_trait]
        impl Provider for AlwaysEmpty {
            fn source_name(&self) -> &'static str {
                "empty"
            }
            fn native_intervals(&self) -> &'static [&'static str] {
                &["1h", "1d"]
            }
            async fn fetch_bars(&self, _req: &FetchRequest) -> Result<Vec<Bar>> {
                Ok(Vec::new())
            }
            async fn spot_price(&self, _symbol: &str) -> Result<f64> {
                Ok(0.0)
            }
        }

        let md = MarketData::new(AlwaysEmpty);
        let bars = md.fetch_bars("BTC-USD", "30d", "1h").await;
        assert!(bars.is_empty());
    }

    #[test]
    fn finest_native_interval_picks_largest_divisor() {
        let native: &[&'static str] = &["1h", "1d"];
        assert_eq!(finest_native_interval(native, "2h").as_deref(), Some("1h"));
        assert_eq!(finest_native_interval(native, "1d").as_deref(), Some("1d"));
    }
}
