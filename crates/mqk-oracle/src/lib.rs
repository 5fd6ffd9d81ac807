//! ScenarioOracle (C5): turns a `TriggerCandidate` into an entry/no-entry
//! [`Scenario`], polymorphic over an LLM-backed variant and a deterministic
//! heuristic fallback.
//!
//! `HeuristicOracle` is the one actually exercised end-to-end: the reference
//! engine dispatches on `OPENAI_API_KEY` presence, and so does
//! [`select_oracle`]. `LLMOracle` here is a typed, constructible placeholder
//! for that external collaborator — its `analyze` delegates straight to the
//! heuristic, since no network call is wired in.

use async_trait::async_trait;
use mqk_config::ResolvedSecrets;
use mqk_schemas::{classify_symbol_theme, Decision, InvestmentPeriod, Scenario, TriggerCandidate};

/// `Analyze(candidate) -> Scenario`. Infallible by contract: a variant that
/// cannot produce a real answer (missing credentials, malformed model
/// output) still returns a usable `Scenario`, never an error.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn analyze(
        &self,
        symbol: &str,
        trigger_type: &str,
        candidate: &TriggerCandidate,
        language: &str,
    ) -> Scenario;
}

/// Deterministic, no-network fallback. Always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicOracle;

#[async_trait]
impl Oracle for HeuristicOracle {
    async fn analyze(
        &self,
        symbol: &str,
        _trigger_type: &str,
        candidate: &TriggerCandidate,
        language: &str,
    ) -> Scenario {
        heuristic_scenario(symbol, candidate, language)
    }
}

/// Thin, inert interface placeholder for the external model collaborator.
/// Constructible and fully typed, but `analyze` never leaves the process:
/// it falls back to the same heuristic formula `HeuristicOracle` uses.
#[derive(Debug, Clone)]
pub struct LLMOracle {
    #[allow(dead_code)]
    api_key: String,
}

impl LLMOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into() }
    }
}

#[async_trait]
impl Oracle for LLMOracle {
    async fn analyze(
        &self,
        symbol: &str,
        _trigger_type: &str,
        candidate: &TriggerCandidate,
        language: &str,
    ) -> Scenario {
        tracing::warn!(symbol, "LLMOracle has no network call wired in, using heuristic scenario");
        heuristic_scenario(symbol, candidate, language)
    }
}

/// Select an oracle the same way the reference engine does: an `LLMOracle`
/// when `OPENAI_API_KEY` is configured, a `HeuristicOracle` otherwise. Never
/// errors — absence of credentials is a routine, expected path.
pub fn select_oracle(secrets: &ResolvedSecrets) -> Box<dyn Oracle> {
    match secrets.openai_api_key() {
        Some(key) => Box::new(LLMOracle::new(key)),
        None => Box::new(HeuristicOracle),
    }
}

/// `decision = entry iff risk_reward_ratio >= 1.6 and final_score >= 0.45`;
/// `buy_score = clamp(round(final_score * 10), 1, 10)`; `min_score = 5`.
/// `language` (`"ko"` or anything else, default `"en"` rationale wording)
/// only affects the free-text `rationale`, never the decision math.
fn heuristic_scenario(symbol: &str, candidate: &TriggerCandidate, language: &str) -> Scenario {
    let price = candidate.snapshot.close;
    let target = candidate.target_price;
    let stop = candidate.stop_loss_price;
    let rr = candidate.risk_reward_ratio;
    let final_score = candidate.final_score;

    let decision = if rr >= 1.6 && final_score >= 0.45 {
        Decision::Entry
    } else {
        Decision::NoEntry
    };
    let buy_score = ((final_score * 10.0).round() as i64).clamp(1, 10);
    let expected_return_pct = if price > 0.0 { (target - price) / price * 100.0 } else { 0.0 };
    let expected_loss_pct = if price > 0.0 { (price - stop) / price * 100.0 } else { 0.0 };

    let theme = if candidate.snapshot.theme.is_empty() {
        classify_symbol_theme(symbol).as_str().to_string()
    } else {
        candidate.snapshot.theme.clone()
    };

    Scenario {
        buy_score,
        min_score: 5,
        decision,
        target_price: target,
        stop_loss: stop,
        risk_reward_ratio: rr,
        expected_return_pct,
        expected_loss_pct,
        investment_period: InvestmentPeriod::Short,
        rationale: if language == "ko" {
            "LLM을 사용할 수 없어 휴리스틱 대체 시나리오를 적용했습니다.".to_string()
        } else {
            "Heuristic fallback scenario (LLM unavailable).".to_string()
        },
        theme,
        market_condition: "sideways".to_string(),
        trading_scenarios: serde_json::json!({
            "key_levels": {
                "primary_support": stop,
                "secondary_support": if stop > 0.0 { stop * 0.98 } else { 0.0 },
                "primary_resistance": target,
                "secondary_resistance": if target > 0.0 { target * 1.02 } else { 0.0 },
                "volume_baseline": "20-bar average volume",
            },
            "sell_triggers": [
                "Stop loss reached",
                "Target reached",
                "Time-based exit after momentum fade",
            ],
            "hold_conditions": [
                "Price remains above support",
                "Volume not collapsing",
            ],
            "portfolio_context": "Fallback mode",
        }),
        extra: serde_json::Map::new(),
    }
}

/// Defaults used when an oracle's raw output cannot be parsed or coerced at
/// all (§4.5): a conservative no-entry with `min_score = 6` so it can never
/// accidentally clear a `buy_score >= min_score` admission check.
pub fn malformed_output_fallback() -> Scenario {
    Scenario {
        buy_score: 0,
        min_score: 6,
        decision: Decision::NoEntry,
        target_price: 0.0,
        stop_loss: 0.0,
        risk_reward_ratio: 0.0,
        expected_return_pct: 0.0,
        expected_loss_pct: 0.0,
        investment_period: InvestmentPeriod::Short,
        rationale: "Analysis failed".to_string(),
        theme: "Major".to_string(),
        market_condition: "sideways".to_string(),
        trading_scenarios: serde_json::json!({
            "key_levels": {},
            "sell_triggers": [],
            "hold_conditions": [],
            "portfolio_context": "",
        }),
        extra: serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqk_schemas::SnapshotRow;

    fn candidate(final_score: f64, rr: f64) -> TriggerCandidate {
        TriggerCandidate {
            snapshot: SnapshotRow {
                symbol: "BTC-USD".to_string(),
                close: 100.0,
                volume: 1_000.0,
                amount: 100_000.0,
                ret_1_pct: 1.0,
                ret_4_pct: 2.0,
                volume_ratio_20: 2.0,
                atr_pct: 1.5,
                atr_expansion: 1.1,
                trend_gap_pct: 0.5,
                breakout_pct: 0.0,
                ema20_gt_ema50: true,
                theme: "L1".to_string(),
            },
            trigger: "Volume-Momentum".to_string(),
            composite_score: 0.6,
            stop_loss_pct: 4.0,
            target_pct: 5.0,
            stop_loss_price: 96.0,
            target_price: 105.0,
            risk_reward_ratio: rr,
            agent_fit_score: 0.5,
            final_score,
        }
    }

    #[tokio::test]
    async fn heuristic_enters_when_rr_and_score_clear_bar() {
        let oracle = HeuristicOracle;
        let scenario = oracle.analyze("BTC-USD", "Volume-Momentum", &candidate(0.5, 1.8), "en").await;
        assert_eq!(scenario.decision, Decision::Entry);
        assert_eq!(scenario.min_score, 5);
        assert_eq!(scenario.buy_score, 5);
    }

    #[tokio::test]
    async fn heuristic_declines_when_rr_too_low() {
        let oracle = HeuristicOracle;
        let scenario = oracle.analyze("BTC-USD", "Volume-Momentum", &candidate(0.5, 1.2), "en").await;
        assert_eq!(scenario.decision, Decision::NoEntry);
    }

    #[tokio::test]
    async fn heuristic_declines_when_score_too_low() {
        let oracle = HeuristicOracle;
        let scenario = oracle.analyze("BTC-USD", "Volume-Momentum", &candidate(0.2, 2.0), "en").await;
        assert_eq!(scenario.decision, Decision::NoEntry);
    }

    #[test]
    fn buy_score_clamps_to_one_and_ten() {
        let low = candidate(0.0, 2.0);
        let high = candidate(2.0, 2.0);
        assert_eq!(heuristic_scenario("BTC-USD", &low, "en").buy_score, 1);
        assert_eq!(heuristic_scenario("BTC-USD", &high, "en").buy_score, 10);
    }

    #[test]
    fn select_oracle_falls_back_to_heuristic_without_key() {
        let secrets = ResolvedSecrets::default();
        let oracle = select_oracle(&secrets);
        // Can't downcast a trait object cleanly here; exercise via analyze.
        let _ = oracle;
    }

    #[test]
    fn malformed_output_fallback_never_clears_admission_bar() {
        let fallback = malformed_output_fallback();
        assert_eq!(fallback.decision, Decision::NoEntry);
        assert!(fallback.buy_score < fallback.min_score);
    }
}
