//! Rotation logic (§4.6.3 steps 6): replace the weakest held position with a
//! stronger new candidate when `MAX_SLOTS` is full.

use chrono::{DateTime, Utc};
use mqk_config::PortfolioConfig;
use mqk_schemas::Holding;

use crate::exit::holding_hours;

#[derive(Debug, Clone, PartialEq)]
pub enum RotationOutcome {
    Rotate {
        target_symbol: String,
        /// `"rotation replace: {target} (score=.., pnl=..%, hold=..h) -> {new} (score=..)"`.
        reason: String,
    },
    Blocked {
        reason: String,
    },
}

struct Ranked<'a> {
    holding: &'a Holding,
    score: f64,
    profit_rate: f64,
    is_loss_priority: bool,
    hold_hours: f64,
}

/// Plan a rotation: is there a current holding weak enough, by score delta
/// and minimum holding age, to replace with `new_symbol` at `new_final_score`?
pub fn plan(
    new_symbol: &str,
    new_final_score: f64,
    holdings: &[Holding],
    now: DateTime<Utc>,
    cfg: &PortfolioConfig,
) -> RotationOutcome {
    if holdings.is_empty() {
        return RotationOutcome::Blocked { reason: "no holdings for rotation".to_string() };
    }

    let ranked: Vec<Ranked> = holdings
        .iter()
        .map(|h| {
            let profit_rate = if h.buy_price > 0.0 {
                (h.current_price - h.buy_price) / h.buy_price * 100.0
            } else {
                0.0
            };
            Ranked {
                holding: h,
                score: h.phase1_final_score,
                profit_rate,
                is_loss_priority: profit_rate <= cfg.rotation_loss_priority_pct,
                hold_hours: holding_hours(h, now),
            }
        })
        .collect();

    let eligible: Vec<&Ranked> = ranked
        .iter()
        .filter(|r| {
            new_final_score >= r.score + cfg.rotation_min_score_delta
                && r.hold_hours >= cfg.rotation_min_holding_hours
        })
        .collect();

    if eligible.is_empty() {
        let too_fresh: Vec<&Ranked> =
            ranked.iter().filter(|r| r.hold_hours < cfg.rotation_min_holding_hours).collect();
        if let Some(freshest) = too_fresh.into_iter().min_by(|a, b| a.hold_hours.total_cmp(&b.hold_hours)) {
            return RotationOutcome::Blocked {
                reason: format!(
                    "rotation blocked: min holding {:.1}h (freshest {}={:.2}h)",
                    cfg.rotation_min_holding_hours, freshest.holding.symbol, freshest.hold_hours
                ),
            };
        }
        let weakest = ranked.iter().min_by(|a, b| a.score.total_cmp(&b.score)).expect("non-empty");
        return RotationOutcome::Blocked {
            reason: format!(
                "rotation blocked: new_final={:.3} < weakest+delta ({:.3}+{:.2})",
                new_final_score, weakest.score, cfg.rotation_min_score_delta
            ),
        };
    }

    let mut eligible = eligible;
    eligible.sort_by(|a, b| {
        let key = |r: &&Ranked| (r.profit_rate >= 0.0, !r.is_loss_priority, r.profit_rate, r.score);
        let (ak, bk) = (key(a), key(b));
        ak.0.cmp(&bk.0)
            .then(ak.1.cmp(&bk.1))
            .then(ak.2.total_cmp(&bk.2))
            .then(ak.3.total_cmp(&bk.3))
    });

    let target = eligible[0];
    let reason = format!(
        "rotation replace: {} (score={:.3}, pnl={:.2}%, hold={:.1}h) -> {} (score={:.3})",
        target.holding.symbol, target.score, target.profit_rate, target.hold_hours, new_symbol, new_final_score
    );

    RotationOutcome::Rotate { target_symbol: target.holding.symbol.clone(), reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqk_schemas::TrailingState;

    fn cfg() -> PortfolioConfig {
        PortfolioConfig::default()
    }

    fn now() -> DateTime<Utc> {
        "2026-01-10T00:00:00Z".parse().unwrap()
    }

    fn holding(symbol: &str, score: f64, buy_price: f64, current_price: f64, buy_date: &str) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            asset_name: symbol.to_string(),
            buy_price,
            buy_date: buy_date.to_string(),
            quantity: 1.0,
            notional: buy_price,
            current_price,
            last_updated: buy_date.to_string(),
            phase1_final_score: score,
            trailing: TrailingState::initial(buy_price, buy_price * 0.95),
            target_price: buy_price * 1.1,
            stop_loss: buy_price * 0.95,
            trigger_type: "Volume-Momentum".to_string(),
            timeframe: "1h".to_string(),
            theme: "L1".to_string(),
            scenario: serde_json::Value::Null,
        }
    }

    #[test]
    fn blocked_when_too_fresh() {
        let holdings = vec![holding("ETH-USD", 0.3, 100.0, 100.0, "2026-01-09 23:00:00")];
        let outcome = plan("SOL-USD", 0.9, &holdings, now(), &cfg());
        match outcome {
            RotationOutcome::Blocked { reason } => assert!(reason.contains("min holding")),
            _ => panic!("expected blocked"),
        }
    }

    #[test]
    fn blocked_when_score_delta_insufficient() {
        let holdings = vec![holding("ETH-USD", 0.8, 100.0, 100.0, "2026-01-01 00:00:00")];
        let outcome = plan("SOL-USD", 0.85, &holdings, now(), &cfg());
        match outcome {
            RotationOutcome::Blocked { reason } => assert!(reason.contains("weakest+delta")),
            _ => panic!("expected blocked"),
        }
    }

    #[test]
    fn rotates_into_weakest_eligible_holding() {
        let holdings = vec![
            holding("ETH-USD", 0.3, 100.0, 100.0, "2026-01-01 00:00:00"),
            holding("SOL-USD", 0.5, 100.0, 100.0, "2026-01-01 00:00:00"),
        ];
        let outcome = plan("AVAX-USD", 0.9, &holdings, now(), &cfg());
        match outcome {
            RotationOutcome::Rotate { target_symbol, reason } => {
                assert_eq!(target_symbol, "ETH-USD");
                assert!(reason.starts_with("rotation replace: ETH-USD"));
            }
            _ => panic!("expected rotation"),
        }
    }

    #[test]
    fn prioritizes_deepest_loser_over_weaker_score() {
        // SOL has the lower score but ETH is a deep loser (-3%, below the
        // -2% loss-priority threshold) and should be sold first.
        let holdings = vec![
            holding("ETH-USD", 0.4, 100.0, 97.0, "2026-01-01 00:00:00"),
            holding("SOL-USD", 0.2, 100.0, 101.0, "2026-01-01 00:00:00"),
        ];
        let outcome = plan("AVAX-USD", 0.9, &holdings, now(), &cfg());
        match outcome {
            RotationOutcome::Rotate { target_symbol, .. } => assert_eq!(target_symbol, "ETH-USD"),
            _ => panic!("expected rotation"),
        }
    }
}
