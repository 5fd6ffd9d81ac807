//! Construct `Holding`/`Watchlist` rows from a Phase-1 candidate and an
//! oracle `Scenario`, mirroring `_save_holding`/`_save_watchlist`.

use chrono::{DateTime, Utc};
use mqk_schemas::{Decision, Holding, PerformanceTrackerRow, Scenario, TrailingState, TriggerCandidate, Watchlist};

use crate::exit::BUY_DATE_FORMAT;

fn asset_name_of(symbol: &str) -> String {
    symbol.split('-').next().unwrap_or(symbol).to_ascii_uppercase()
}

/// Base `scenario` JSON plus the `phase1_*` augmentation the controller
/// persists alongside every `Holding`, used later by rotation scoring.
fn augment_scenario(scenario: &Scenario, candidate: &TriggerCandidate) -> serde_json::Value {
    let mut value = serde_json::to_value(scenario).unwrap_or(serde_json::Value::Null);
    if let serde_json::Value::Object(map) = &mut value {
        map.entry("phase1_final_score").or_insert(candidate.final_score.into());
        map.entry("phase1_composite_score").or_insert(candidate.composite_score.into());
        map.entry("phase1_risk_reward_ratio").or_insert(candidate.risk_reward_ratio.into());
        map.entry("phase1_volume_ratio_20").or_insert(candidate.snapshot.volume_ratio_20.into());
    }
    value
}

/// Write `holding.trailing`/`phase1_final_score` into `holding.scenario` as
/// top-level keys, overwriting any stale copy. The trailing-stop state lives
/// in the `scenario` JSONB blob across cycles (there is no dedicated
/// column), so every refresh must re-sync it before the row is persisted or
/// the next cycle's read would see a reset (non-trailing) state.
pub fn sync_trailing_into_scenario(holding: &mut Holding) {
    let map = match &mut holding.scenario {
        serde_json::Value::Object(map) => map,
        other => {
            *other = serde_json::Value::Object(serde_json::Map::new());
            other.as_object_mut().expect("just set to object")
        }
    };
    map.insert("phase1_final_score".to_string(), holding.phase1_final_score.into());
    map.insert("trailing_active".to_string(), holding.trailing.trailing_active.into());
    map.insert("trailing_peak_price".to_string(), holding.trailing.trailing_peak_price.into());
    map.insert("dynamic_stop_loss".to_string(), holding.trailing.dynamic_stop_loss.into());
    map.insert("trail_buffer_pct".to_string(), holding.trailing.trail_buffer_pct.into());
}

/// A fill result to apply on top of the candidate's snapshot price, or
/// `None` when the controller is not configured to execute trades.
#[derive(Debug, Clone, Copy, Default)]
pub struct FillContext {
    pub executed_price: Option<f64>,
    pub quantity: Option<f64>,
    pub quote_amount: Option<f64>,
}

/// Build a new open position. `fill` carries the paper exchange's fill
/// result, or is left `Default` when trades are not executed (paper-tracking
/// only — `buy_price`/`current_price` then fall back to the candidate's
/// snapshot close).
pub fn build_holding(
    symbol: &str,
    trigger_type: &str,
    timeframe: &str,
    candidate: &TriggerCandidate,
    scenario: &Scenario,
    fill: FillContext,
    now: DateTime<Utc>,
) -> Holding {
    let fallback_price = candidate.snapshot.close;
    let exec_price = fill.executed_price.unwrap_or(fallback_price);
    let current_price = if exec_price > 0.0 { exec_price } else { fallback_price };
    let stamp = now.format(BUY_DATE_FORMAT).to_string();

    let mut holding = Holding {
        symbol: symbol.to_string(),
        asset_name: asset_name_of(symbol),
        buy_price: exec_price,
        buy_date: stamp.clone(),
        quantity: fill.quantity.unwrap_or(0.0),
        notional: fill.quote_amount.unwrap_or(0.0),
        current_price,
        last_updated: stamp,
        phase1_final_score: candidate.final_score,
        trailing: TrailingState::initial(exec_price, scenario.stop_loss),
        target_price: scenario.target_price,
        stop_loss: scenario.stop_loss,
        trigger_type: trigger_type.to_string(),
        timeframe: timeframe.to_string(),
        theme: scenario.theme.clone(),
        scenario: augment_scenario(scenario, candidate),
    };
    sync_trailing_into_scenario(&mut holding);
    holding
}

/// Build a no-entry record for `reason`.
pub fn build_watchlist(
    symbol: &str,
    trigger_type: &str,
    timeframe: &str,
    candidate: &TriggerCandidate,
    scenario: &Scenario,
    reason: &str,
    now: DateTime<Utc>,
) -> Watchlist {
    Watchlist {
        symbol: symbol.to_string(),
        analyzed_date: now.format(BUY_DATE_FORMAT).to_string(),
        current_price: candidate.snapshot.close,
        buy_score: Some(scenario.buy_score),
        min_score: Some(scenario.min_score),
        decision: Decision::NoEntry,
        skip_reason: reason.to_string(),
        target_price: Some(scenario.target_price),
        stop_loss: Some(scenario.stop_loss),
        risk_reward_ratio: Some(scenario.risk_reward_ratio),
        trigger_type: trigger_type.to_string(),
        timeframe: timeframe.to_string(),
        theme: scenario.theme.clone(),
        scenario: serde_json::to_value(scenario).unwrap_or(serde_json::Value::Null),
    }
}

/// Build the supplemental `performance_tracker` row written alongside a
/// Watchlist/Holding record at decision time (§10.6). `was_traded` reflects
/// whether this decision actually opened a position, not just passed the
/// oracle's entry condition — a rotation-blocked or failed-fill entry is
/// still a skip. Forward-return fields are left `None`/`false`/`"pending"`
/// for the (not yet implemented) back-fill maintenance pass to populate.
pub fn build_performance_tracker(
    symbol: &str,
    trigger_type: &str,
    timeframe: &str,
    candidate: &TriggerCandidate,
    scenario: &Scenario,
    skip_reason: Option<&str>,
    was_traded: bool,
    now: DateTime<Utc>,
) -> PerformanceTrackerRow {
    let predicted_direction = match scenario.decision {
        Decision::Entry => Some("up".to_string()),
        Decision::NoEntry => None,
    };
    PerformanceTrackerRow {
        symbol: symbol.to_string(),
        analysis_date: now.format(BUY_DATE_FORMAT).to_string(),
        analysis_price: candidate.snapshot.close,
        predicted_direction,
        target_price: Some(scenario.target_price),
        stop_loss: Some(scenario.stop_loss),
        buy_score: Some(scenario.buy_score),
        decision: scenario.decision,
        skip_reason: skip_reason.map(|s| s.to_string()),
        risk_reward_ratio: Some(scenario.risk_reward_ratio),
        price_24h: None,
        price_72h: None,
        price_168h: None,
        return_24h: None,
        return_72h: None,
        return_168h: None,
        hit_target: false,
        hit_stop_loss: false,
        tracking_status: "pending".to_string(),
        was_traded,
        trigger_type: trigger_type.to_string(),
        timeframe: timeframe.to_string(),
        theme: scenario.theme.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqk_schemas::{InvestmentPeriod, SnapshotRow};

    fn candidate() -> TriggerCandidate {
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
            risk_reward_ratio: 1.8,
            agent_fit_score: 0.5,
            final_score: 0.5,
        }
    }

    fn scenario() -> Scenario {
        Scenario {
            buy_score: 6,
            min_score: 5,
            decision: Decision::Entry,
            target_price: 108.0,
            stop_loss: 95.0,
            risk_reward_ratio: 1.8,
            expected_return_pct: 8.0,
            expected_loss_pct: 5.0,
            investment_period: InvestmentPeriod::Short,
            rationale: "looks good".to_string(),
            theme: "L1".to_string(),
            market_condition: "bullish".to_string(),
            trading_scenarios: serde_json::json!({}),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn holding_carries_phase1_augmentation() {
        let now: DateTime<Utc> = "2026-01-10T00:00:00Z".parse().unwrap();
        let h = build_holding(
            "BTC-USD",
            "Volume-Momentum",
            "1h",
            &candidate(),
            &scenario(),
            FillContext { executed_price: Some(100.1), quantity: Some(1.0), quote_amount: Some(100.1) },
            now,
        );
        assert_eq!(h.asset_name, "BTC");
        assert_eq!(h.buy_price, 100.1);
        assert_eq!(h.phase1_final_score, 0.5);
        assert_eq!(h.scenario["phase1_composite_score"], 0.6);
        assert_eq!(h.stop_loss, 95.0);
    }

    #[test]
    fn holding_falls_back_to_snapshot_price_without_fill() {
        let now: DateTime<Utc> = "2026-01-10T00:00:00Z".parse().unwrap();
        let h = build_holding("BTC-USD", "Volume-Momentum", "1h", &candidate(), &scenario(), FillContext::default(), now);
        assert_eq!(h.buy_price, 100.0);
        assert_eq!(h.current_price, 100.0);
    }

    #[test]
    fn watchlist_row_records_no_entry_reason() {
        let now: DateTime<Utc> = "2026-01-10T00:00:00Z".parse().unwrap();
        let w = build_watchlist("BTC-USD", "Volume-Momentum", "1h", &candidate(), &scenario(), "score too low", now);
        assert_eq!(w.decision, Decision::NoEntry);
        assert_eq!(w.skip_reason, "score too low");
        assert_eq!(w.buy_score, Some(6));
    }

    #[test]
    fn performance_tracker_row_defaults_to_pending() {
        let now: DateTime<Utc> = "2026-01-10T00:00:00Z".parse().unwrap();
        let row = build_performance_tracker(
            "BTC-USD",
            "Volume-Momentum",
            "1h",
            &candidate(),
            &scenario(),
            None,
            true,
            now,
        );
        assert_eq!(row.decision, Decision::Entry);
        assert_eq!(row.predicted_direction.as_deref(), Some("up"));
        assert_eq!(row.tracking_status, "pending");
        assert!(row.was_traded);
        assert!(row.return_24h.is_none());
    }

    #[test]
    fn performance_tracker_row_carries_skip_reason_on_no_entry() {
        let now: DateTime<Utc> = "2026-01-10T00:00:00Z".parse().unwrap();
        let mut s = scenario();
        s.decision = Decision::NoEntry;
        let row = build_performance_tracker(
            "BTC-USD",
            "Volume-Momentum",
            "1h",
            &candidate(),
            &s,
            Some("score too low"),
            false,
            now,
        );
        assert_eq!(row.predicted_direction, None);
        assert_eq!(row.skip_reason.as_deref(), Some("score too low"));
        assert!(!row.was_traded);
    }
}
