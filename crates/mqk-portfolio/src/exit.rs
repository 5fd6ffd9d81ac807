//! Priority-ordered exit evaluator (§4.6.2).

use chrono::{DateTime, NaiveDateTime, Utc};
use mqk_schemas::Holding;

pub const BUY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct ExitDecision {
    pub should_sell: bool,
    pub reason: String,
}

impl ExitDecision {
    fn hold() -> Self {
        Self { should_sell: false, reason: "hold".to_string() }
    }

    fn sell(reason: String) -> Self {
        Self { should_sell: true, reason }
    }
}

/// Hours elapsed between `holding.buy_date` and `now`. Falls back to `0.0`
/// (as if bought "now") when the stored date fails to parse, matching the
/// reference engine's `buy_dt = now_dt` fallback.
pub fn holding_hours(holding: &Holding, now: DateTime<Utc>) -> f64 {
    match NaiveDateTime::parse_from_str(&holding.buy_date, BUY_DATE_FORMAT) {
        Ok(buy_dt) => {
            let elapsed = now.naive_utc().signed_duration_since(buy_dt);
            (elapsed.num_seconds() as f64 / 3600.0).max(0.0)
        }
        Err(_) => 0.0,
    }
}

/// Evaluate whether `holding` should be sold this cycle, in priority order:
/// hard stop, target, loss guard, time-based take-profit, stale-loser
/// cleanup.
pub fn evaluate(holding: &Holding, now: DateTime<Utc>) -> ExitDecision {
    if holding.buy_price <= 0.0 || holding.current_price <= 0.0 {
        return ExitDecision { should_sell: false, reason: "invalid price context".to_string() };
    }

    let hours = holding_hours(holding, now);
    let profit_rate = (holding.current_price - holding.buy_price) / holding.buy_price * 100.0;
    let current = holding.current_price;

    if holding.stop_loss > 0.0 && current <= holding.stop_loss {
        let reason = if holding.trailing.trailing_active && holding.trailing.dynamic_stop_loss > 0.0 {
            format!("trailing stop reached ({current:.6} <= {:.6})", holding.stop_loss)
        } else {
            format!("stop loss reached ({current:.6} <= {:.6})", holding.stop_loss)
        };
        return ExitDecision::sell(reason);
    }

    if holding.target_price > 0.0 && current >= holding.target_price {
        return ExitDecision::sell(format!("target reached ({current:.6} >= {:.6})", holding.target_price));
    }

    if profit_rate <= -5.0 {
        return ExitDecision::sell(format!("loss guard triggered ({profit_rate:.2}%)"));
    }

    if hours >= 72.0 && profit_rate >= 4.0 {
        return ExitDecision::sell(format!("time-based take-profit ({hours:.1}h, {profit_rate:.2}%)"));
    }

    if hours >= 168.0 && profit_rate < 0.0 {
        return ExitDecision::sell(format!("stale losing position cleanup ({hours:.1}h, {profit_rate:.2}%)"));
    }

    ExitDecision::hold()
}
