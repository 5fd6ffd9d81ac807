//! Trailing-stop state machine (§4.6.1): Accumulating (`profit < 3%`) vs
//! Trailing (`profit >= 3%` observed at least once — sticky, never reverts).

use mqk_schemas::Holding;

/// Refresh `holding`'s trailing-stop state in place for the latest
/// `current_price`. `holding.stop_loss` is the ratcheting effective stop:
/// each call may only widen it (via `max(base_stop, trail_stop)`), never
/// shrink it, since `base_stop` here is last cycle's already-ratcheted value.
/// `max_trail_buffer` caps the widest tier (`PortfolioConfig::max_trail_buffer`,
/// §4.6.1 invariant).
pub fn refresh(holding: &mut Holding, current_price: f64, max_trail_buffer: f64) {
    holding.current_price = current_price;
    if holding.buy_price <= 0.0 || current_price <= 0.0 {
        return;
    }

    let base_stop = holding.stop_loss;
    let peak = holding.trailing.trailing_peak_price.max(current_price);
    holding.trailing.trailing_peak_price = peak;

    let profit_rate = (current_price - holding.buy_price) / holding.buy_price * 100.0;
    if profit_rate >= 3.0 {
        holding.trailing.trailing_active = true;
    }

    if !holding.trailing.trailing_active {
        holding.trailing.dynamic_stop_loss = base_stop;
        return;
    }

    let trail_buffer = if profit_rate < 8.0 {
        0.025
    } else if profit_rate < 15.0 {
        0.03
    } else {
        max_trail_buffer
    }
    .min(max_trail_buffer);

    let trail_stop = peak * (1.0 - trail_buffer);
    let effective_stop = if base_stop > 0.0 { base_stop.max(trail_stop) } else { trail_stop };
    holding.trailing.dynamic_stop_loss = effective_stop;
    holding.trailing.trail_buffer_pct = trail_buffer * 100.0;
    holding.stop_loss = effective_stop;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqk_schemas::TrailingState;

    fn holding(buy_price: f64, stop_loss: f64) -> Holding {
        Holding {
            symbol: "BTC-USD".to_string(),
            asset_name: "BTC".to_string(),
            buy_price,
            buy_date: "2026-01-01 00:00:00".to_string(),
            quantity: 1.0,
            notional: buy_price,
            current_price: buy_price,
            last_updated: "2026-01-01 00:00:00".to_string(),
            phase1_final_score: 0.5,
            trailing: TrailingState::initial(buy_price, stop_loss),
            target_price: buy_price * 1.1,
            stop_loss,
            trigger_type: "Volume-Momentum".to_string(),
            timeframe: "1h".to_string(),
            theme: "L1".to_string(),
            scenario: serde_json::Value::Null,
        }
    }

    #[test]
    fn stays_accumulating_below_activation_threshold() {
        let mut h = holding(100.0, 96.0);
        refresh(&mut h, 102.0, 0.04); // +2%, below 3% activation
        assert!(!h.trailing.trailing_active);
        assert_eq!(h.stop_loss, 96.0);
    }

    #[test]
    fn activates_trailing_at_three_percent_profit() {
        let mut h = holding(100.0, 96.0);
        refresh(&mut h, 103.0, 0.04); // +3%
        assert!(h.trailing.trailing_active);
        // trail_stop = 103 * (1 - 0.025) = 100.425, base_stop = 96 -> max = 100.425
        assert!((h.stop_loss - 100.425).abs() < 1e-9);
    }

    #[test]
    fn trail_buffer_widens_with_higher_profit_tiers() {
        let mut h = holding(100.0, 96.0);
        refresh(&mut h, 120.0, 0.04); // +20% -> buffer 0.04
        assert_eq!(h.trailing.trail_buffer_pct, 4.0);
    }

    #[test]
    fn stop_never_ratchets_down_across_calls() {
        let mut h = holding(100.0, 96.0);
        refresh(&mut h, 130.0, 0.04);
        let peak_stop = h.stop_loss;
        refresh(&mut h, 110.0, 0.04); // price retraces, but peak/stop must not drop
        assert!(h.stop_loss >= peak_stop - 1e-9);
        assert_eq!(h.trailing.trailing_peak_price, 130.0);
    }

    #[test]
    fn trailing_state_is_sticky_once_activated() {
        let mut h = holding(100.0, 96.0);
        refresh(&mut h, 104.0, 0.04);
        assert!(h.trailing.trailing_active);
        refresh(&mut h, 101.0, 0.04); // profit drops back below 3%, state stays Trailing
        assert!(h.trailing.trailing_active);
    }

    #[test]
    fn configured_max_trail_buffer_clamps_every_tier() {
        let mut h = holding(100.0, 96.0);
        refresh(&mut h, 120.0, 0.01); // +20% would normally buffer 0.04, clamped to 0.01
        assert_eq!(h.trailing.trail_buffer_pct, 1.0);
    }
}
