//! Re-entry cool-down (§4.6.3 step 2): block re-entry into a symbol for
//! `cooldown_hours` after its last sell.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::exit::BUY_DATE_FORMAT;

/// `(is_active, reason)`. `cooldown_hours <= 0` disables the check entirely.
/// An unparsable or absent `last_sell_date` never blocks re-entry.
pub fn evaluate(last_sell_date: Option<&str>, now: DateTime<Utc>, cooldown_hours: f64) -> (bool, String) {
    if cooldown_hours <= 0.0 {
        return (false, String::new());
    }
    let Some(raw) = last_sell_date else {
        return (false, String::new());
    };
    let Ok(last_sell) = NaiveDateTime::parse_from_str(raw, BUY_DATE_FORMAT) else {
        return (false, String::new());
    };

    let cooldown_until = last_sell + chrono::Duration::minutes((cooldown_hours * 60.0).round() as i64);
    let now_naive = now.naive_utc();
    if now_naive < cooldown_until {
        let remaining = (cooldown_until - now_naive).num_seconds() as f64 / 3600.0;
        let remaining = remaining.max(0.0);
        return (
            true,
            format!("re-entry cooldown active ({remaining:.2}h remaining, window={cooldown_hours:.2}h)"),
        );
    }
    (false, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-01-10T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn disabled_when_cooldown_hours_zero() {
        let (active, _) = evaluate(Some("2026-01-09 23:00:00"), now(), 0.0);
        assert!(!active);
    }

    #[test]
    fn active_within_window() {
        let (active, reason) = evaluate(Some("2026-01-09 23:00:00"), now(), 2.0);
        assert!(active);
        assert!(reason.contains("re-entry cooldown active"));
    }

    #[test]
    fn inactive_after_window_elapses() {
        let (active, _) = evaluate(Some("2026-01-01 00:00:00"), now(), 2.0);
        assert!(!active);
    }

    #[test]
    fn inactive_with_no_prior_sell() {
        let (active, _) = evaluate(None, now(), 2.0);
        assert!(!active);
    }
}
