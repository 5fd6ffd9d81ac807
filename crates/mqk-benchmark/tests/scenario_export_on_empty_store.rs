//! A brand-new deployment (no holdings, no trade history) must still
//! produce a single-point series rather than erroring.

use chrono::NaiveDate;
use mqk_benchmark::{algo_equity_series, strategy_start_date};

#[test]
fn empty_store_yields_single_point_series_at_initial_capital() {
    let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
    let start = strategy_start_date(&[], &[], today);
    assert_eq!(start, today);

    let points = algo_equity_series(&[], &[], 1000.0, start, today);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].1, 1000.0);
}
