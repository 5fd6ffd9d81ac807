//! Phase-1 signal engine: feature/snapshot building (C2), the trigger bank
//! with adaptive threshold tightening (C3), and the final selector's
//! two-pass hybrid dedup with fallback (C4).
//!
//! This crate is pure: it takes bar history in, produces the Phase-1 JSON
//! document out (§6), and touches neither the network nor the database.

pub mod features;
pub mod output;
pub mod selector;
pub mod triggers;

use mqk_config::EngineConfig;
use mqk_schemas::{Bar, SnapshotRow};

pub use output::{build_phase1_json, Phase1Metadata};
pub use selector::SelectedGroup;

/// Run the full Phase-1 pipeline — snapshot, trigger bank, final selector,
/// fallback — for one cycle given each symbol's bar history.
///
/// `bars_by_symbol` should already reflect the `(period, interval)` the
/// caller fetched via `mqk-md`; this function does no fetching.
pub fn run_cycle(
    bars_by_symbol: &[(String, Vec<Bar>)],
    config: &EngineConfig,
) -> Vec<SelectedGroup> {
    let snapshots: Vec<SnapshotRow> = bars_by_symbol
        .iter()
        .filter_map(|(symbol, bars)| features::build_snapshot(symbol, bars))
        .collect();

    let mut trigger_lists = triggers::run_all(&snapshots, &config.triggers);
    selector::finalize_trigger_scores(&mut trigger_lists);

    let total_candidates: usize = trigger_lists.iter().map(|(_, c)| c.len()).sum();
    if total_candidates == 0 {
        return selector::fallback_select(
            &snapshots,
            config.selector.max_positions,
            config.selector.fallback_max_entries,
        );
    }

    selector::two_pass_select(&trigger_lists, config.selector.max_positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_bars(n: usize, start: f64, step: f64, vol_spike_at_end: bool) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = start + step * i as f64;
                let volume = if vol_spike_at_end && i == n - 1 { 5000.0 } else { 100.0 };
                Bar {
                    ts: i as i64 * 3600,
                    open: close - step.abs() * 0.1,
                    high: close + step.abs() * 0.5 + 0.01,
                    low: close - step.abs() * 0.5 - 0.01,
                    close,
                    volume,
                }
            })
            .collect()
    }

    #[test]
    fn cycle_with_flat_series_never_panics_and_respects_cap() {
        let config = EngineConfig::default();
        let bars = vec![("BTC-USD".to_string(), trending_bars(80, 100.0, 0.0, false))];
        let groups = run_cycle(&bars, &config);
        let total: usize = groups.iter().map(|(_, g)| g.len()).sum();
        assert!(total <= config.selector.max_positions);
    }

    #[test]
    fn cycle_respects_max_positions_cap() {
        let config = EngineConfig::default();
        let bars: Vec<(String, Vec<Bar>)> = (0..5)
            .map(|i| {
                (
                    format!("SYM{i}-USD"),
                    trending_bars(80, 100.0, 1.0 + i as f64 * 0.1, true),
                )
            })
            .collect();
        let groups = run_cycle(&bars, &config);
        let total: usize = groups.iter().map(|(_, g)| g.len()).sum();
        assert!(total <= config.selector.max_positions);
    }
}
