//! TriggerBank (C3): three independent gate+score predicates over the
//! snapshot table, with adaptive threshold tightening (§4.3).

use mqk_config::TriggerThresholds;
use mqk_schemas::{
    SnapshotRow, TriggerCandidate, TRIGGER_RANGE_BREAKOUT, TRIGGER_VOLATILITY_TREND,
    TRIGGER_VOLUME_MOMENTUM,
};

/// Per-symbol risk metrics derived purely from the snapshot row, independent
/// of which trigger admitted the candidate (§4.3 "Agent-fit metrics").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentFit {
    pub stop_loss_pct: f64,
    pub target_pct: f64,
    pub stop_loss_price: f64,
    pub target_price: f64,
    pub risk_reward_ratio: f64,
    pub agent_fit_score: f64,
}

pub fn agent_fit(row: &SnapshotRow) -> AgentFit {
    let stop_loss_pct = (1.2 * row.atr_pct).clamp(0.02, 0.06);
    let target_pct = (2.0 * stop_loss_pct).max(0.05);
    let stop_loss_price = row.close * (1.0 - stop_loss_pct);
    let target_price = row.close * (1.0 + target_pct);
    let risk_reward_ratio = if stop_loss_pct.abs() > f64::EPSILON {
        target_pct / stop_loss_pct
    } else {
        0.0
    };
    let agent_fit_score =
        0.65 * (risk_reward_ratio / 2.0).min(1.0) + 0.35 * (row.volume_ratio_20 / 2.5).min(1.0);

    AgentFit {
        stop_loss_pct,
        target_pct,
        stop_loss_price,
        target_price,
        risk_reward_ratio,
        agent_fit_score,
    }
}

/// Effective, tightened per-trigger minimum thresholds for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveThresholds {
    pub vr_min: f64,
    pub r1_min: f64,
    pub r4_min: f64,
    pub brk_vr_min: f64,
    pub tighten: f64,
}

/// Compute the adaptive tightening factor and the resulting effective
/// thresholds for this cycle's snapshot set (§4.3).
pub fn effective_thresholds(snapshots: &[SnapshotRow], base: &TriggerThresholds) -> EffectiveThresholds {
    let atr_expansions: Vec<f64> = snapshots.iter().map(|s| s.atr_expansion).collect();
    let med = median(&atr_expansions);
    let tighten = ((med - 1.0).max(0.0) * base.tighten_factor).min(0.25);
    let scale = 1.0 + tighten;

    EffectiveThresholds {
        vr_min: base.volume_momentum_vr_min * scale,
        r1_min: base.volume_momentum_r1_min * scale,
        r4_min: base.volatility_trend_r4_min * scale,
        brk_vr_min: base.range_breakout_vr_min * scale,
        tighten,
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Min-max normalize `values` to `[0, 1]`. A degenerate (constant) column
/// normalizes to all `0.5` rather than dividing by zero.
fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range.abs() < f64::EPSILON {
        return values.iter().map(|_| 0.5).collect();
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// One column extractor + weight pair for a trigger's composite score.
struct ScoreColumn<'a> {
    weight: f64,
    extract: Box<dyn Fn(&SnapshotRow) -> f64 + 'a>,
}

fn weighted_composite_scores(rows: &[&SnapshotRow], columns: &[ScoreColumn]) -> Vec<f64> {
    if rows.is_empty() {
        return Vec::new();
    }
    let total_weight: f64 = columns.iter().map(|c| c.weight).sum();
    let normalized: Vec<Vec<f64>> = columns
        .iter()
        .map(|c| {
            let raw: Vec<f64> = rows.iter().map(|r| (c.extract)(r)).collect();
            min_max_normalize(&raw)
        })
        .collect();

    (0..rows.len())
        .map(|i| {
            let sum: f64 = columns
                .iter()
                .zip(normalized.iter())
                .map(|(c, norm_col)| c.weight * norm_col[i])
                .sum();
            if total_weight.abs() > f64::EPSILON {
                sum / total_weight
            } else {
                0.0
            }
        })
        .collect()
}

fn build_candidate(row: &SnapshotRow, trigger: &str, composite_score: f64) -> TriggerCandidate {
    let fit = agent_fit(row);
    TriggerCandidate {
        snapshot: row.clone(),
        trigger: trigger.to_string(),
        composite_score,
        stop_loss_pct: fit.stop_loss_pct,
        target_pct: fit.target_pct,
        stop_loss_price: fit.stop_loss_price,
        target_price: fit.target_price,
        risk_reward_ratio: fit.risk_reward_ratio,
        agent_fit_score: fit.agent_fit_score,
        final_score: 0.0, // filled in by the final selector (C4)
    }
}

fn rank_and_truncate(mut candidates: Vec<TriggerCandidate>, top_n: usize) -> Vec<TriggerCandidate> {
    candidates.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(top_n);
    candidates
}

pub fn volume_momentum(
    snapshots: &[SnapshotRow],
    thr: &EffectiveThresholds,
    top_n: usize,
) -> Vec<TriggerCandidate> {
    let gated: Vec<&SnapshotRow> = snapshots
        .iter()
        .filter(|r| r.volume_ratio_20 >= thr.vr_min && r.ret_1_pct >= thr.r1_min && r.ema20_gt_ema50)
        .collect();

    let columns = vec![
        ScoreColumn {
            weight: 0.45,
            extract: Box::new(|r: &SnapshotRow| r.volume_ratio_20),
        },
        ScoreColumn {
            weight: 0.35,
            extract: Box::new(|r: &SnapshotRow| r.ret_1_pct),
        },
        ScoreColumn {
            weight: 0.20,
            extract: Box::new(|r: &SnapshotRow| r.amount),
        },
    ];
    let scores = weighted_composite_scores(&gated, &columns);

    let candidates = gated
        .iter()
        .zip(scores)
        .map(|(r, score)| build_candidate(r, TRIGGER_VOLUME_MOMENTUM, score))
        .collect();

    rank_and_truncate(candidates, top_n)
}

pub fn volatility_trend(
    snapshots: &[SnapshotRow],
    thr: &EffectiveThresholds,
    top_n: usize,
) -> Vec<TriggerCandidate> {
    let gated: Vec<&SnapshotRow> = snapshots
        .iter()
        .filter(|r| r.atr_expansion >= 1.0 && r.ret_4_pct >= thr.r4_min && r.ema20_gt_ema50)
        .collect();

    let columns = vec![
        ScoreColumn {
            weight: 0.40,
            extract: Box::new(|r: &SnapshotRow| r.atr_expansion),
        },
        ScoreColumn {
            weight: 0.35,
            extract: Box::new(|r: &SnapshotRow| r.trend_gap_pct),
        },
        ScoreColumn {
            weight: 0.25,
            extract: Box::new(|r: &SnapshotRow| r.amount),
        },
    ];
    let scores = weighted_composite_scores(&gated, &columns);

    let candidates = gated
        .iter()
        .zip(scores)
        .map(|(r, score)| build_candidate(r, TRIGGER_VOLATILITY_TREND, score))
        .collect();

    rank_and_truncate(candidates, top_n)
}

pub fn range_breakout(
    snapshots: &[SnapshotRow],
    thr: &EffectiveThresholds,
    top_n: usize,
) -> Vec<TriggerCandidate> {
    let gated: Vec<&SnapshotRow> = snapshots
        .iter()
        .filter(|r| r.breakout_pct >= -0.05 && r.volume_ratio_20 >= thr.brk_vr_min && r.ret_1_pct >= 0.0)
        .collect();

    let columns = vec![
        ScoreColumn {
            weight: 0.45,
            extract: Box::new(|r: &SnapshotRow| r.breakout_pct),
        },
        ScoreColumn {
            weight: 0.35,
            extract: Box::new(|r: &SnapshotRow| r.volume_ratio_20),
        },
        ScoreColumn {
            weight: 0.20,
            extract: Box::new(|r: &SnapshotRow| r.amount),
        },
    ];
    let scores = weighted_composite_scores(&gated, &columns);

    let candidates = gated
        .iter()
        .zip(scores)
        .map(|(r, score)| build_candidate(r, TRIGGER_RANGE_BREAKOUT, score))
        .collect();

    rank_and_truncate(candidates, top_n)
}

/// Run all three triggers against the snapshot set and return one ranked
/// list per trigger, in the fixed trigger order the final selector relies on.
pub fn run_all(
    snapshots: &[SnapshotRow],
    base: &TriggerThresholds,
) -> Vec<(&'static str, Vec<TriggerCandidate>)> {
    let thr = effective_thresholds(snapshots, base);
    vec![
        (
            TRIGGER_VOLUME_MOMENTUM,
            volume_momentum(snapshots, &thr, base.top_n),
        ),
        (
            TRIGGER_VOLATILITY_TREND,
            volatility_trend(snapshots, &thr, base.top_n),
        ),
        (
            TRIGGER_RANGE_BREAKOUT,
            range_breakout(snapshots, &thr, base.top_n),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, vr: f64, r1: f64, ema_gt: bool, amount: f64) -> SnapshotRow {
        SnapshotRow {
            symbol: symbol.to_string(),
            close: 100.0,
            volume: 1000.0,
            amount,
            ret_1_pct: r1,
            ret_4_pct: 0.0,
            volume_ratio_20: vr,
            atr_pct: 0.03,
            atr_expansion: 1.0,
            trend_gap_pct: 0.0,
            breakout_pct: 0.0,
            ema20_gt_ema50: ema_gt,
            theme: "Other".to_string(),
        }
    }

    #[test]
    fn agent_fit_clamps_stop_loss_pct() {
        let r = row("BTC-USD", 2.0, 2.0, true, 1000.0);
        let fit = agent_fit(&r);
        assert!(fit.stop_loss_pct >= 0.02 && fit.stop_loss_pct <= 0.06);
        assert!(fit.target_pct >= 0.05);
        assert!(fit.risk_reward_ratio > 0.0);
    }

    #[test]
    fn volume_momentum_gate_excludes_weak_candidates() {
        let base = TriggerThresholds::default();
        let rows = vec![
            row("BTC-USD", 2.0, 2.0, true, 5000.0), // passes
            row("ETH-USD", 0.5, 0.1, true, 5000.0), // fails vr/r1
        ];
        let thr = effective_thresholds(&rows, &base);
        let out = volume_momentum(&rows, &thr, 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].snapshot.symbol, "BTC-USD");
    }

    #[test]
    fn tighten_is_bounded_at_quarter() {
        let base = TriggerThresholds::default();
        let rows: Vec<SnapshotRow> = (0..5)
            .map(|i| {
                let mut r = row("X", 2.0, 2.0, true, 1000.0);
                r.atr_expansion = 3.0 + i as f64;
                r
            })
            .collect();
        let thr = effective_thresholds(&rows, &base);
        assert!(thr.tighten <= 0.25 + 1e-9);
    }

    #[test]
    fn top_n_truncates_ranked_list() {
        let base = TriggerThresholds::default();
        let rows: Vec<SnapshotRow> = (0..15)
            .map(|i| row(&format!("SYM{i}-USD"), 2.0, 2.0, true, 1000.0 + i as f64))
            .collect();
        let thr = effective_thresholds(&rows, &base);
        let out = volume_momentum(&rows, &thr, 10);
        assert_eq!(out.len(), 10);
    }
}
