//! FinalSelector (C4): re-normalizes trigger-local scores into `final_score`,
//! then runs the two-pass hybrid dedup selector (§4.4), falling back to a
//! momentum-blend selector when every trigger came back empty.

use std::collections::HashSet;

use mqk_schemas::{SnapshotRow, TriggerCandidate, TRIGGER_FALLBACK_MOMENTUM};

use crate::triggers::agent_fit;

/// `final_score = 0.3 * composite_score_norm + 0.7 * agent_fit_score`, where
/// `composite_score_norm` is `composite_score` re-normalized to `[0, 1]`
/// *within this trigger's list* (the trigger lists were already filtered and
/// trimmed to top-N, so this is a second, smaller-population normalization).
pub fn finalize_trigger_scores(lists: &mut [(&'static str, Vec<TriggerCandidate>)]) {
    for (_, candidates) in lists.iter_mut() {
        if candidates.is_empty() {
            continue;
        }
        let raw: Vec<f64> = candidates.iter().map(|c| c.composite_score).collect();
        let min = raw.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        for (candidate, score) in candidates.iter_mut().zip(raw.iter()) {
            let norm = if range.abs() < f64::EPSILON {
                0.5
            } else {
                (score - min) / range
            };
            candidate.final_score = 0.3 * norm + 0.7 * candidate.agent_fit_score;
        }

        candidates.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// One trigger group's selected candidates, in selection order.
pub type SelectedGroup = (&'static str, Vec<TriggerCandidate>);

/// Two-pass hybrid selection under the global `max_positions` cap (§4.4).
pub fn two_pass_select(
    lists: &[(&'static str, Vec<TriggerCandidate>)],
    max_positions: usize,
) -> Vec<SelectedGroup> {
    let mut selected_symbols: HashSet<String> = HashSet::new();
    let mut by_trigger: Vec<SelectedGroup> = lists.iter().map(|(name, _)| (*name, Vec::new())).collect();
    let mut total_selected = 0usize;

    // Pass 1: one candidate per trigger, in fixed trigger order.
    'pass1: for (idx, (_, candidates)) in lists.iter().enumerate() {
        if total_selected >= max_positions {
            break 'pass1;
        }
        if let Some(c) = candidates
            .iter()
            .find(|c| !selected_symbols.contains(&c.snapshot.symbol))
        {
            selected_symbols.insert(c.snapshot.symbol.clone());
            by_trigger[idx].1.push(c.clone());
            total_selected += 1;
        }
    }

    // Pass 2: pool all remaining candidates, sort by final_score desc,
    // greedily fill unique symbols until the cap is reached.
    if total_selected < max_positions {
        let mut pool: Vec<(usize, &TriggerCandidate)> = Vec::new();
        for (idx, (_, candidates)) in lists.iter().enumerate() {
            for c in candidates {
                if !selected_symbols.contains(&c.snapshot.symbol) {
                    pool.push((idx, c));
                }
            }
        }
        pool.sort_by(|a, b| {
            b.1.final_score
                .partial_cmp(&a.1.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for (idx, c) in pool {
            if total_selected >= max_positions {
                break;
            }
            if selected_symbols.contains(&c.snapshot.symbol) {
                continue;
            }
            selected_symbols.insert(c.snapshot.symbol.clone());
            by_trigger[idx].1.push(c.clone());
            total_selected += 1;
        }
    }

    by_trigger.retain(|(_, group)| !group.is_empty());
    by_trigger
}

/// Fallback selector (§4.4), run when every trigger list is empty.
pub fn fallback_select(
    snapshots: &[SnapshotRow],
    max_positions: usize,
    fallback_max_entries: usize,
) -> Vec<SelectedGroup> {
    let preferred: Vec<&SnapshotRow> = snapshots
        .iter()
        .filter(|r| r.ema20_gt_ema50 && r.volume_ratio_20 >= 0.9)
        .collect();
    let pool: Vec<&SnapshotRow> = if preferred.is_empty() {
        snapshots.iter().collect()
    } else {
        preferred
    };

    if pool.is_empty() {
        return Vec::new();
    }

    let amounts: Vec<f64> = pool.iter().map(|r| r.amount).collect();
    let vrs: Vec<f64> = pool.iter().map(|r| r.volume_ratio_20).collect();
    let ret4s: Vec<f64> = pool.iter().map(|r| r.ret_4_pct).collect();
    let gaps: Vec<f64> = pool.iter().map(|r| r.trend_gap_pct).collect();

    let n_amount = normalize(&amounts);
    let n_vr = normalize(&vrs);
    let n_ret4 = normalize(&ret4s);
    let n_gap = normalize(&gaps);

    let mut scored: Vec<(f64, &SnapshotRow)> = pool
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let blend = 0.45 * n_amount[i] + 0.25 * n_vr[i] + 0.20 * n_ret4[i] + 0.10 * n_gap[i];
            (blend, *r)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let limit = max_positions.min(fallback_max_entries);
    let mut group = Vec::new();
    for (blend, row) in scored.into_iter().take(limit) {
        let fit = agent_fit(row);
        group.push(TriggerCandidate {
            snapshot: row.clone(),
            trigger: TRIGGER_FALLBACK_MOMENTUM.to_string(),
            composite_score: blend,
            stop_loss_pct: fit.stop_loss_pct,
            target_pct: fit.target_pct,
            stop_loss_price: fit.stop_loss_price,
            target_price: fit.target_price,
            risk_reward_ratio: fit.risk_reward_ratio,
            agent_fit_score: fit.agent_fit_score,
            final_score: 0.3 * blend + 0.7 * fit.agent_fit_score,
        });
    }

    if group.is_empty() {
        Vec::new()
    } else {
        vec![(TRIGGER_FALLBACK_MOMENTUM, group)]
    }
}

fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range.abs() < f64::EPSILON {
        return values.iter().map(|_| 0.5).collect();
    }
    values.iter().map(|v| (v - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqk_schemas::{TRIGGER_RANGE_BREAKOUT, TRIGGER_VOLATILITY_TREND, TRIGGER_VOLUME_MOMENTUM};

    fn candidate(symbol: &str, final_score: f64) -> TriggerCandidate {
        TriggerCandidate {
            snapshot: SnapshotRow {
                symbol: symbol.to_string(),
                close: 100.0,
                volume: 1.0,
                amount: 100.0,
                ret_1_pct: 0.0,
                ret_4_pct: 0.0,
                volume_ratio_20: 1.0,
                atr_pct: 0.03,
                atr_expansion: 1.0,
                trend_gap_pct: 0.0,
                breakout_pct: 0.0,
                ema20_gt_ema50: true,
                theme: "Other".to_string(),
            },
            trigger: "t".to_string(),
            composite_score: final_score,
            stop_loss_pct: 0.03,
            target_pct: 0.06,
            stop_loss_price: 97.0,
            target_price: 106.0,
            risk_reward_ratio: 2.0,
            agent_fit_score: 0.5,
            final_score,
        }
    }

    #[test]
    fn two_pass_dedup_prefers_one_per_trigger_first() {
        let lists = vec![
            (TRIGGER_VOLUME_MOMENTUM, vec![candidate("BTC-USD", 0.9)]),
            (TRIGGER_VOLATILITY_TREND, vec![candidate("BTC-USD", 0.8), candidate("ETH-USD", 0.7)]),
            (TRIGGER_RANGE_BREAKOUT, vec![candidate("SOL-USD", 0.6)]),
        ];
        let selected = two_pass_select(&lists, 3);
        let all_symbols: Vec<String> = selected
            .iter()
            .flat_map(|(_, g)| g.iter().map(|c| c.snapshot.symbol.clone()))
            .collect();
        assert_eq!(all_symbols.len(), 3);
        assert!(all_symbols.contains(&"BTC-USD".to_string()));
        assert!(all_symbols.contains(&"ETH-USD".to_string()));
        assert!(all_symbols.contains(&"SOL-USD".to_string()));
    }

    #[test]
    fn two_pass_never_duplicates_a_symbol() {
        let lists = vec![
            (TRIGGER_VOLUME_MOMENTUM, vec![candidate("BTC-USD", 0.9)]),
            (TRIGGER_VOLATILITY_TREND, vec![candidate("BTC-USD", 0.95)]),
        ];
        let selected = two_pass_select(&lists, 3);
        let all_symbols: Vec<String> = selected
            .iter()
            .flat_map(|(_, g)| g.iter().map(|c| c.snapshot.symbol.clone()))
            .collect();
        assert_eq!(all_symbols.len(), 1);
    }

    #[test]
    fn fallback_emits_at_most_fallback_max_entries() {
        let snapshots = vec![
            SnapshotRow {
                symbol: "BTC-USD".to_string(),
                close: 100.0,
                volume: 10.0,
                amount: 1000.0,
                ret_1_pct: 0.1,
                ret_4_pct: 0.2,
                volume_ratio_20: 1.1,
                atr_pct: 0.02,
                atr_expansion: 1.0,
                trend_gap_pct: 0.1,
                breakout_pct: 0.0,
                ema20_gt_ema50: true,
                theme: "L1".to_string(),
            },
            SnapshotRow {
                symbol: "ETH-USD".to_string(),
                close: 50.0,
                volume: 20.0,
                amount: 1500.0,
                ret_1_pct: 0.2,
                ret_4_pct: 0.3,
                volume_ratio_20: 1.2,
                atr_pct: 0.025,
                atr_expansion: 1.1,
                trend_gap_pct: 0.2,
                breakout_pct: 0.1,
                ema20_gt_ema50: true,
                theme: "L1".to_string(),
            },
        ];
        let group = fallback_select(&snapshots, 3, 1);
        assert_eq!(group.len(), 1);
        assert_eq!(group[0].1.len(), 1);
        assert_eq!(group[0].0, TRIGGER_FALLBACK_MOMENTUM);
    }
}
