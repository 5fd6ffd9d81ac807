//! Phase-1 → Phase-2 boundary: the exact JSON document shape the selector
//! writes and the portfolio controller reads (§6).

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use mqk_schemas::{
    SnapshotRow, TriggerCandidate, TRIGGER_FALLBACK_MOMENTUM, TRIGGER_RANGE_BREAKOUT, TRIGGER_VOLATILITY_TREND,
    TRIGGER_VOLUME_MOMENTUM,
};
use serde_json::{json, Map, Value};

use crate::selector::SelectedGroup;

const KNOWN_TRIGGERS: &[&str] =
    &[TRIGGER_VOLUME_MOMENTUM, TRIGGER_VOLATILITY_TREND, TRIGGER_RANGE_BREAKOUT, TRIGGER_FALLBACK_MOMENTUM];

fn trigger_key(name: &str) -> Option<&'static str> {
    KNOWN_TRIGGERS.iter().copied().find(|known| *known == name)
}

fn field_f64(obj: &Map<String, Value>, key: &str) -> Result<f64> {
    obj.get(key).and_then(Value::as_f64).with_context(|| format!("missing or non-numeric field `{key}`"))
}

fn field_str(obj: &Map<String, Value>, key: &str) -> Result<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string).with_context(|| format!("missing field `{key}`"))
}

/// Reverse of [`build_phase1_json`]: reconstruct the candidate groups the
/// controller consumes. Phase-1-internal-only snapshot fields
/// (`atr_expansion`, `trend_gap_pct`, `breakout_pct`, `ema20_gt_ema50`) are
/// not carried over the wire (the controller never reads them) and are
/// filled with neutral/inert defaults.
pub fn parse_phase1_json(doc: &Value) -> Result<Vec<(&'static str, Vec<TriggerCandidate>)>> {
    let top = doc.as_object().context("phase-1 document must be a JSON object")?;
    let mut groups = Vec::new();

    for (key, value) in top {
        if key == "metadata" {
            continue;
        }
        let Some(trigger) = trigger_key(key) else {
            continue;
        };
        let entries = value.as_array().with_context(|| format!("`{key}` must be an array"))?;

        let mut candidates = Vec::with_capacity(entries.len());
        for entry in entries {
            let obj = entry.as_object().with_context(|| format!("entry under `{key}` must be an object"))?;
            let snapshot = SnapshotRow {
                symbol: field_str(obj, "symbol")?,
                close: field_f64(obj, "current_price")?,
                volume: field_f64(obj, "volume")?,
                amount: field_f64(obj, "trade_value")?,
                ret_1_pct: field_f64(obj, "ret_1_pct")?,
                ret_4_pct: field_f64(obj, "ret_4_pct")?,
                volume_ratio_20: field_f64(obj, "volume_ratio_20")?,
                atr_pct: field_f64(obj, "atr_pct")?,
                atr_expansion: 1.0,
                trend_gap_pct: 0.0,
                breakout_pct: 0.0,
                ema20_gt_ema50: true,
                theme: field_str(obj, "theme").unwrap_or_default(),
            };
            candidates.push(TriggerCandidate {
                snapshot,
                trigger: trigger.to_string(),
                composite_score: field_f64(obj, "composite_score")?,
                stop_loss_pct: field_f64(obj, "stop_loss_pct")?,
                target_pct: field_f64(obj, "target_pct")?,
                stop_loss_price: field_f64(obj, "stop_loss_price")?,
                target_price: field_f64(obj, "target_price")?,
                risk_reward_ratio: field_f64(obj, "risk_reward_ratio")?,
                agent_fit_score: field_f64(obj, "agent_fit_score")?,
                final_score: field_f64(obj, "final_score")?,
            });
        }
        groups.push((trigger, candidates));
    }

    Ok(groups)
}

pub struct Phase1Metadata {
    pub interval: String,
    pub period: String,
    pub universe_size: usize,
    pub max_positions: usize,
    pub fallback_max_entries: usize,
}

/// Build the Phase-1 output document. `run_time` is stamped as ISO-8601 UTC
/// with a `Z` suffix at call time (the only wall-clock timestamp in the
/// otherwise-deterministic selector pipeline).
pub fn build_phase1_json(groups: &[SelectedGroup], metadata: Phase1Metadata) -> Value {
    let mut top = Map::new();

    for (trigger, candidates) in groups {
        let wire: Vec<Value> = candidates
            .iter()
            .map(|c| {
                json!({
                    "symbol": c.snapshot.symbol,
                    "current_price": c.snapshot.close,
                    "volume": c.snapshot.volume,
                    "trade_value": c.snapshot.amount,
                    "ret_1_pct": c.snapshot.ret_1_pct,
                    "ret_4_pct": c.snapshot.ret_4_pct,
                    "volume_ratio_20": c.snapshot.volume_ratio_20,
                    "atr_pct": c.snapshot.atr_pct,
                    "risk_reward_ratio": c.risk_reward_ratio,
                    "theme": c.snapshot.theme,
                    "stop_loss_pct": c.stop_loss_pct,
                    "stop_loss_price": c.stop_loss_price,
                    "target_pct": c.target_pct,
                    "target_price": c.target_price,
                    "agent_fit_score": c.agent_fit_score,
                    "composite_score": c.composite_score,
                    "final_score": c.final_score,
                })
            })
            .collect();
        top.insert((*trigger).to_string(), Value::Array(wire));
    }

    top.insert(
        "metadata".to_string(),
        json!({
            "run_time": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "market": "CRYPTO",
            "interval": metadata.interval,
            "period": metadata.period,
            "universe_size": metadata.universe_size,
            "selection_mode": "hybrid",
            "max_positions": metadata.max_positions,
            "fallback_max_entries": metadata.fallback_max_entries,
        }),
    );

    Value::Object(top)
}
