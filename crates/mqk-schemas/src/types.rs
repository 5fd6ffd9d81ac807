//! Domain types shared across the signal engine, portfolio controller, paper
//! exchange, and persistence layer.
//!
//! Monetary/price fields are plain `f64` throughout — this matches the
//! upstream feature math (EMA, ATR%, ratios), which is inherently floating
//! point, and the reference engine's own float-based accounting.

use serde::{Deserialize, Serialize};

/// A single OHLCV bar. Append-only time series point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar end timestamp, UTC epoch seconds.
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Per-symbol, per-cycle feature row. Ephemeral — never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub symbol: String,
    pub close: f64,
    pub volume: f64,
    /// `close * volume`.
    pub amount: f64,
    pub ret_1_pct: f64,
    pub ret_4_pct: f64,
    pub volume_ratio_20: f64,
    pub atr_pct: f64,
    pub atr_expansion: f64,
    pub trend_gap_pct: f64,
    /// `-999.0` when the breakout reference window is invalid.
    pub breakout_pct: f64,
    pub ema20_gt_ema50: bool,
    pub theme: String,
}

/// Name of one of the three triggers, or the fallback selector's label.
pub const TRIGGER_VOLUME_MOMENTUM: &str = "Volume-Momentum";
pub const TRIGGER_VOLATILITY_TREND: &str = "Volatility-Trend";
pub const TRIGGER_RANGE_BREAKOUT: &str = "Range-Breakout";
pub const TRIGGER_FALLBACK_MOMENTUM: &str = "Fallback Momentum";

/// `SnapshotRow` plus trigger-local scoring and derived risk metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCandidate {
    #[serde(flatten)]
    pub snapshot: SnapshotRow,
    pub trigger: String,
    pub composite_score: f64,
    pub stop_loss_pct: f64,
    pub target_pct: f64,
    pub stop_loss_price: f64,
    pub target_price: f64,
    pub risk_reward_ratio: f64,
    pub agent_fit_score: f64,
    pub final_score: f64,
}

/// Entry/exit decision emitted by the [`crate::Oracle`] contract the
/// portfolio controller consumes (see `mqk-oracle`). Re-exported here because
/// it is also the payload persisted inside `Holding::scenario` /
/// `Watchlist::scenario`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub buy_score: i64,
    pub min_score: i64,
    pub decision: Decision,
    pub target_price: f64,
    pub stop_loss: f64,
    pub risk_reward_ratio: f64,
    pub expected_return_pct: f64,
    pub expected_loss_pct: f64,
    pub investment_period: InvestmentPeriod,
    pub rationale: String,
    pub theme: String,
    pub market_condition: String,
    #[serde(default)]
    pub trading_scenarios: serde_json::Value,
    /// Unknown keys from the oracle's raw JSON output, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Entry,
    NoEntry,
}

impl Decision {
    /// The wire/log form (`entry` / `no_entry`) — matches the reference
    /// engine's lowercased `decision` string, distinct from `Debug`'s
    /// `Entry` / `NoEntry`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Entry => "entry",
            Decision::NoEntry => "no_entry",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentPeriod {
    Short,
    Medium,
}

/// Trailing-stop state machine snapshot, persisted inside `Holding::scenario`
/// for audit but handled as a typed sub-record in memory (see DESIGN NOTES).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingState {
    pub trailing_active: bool,
    pub trailing_peak_price: f64,
    pub dynamic_stop_loss: f64,
    pub trail_buffer_pct: f64,
}

impl TrailingState {
    /// Initial state for a freshly opened Holding: not yet trailing, peak at
    /// buy price, dynamic stop equal to the base stop loss.
    pub fn initial(buy_price: f64, base_stop_loss: f64) -> Self {
        Self {
            trailing_active: false,
            trailing_peak_price: buy_price,
            dynamic_stop_loss: base_stop_loss,
            trail_buffer_pct: 0.0,
        }
    }
}

/// An open position. Keyed by `symbol`; at most one per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub asset_name: String,
    pub buy_price: f64,
    /// `YYYY-MM-DD HH:MM:SS`, UTC wallclock (see DESIGN NOTES: UTC decision).
    pub buy_date: String,
    pub quantity: f64,
    pub notional: f64,
    pub current_price: f64,
    pub last_updated: String,
    pub phase1_final_score: f64,
    pub trailing: TrailingState,
    pub target_price: f64,
    pub stop_loss: f64,
    pub trigger_type: String,
    pub timeframe: String,
    pub theme: String,
    /// Full oracle output (rationale, market_condition, trading_scenarios, ...)
    /// plus the `phase1_*` augmentation fields, kept verbatim for audit.
    /// `phase1_final_score` and `trailing` above are the decision-relevant
    /// subset pulled out of this blob at load time.
    #[serde(default)]
    pub scenario: serde_json::Value,
}

/// Append-only closed-trade record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    pub symbol: String,
    pub asset_name: String,
    pub buy_price: f64,
    pub buy_date: String,
    pub quantity: f64,
    pub notional: f64,
    pub sell_price: f64,
    pub sell_date: String,
    /// Percent, e.g. `-6.047` for a 6.047% loss.
    pub profit_rate: f64,
    pub holding_hours: f64,
    pub theme: String,
    pub trigger_type: String,
    pub timeframe: String,
    pub exit_reason: ExitReasonCategory,
    /// The `Holding::scenario` blob carried over at sell time, for audit.
    #[serde(default)]
    pub scenario: serde_json::Value,
}

/// Append-only no-entry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    pub symbol: String,
    pub analyzed_date: String,
    pub current_price: f64,
    pub buy_score: Option<i64>,
    pub min_score: Option<i64>,
    pub decision: Decision,
    pub skip_reason: String,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub risk_reward_ratio: Option<f64>,
    pub trigger_type: String,
    pub timeframe: String,
    pub theme: String,
    pub scenario: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Filled,
    Unfilled,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeMode {
    Paper,
    Real,
}

/// Append-only execution ledger row. One row is appended for every
/// `PaperExchange` call, regardless of fill outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExecution {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub requested_price: Option<f64>,
    pub executed_price: Option<f64>,
    pub quantity: Option<f64>,
    pub quote_amount: Option<f64>,
    pub fee_amount: Option<f64>,
    pub mode: TradeMode,
    pub message: String,
    /// Stringified key/value metadata (e.g. `"exit_category:stop_loss"`).
    pub metadata: String,
    pub created_at: String,
}

/// Coarse classification of a sell's cause, used for per-cycle exit
/// accounting and for the executions-ledger `metadata` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReasonCategory {
    StopLoss,
    Rotation,
    Normal,
}

impl ExitReasonCategory {
    /// Classify a free-text sell reason per §4.6.4.
    pub fn classify(reason: &str) -> Self {
        let lower = reason.to_ascii_lowercase();
        if lower.contains("rotation replace:") {
            ExitReasonCategory::Rotation
        } else if lower.contains("stop loss")
            || lower.contains("trailing stop")
            || lower.contains("loss guard")
        {
            ExitReasonCategory::StopLoss
        } else {
            ExitReasonCategory::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReasonCategory::StopLoss => "stop_loss",
            ExitReasonCategory::Rotation => "rotation",
            ExitReasonCategory::Normal => "normal",
        }
    }
}

/// Supplemental read-only analytics row (see SPEC_FULL §3, §10.6). Never
/// consulted by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTrackerRow {
    pub symbol: String,
    pub analysis_date: String,
    pub analysis_price: f64,
    pub predicted_direction: Option<String>,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub buy_score: Option<i64>,
    pub decision: Decision,
    pub skip_reason: Option<String>,
    pub risk_reward_ratio: Option<f64>,
    pub price_24h: Option<f64>,
    pub price_72h: Option<f64>,
    pub price_168h: Option<f64>,
    pub return_24h: Option<f64>,
    pub return_72h: Option<f64>,
    pub return_168h: Option<f64>,
    pub hit_target: bool,
    pub hit_stop_loss: bool,
    pub tracking_status: String,
    pub was_traded: bool,
    pub trigger_type: String,
    pub timeframe: String,
    pub theme: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_reason_classifies_rotation_before_stop_loss() {
        // A rotation sell reason may itself mention a losing holding; the
        // "rotation replace:" prefix always wins.
        let reason = "rotation replace: weakest holding near stop loss";
        assert_eq!(ExitReasonCategory::classify(reason), ExitReasonCategory::Rotation);
    }

    #[test]
    fn exit_reason_classifies_stop_variants() {
        assert_eq!(ExitReasonCategory::classify("trailing stop"), ExitReasonCategory::StopLoss);
        assert_eq!(ExitReasonCategory::classify("loss guard"), ExitReasonCategory::StopLoss);
    }

    #[test]
    fn exit_reason_defaults_to_normal() {
        assert_eq!(ExitReasonCategory::classify("target reached"), ExitReasonCategory::Normal);
    }
}
