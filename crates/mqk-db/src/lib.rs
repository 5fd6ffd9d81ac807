//! Persistence layer (C8): the six-table relational store backing the
//! crypto swing-trading engine — holdings, trading_history,
//! watchlist_history, performance_tracker, holding_decisions, and
//! order_executions.
//!
//! Targets PostgreSQL via an embedded, versioned `sqlx::migrate!` set
//! (`migrations/`) rather than the reference store's runtime
//! `ALTER TABLE ... IF NOT EXISTS` probe — the idempotent-theme-column
//! behavior it grounds on is simply part of the forward-only migration here.
//!
//! This crate is a boundary crate: every fallible call returns
//! `anyhow::Result` with `.context(...)`, matching `mqk-config`'s and the
//! rest of the ambient stack's convention. Domain-level "this decision was
//! rejected" outcomes are never an `Err` here — they are rows (a Watchlist
//! insert, an unfilled/rejected OrderExecution) written by the caller.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use mqk_schemas::{
    ExitReasonCategory, Holding, OrderExecution, OrderStatus, OrderType, PerformanceTrackerRow,
    Side, TradeHistory, TradeMode, TrailingState, Watchlist,
};

pub const ENV_DB_URL: &str = "MQK_DATABASE_URL";

/// Connect to Postgres using `MQK_DATABASE_URL`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")
}

/// Run the embedded migration set. Safe to call every process start; a
/// fully migrated database is a no-op.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")
}

// ---------------------------------------------------------------------------
// holdings
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct HoldingRow {
    symbol: String,
    asset_name: String,
    buy_price: f64,
    buy_date: String,
    quantity: Option<f64>,
    notional_usd: Option<f64>,
    current_price: Option<f64>,
    last_updated: Option<String>,
    scenario: Option<Value>,
    target_price: Option<f64>,
    stop_loss: Option<f64>,
    trigger_type: Option<String>,
    timeframe: Option<String>,
    theme: Option<String>,
}

impl HoldingRow {
    fn into_domain(self) -> Holding {
        let scenario = self.scenario.unwrap_or(Value::Null);
        // Fallback chain from the reference engine's `_holding_final_score`:
        // phase1_final_score -> final_score -> risk_reward_ratio/10 (always 0
        // here since holdings carry no risk_reward_ratio column) -> 0.0.
        let phase1_final_score = scenario
            .get("phase1_final_score")
            .and_then(Value::as_f64)
            .filter(|v| *v >= 0.0)
            .or_else(|| scenario.get("final_score").and_then(Value::as_f64).filter(|v| *v >= 0.0))
            .unwrap_or(0.0);
        let trailing_active = scenario
            .get("trailing_active")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let trailing_peak_price = scenario
            .get("trailing_peak_price")
            .and_then(Value::as_f64)
            .unwrap_or(self.buy_price);
        let dynamic_stop_loss = scenario
            .get("dynamic_stop_loss")
            .and_then(Value::as_f64)
            .unwrap_or(self.stop_loss.unwrap_or(0.0));
        let trail_buffer_pct = scenario
            .get("trail_buffer_pct")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        Holding {
            symbol: self.symbol,
            asset_name: self.asset_name,
            buy_price: self.buy_price,
            buy_date: self.buy_date,
            quantity: self.quantity.unwrap_or(0.0),
            notional: self.notional_usd.unwrap_or(0.0),
            current_price: self.current_price.unwrap_or(0.0),
            last_updated: self.last_updated.unwrap_or_default(),
            phase1_final_score,
            trailing: TrailingState {
                trailing_active,
                trailing_peak_price,
                dynamic_stop_loss,
                trail_buffer_pct,
            },
            target_price: self.target_price.unwrap_or(0.0),
            stop_loss: self.stop_loss.unwrap_or(0.0),
            trigger_type: self.trigger_type.unwrap_or_default(),
            timeframe: self.timeframe.unwrap_or_default(),
            theme: self.theme.unwrap_or_else(|| "Other".to_string()),
            scenario,
        }
    }
}

pub async fn fetch_holdings(pool: &PgPool) -> Result<Vec<Holding>> {
    let rows: Vec<HoldingRow> = sqlx::query_as(
        "SELECT symbol, asset_name, buy_price, buy_date, quantity, notional_usd, current_price, \
         last_updated, scenario, target_price, stop_loss, trigger_type, timeframe, theme \
         FROM holdings ORDER BY buy_date ASC",
    )
    .fetch_all(pool)
    .await
    .context("fetch_holdings query failed")?;
    Ok(rows.into_iter().map(HoldingRow::into_domain).collect())
}

pub async fn fetch_holding(pool: &PgPool, symbol: &str) -> Result<Option<Holding>> {
    let row: Option<HoldingRow> = sqlx::query_as(
        "SELECT symbol, asset_name, buy_price, buy_date, quantity, notional_usd, current_price, \
         last_updated, scenario, target_price, stop_loss, trigger_type, timeframe, theme \
         FROM holdings WHERE symbol = $1",
    )
    .bind(symbol)
    .fetch_optional(pool)
    .await
    .context("fetch_holding query failed")?;
    Ok(row.map(HoldingRow::into_domain))
}

/// Insert a new Holding, or overwrite the existing row for its symbol — used
/// both for a fresh buy and for the per-cycle refresh (price/trailing/scenario
/// update) in place.
pub async fn upsert_holding(pool: &PgPool, holding: &Holding) -> Result<()> {
    sqlx::query(
        "INSERT INTO holdings \
         (symbol, asset_name, buy_price, buy_date, quantity, notional_usd, current_price, \
          last_updated, scenario, target_price, stop_loss, trigger_type, timeframe, theme) \
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14) \
         ON CONFLICT (symbol) DO UPDATE SET \
           current_price = EXCLUDED.current_price, \
           last_updated = EXCLUDED.last_updated, \
           scenario = EXCLUDED.scenario, \
           target_price = EXCLUDED.target_price, \
           stop_loss = EXCLUDED.stop_loss",
    )
    .bind(&holding.symbol)
    .bind(&holding.asset_name)
    .bind(holding.buy_price)
    .bind(&holding.buy_date)
    .bind(holding.quantity)
    .bind(holding.notional)
    .bind(holding.current_price)
    .bind(&holding.last_updated)
    .bind(&holding.scenario)
    .bind(holding.target_price)
    .bind(holding.stop_loss)
    .bind(&holding.trigger_type)
    .bind(&holding.timeframe)
    .bind(&holding.theme)
    .execute(pool)
    .await
    .context("upsert_holding failed")?;
    Ok(())
}

pub async fn delete_holding(pool: &PgPool, symbol: &str) -> Result<()> {
    sqlx::query("DELETE FROM holdings WHERE symbol = $1")
        .bind(symbol)
        .execute(pool)
        .await
        .context("delete_holding failed")?;
    Ok(())
}

pub async fn holdings_count(pool: &PgPool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM holdings")
        .fetch_one(pool)
        .await
        .context("holdings_count query failed")?;
    Ok(count)
}

pub async fn is_symbol_held(pool: &PgPool, symbol: &str) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM holdings WHERE symbol = $1")
        .bind(symbol)
        .fetch_one(pool)
        .await
        .context("is_symbol_held query failed")?;
    Ok(count > 0)
}

// ---------------------------------------------------------------------------
// trading_history
// ---------------------------------------------------------------------------

pub async fn insert_trade_history(pool: &PgPool, trade: &TradeHistory) -> Result<()> {
    sqlx::query(
        "INSERT INTO trading_history \
         (symbol, asset_name, buy_price, buy_date, quantity, notional_usd, sell_price, sell_date, \
          profit_rate, holding_hours, scenario, trigger_type, timeframe, theme, exit_reason) \
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)",
    )
    .bind(&trade.symbol)
    .bind(&trade.asset_name)
    .bind(trade.buy_price)
    .bind(&trade.buy_date)
    .bind(trade.quantity)
    .bind(trade.notional)
    .bind(trade.sell_price)
    .bind(&trade.sell_date)
    .bind(trade.profit_rate)
    .bind(trade.holding_hours)
    .bind(&trade.scenario)
    .bind(&trade.trigger_type)
    .bind(&trade.timeframe)
    .bind(&trade.theme)
    .bind(trade.exit_reason.as_str())
    .execute(pool)
    .await
    .context("insert_trade_history failed")?;
    Ok(())
}

/// Most recent `sell_date` for `symbol`, for re-entry cool-down evaluation.
pub async fn last_sell_date(pool: &PgPool, symbol: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT sell_date FROM trading_history WHERE symbol = $1 \
         ORDER BY sell_date DESC, id DESC LIMIT 1",
    )
    .bind(symbol)
    .fetch_optional(pool)
    .await
    .context("last_sell_date query failed")?;
    Ok(row.map(|(d,)| d))
}

#[derive(sqlx::FromRow)]
struct TradeHistoryRow {
    symbol: String,
    asset_name: String,
    buy_price: f64,
    buy_date: String,
    quantity: Option<f64>,
    notional_usd: Option<f64>,
    sell_price: f64,
    sell_date: String,
    profit_rate: f64,
    holding_hours: Option<f64>,
    scenario: Option<Value>,
    trigger_type: Option<String>,
    timeframe: Option<String>,
    theme: Option<String>,
    exit_reason: String,
}

impl TradeHistoryRow {
    fn into_domain(self) -> TradeHistory {
        TradeHistory {
            symbol: self.symbol,
            asset_name: self.asset_name,
            buy_price: self.buy_price,
            buy_date: self.buy_date,
            quantity: self.quantity.unwrap_or(0.0),
            notional: self.notional_usd.unwrap_or(0.0),
            sell_price: self.sell_price,
            sell_date: self.sell_date,
            profit_rate: self.profit_rate,
            holding_hours: self.holding_hours.unwrap_or(0.0),
            theme: self.theme.unwrap_or_else(|| "Other".to_string()),
            trigger_type: self.trigger_type.unwrap_or_default(),
            timeframe: self.timeframe.unwrap_or_default(),
            exit_reason: match self.exit_reason.as_str() {
                "rotation" => ExitReasonCategory::Rotation,
                "stop_loss" => ExitReasonCategory::StopLoss,
                _ => ExitReasonCategory::Normal,
            },
            scenario: self.scenario.unwrap_or(Value::Null),
        }
    }
}

/// Full trade history, oldest first — used by the benchmark exporter's
/// daily-P&L aggregation, which is done in Rust rather than SQL (C9).
pub async fn fetch_trade_history(pool: &PgPool) -> Result<Vec<TradeHistory>> {
    let rows: Vec<TradeHistoryRow> = sqlx::query_as(
        "SELECT symbol, asset_name, buy_price, buy_date, quantity, notional_usd, sell_price, \
         sell_date, profit_rate, holding_hours, scenario, trigger_type, timeframe, theme, exit_reason \
         FROM trading_history ORDER BY sell_date ASC, id ASC",
    )
    .fetch_all(pool)
    .await
    .context("fetch_trade_history query failed")?;
    Ok(rows.into_iter().map(TradeHistoryRow::into_domain).collect())
}

// ---------------------------------------------------------------------------
// watchlist_history
// ---------------------------------------------------------------------------

pub async fn insert_watchlist(pool: &PgPool, entry: &Watchlist) -> Result<()> {
    sqlx::query(
        "INSERT INTO watchlist_history \
         (symbol, analyzed_date, current_price, buy_score, min_score, decision, skip_reason, \
          target_price, stop_loss, risk_reward_ratio, trigger_type, timeframe, theme, scenario) \
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)",
    )
    .bind(&entry.symbol)
    .bind(&entry.analyzed_date)
    .bind(entry.current_price)
    .bind(entry.buy_score)
    .bind(entry.min_score)
    .bind(entry.decision.as_str())
    .bind(&entry.skip_reason)
    .bind(entry.target_price)
    .bind(entry.stop_loss)
    .bind(entry.risk_reward_ratio)
    .bind(&entry.trigger_type)
    .bind(&entry.timeframe)
    .bind(&entry.theme)
    .bind(&entry.scenario)
    .execute(pool)
    .await
    .context("insert_watchlist failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// performance_tracker (§10.6, supplemental / read-only analytics)
// ---------------------------------------------------------------------------

pub async fn insert_performance_tracker(
    pool: &PgPool,
    row: &PerformanceTrackerRow,
    created_at: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO performance_tracker \
         (symbol, analysis_date, analysis_price, predicted_direction, target_price, stop_loss, \
          buy_score, decision, skip_reason, risk_reward_ratio, price_24h, price_72h, price_168h, \
          return_24h, return_72h, return_168h, hit_target, hit_stop_loss, tracking_status, \
          was_traded, trigger_type, timeframe, theme, created_at) \
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24)",
    )
    .bind(&row.symbol)
    .bind(&row.analysis_date)
    .bind(row.analysis_price)
    .bind(&row.predicted_direction)
    .bind(row.target_price)
    .bind(row.stop_loss)
    .bind(row.buy_score)
    .bind(row.decision.as_str())
    .bind(&row.skip_reason)
    .bind(row.risk_reward_ratio)
    .bind(row.price_24h)
    .bind(row.price_72h)
    .bind(row.price_168h)
    .bind(row.return_24h)
    .bind(row.return_72h)
    .bind(row.return_168h)
    .bind(row.hit_target)
    .bind(row.hit_stop_loss)
    .bind(&row.tracking_status)
    .bind(row.was_traded)
    .bind(&row.trigger_type)
    .bind(&row.timeframe)
    .bind(&row.theme)
    .bind(created_at)
    .execute(pool)
    .await
    .context("insert_performance_tracker failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// order_executions
// ---------------------------------------------------------------------------

pub async fn insert_order_execution(pool: &PgPool, exec: &OrderExecution) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO order_executions \
         (symbol, side, order_type, status, requested_price, executed_price, quantity, \
          quote_amount, fee_amount, mode, message, metadata, created_at) \
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13) RETURNING id",
    )
    .bind(&exec.symbol)
    .bind(side_str(exec.side))
    .bind(order_type_str(exec.order_type))
    .bind(order_status_str(exec.status))
    .bind(exec.requested_price)
    .bind(exec.executed_price)
    .bind(exec.quantity)
    .bind(exec.quote_amount)
    .bind(exec.fee_amount)
    .bind(trade_mode_str(exec.mode))
    .bind(&exec.message)
    .bind(&exec.metadata)
    .bind(&exec.created_at)
    .fetch_one(pool)
    .await
    .context("insert_order_execution failed")?;
    Ok(id)
}

#[derive(sqlx::FromRow)]
struct OrderExecutionRow {
    symbol: String,
    side: String,
    order_type: String,
    status: String,
    requested_price: Option<f64>,
    executed_price: Option<f64>,
    quantity: Option<f64>,
    quote_amount: Option<f64>,
    fee_amount: Option<f64>,
    mode: String,
    message: Option<String>,
    metadata: Option<String>,
    created_at: String,
}

impl OrderExecutionRow {
    fn into_domain(self) -> OrderExecution {
        OrderExecution {
            symbol: self.symbol,
            side: match self.side.as_str() {
                "sell" => Side::Sell,
                _ => Side::Buy,
            },
            order_type: match self.order_type.as_str() {
                "limit" => OrderType::Limit,
                _ => OrderType::Market,
            },
            status: match self.status.as_str() {
                "unfilled" => OrderStatus::Unfilled,
                "rejected" => OrderStatus::Rejected,
                _ => OrderStatus::Filled,
            },
            requested_price: self.requested_price,
            executed_price: self.executed_price,
            quantity: self.quantity,
            quote_amount: self.quote_amount,
            fee_amount: self.fee_amount,
            mode: match self.mode.as_str() {
                "real" => TradeMode::Real,
                _ => TradeMode::Paper,
            },
            message: self.message.unwrap_or_default(),
            metadata: self.metadata.unwrap_or_default(),
            created_at: self.created_at,
        }
    }
}

/// Most recent `limit` executions, newest first — used by the benchmark
/// exporter's `order_executions` section.
pub async fn fetch_order_executions(pool: &PgPool, limit: i64) -> Result<Vec<OrderExecution>> {
    let rows: Vec<OrderExecutionRow> = sqlx::query_as(
        "SELECT symbol, side, order_type, status, requested_price, executed_price, quantity, \
         quote_amount, fee_amount, mode, message, metadata, created_at \
         FROM order_executions ORDER BY created_at DESC, id DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("fetch_order_executions query failed")?;
    Ok(rows.into_iter().map(OrderExecutionRow::into_domain).collect())
}

fn side_str(s: Side) -> &'static str {
    match s {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

fn order_type_str(t: OrderType) -> &'static str {
    match t {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
    }
}

fn order_status_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Filled => "filled",
        OrderStatus::Unfilled => "unfilled",
        OrderStatus::Rejected => "rejected",
    }
}

fn trade_mode_str(m: TradeMode) -> &'static str {
    match m {
        TradeMode::Paper => "paper",
        TradeMode::Real => "real",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// DB-backed test, skipped if `MQK_DATABASE_URL` is not set — same
    /// convention as the rest of the ambient stack's scenario tests.
    async fn connect_or_skip() -> Option<PgPool> {
        match std::env::var(ENV_DB_URL) {
            Ok(url) => Some(
                PgPoolOptions::new()
                    .max_connections(2)
                    .connect(&url)
                    .await
                    .expect("connect"),
            ),
            Err(_) => {
                eprintln!("SKIP: {ENV_DB_URL} not set");
                None
            }
        }
    }

    #[tokio::test]
    async fn migrate_is_idempotent() -> Result<()> {
        let Some(pool) = connect_or_skip().await else {
            return Ok(());
        };
        migrate(&pool).await?;
        migrate(&pool).await?;
        Ok(())
    }

    #[tokio::test]
    async fn holding_round_trips_through_upsert_and_fetch() -> Result<()> {
        let Some(pool) = connect_or_skip().await else {
            return Ok(());
        };
        migrate(&pool).await?;

        let holding = Holding {
            symbol: "TEST-USD".to_string(),
            asset_name: "TEST".to_string(),
            buy_price: 100.0,
            buy_date: "2026-01-01 00:00:00".to_string(),
            quantity: 1.0,
            notional: 100.0,
            current_price: 100.0,
            last_updated: "2026-01-01 00:00:00".to_string(),
            phase1_final_score: 0.7,
            trailing: TrailingState::initial(100.0, 95.0),
            target_price: 110.0,
            stop_loss: 95.0,
            trigger_type: "Volume-Momentum".to_string(),
            timeframe: "1h".to_string(),
            theme: "L1".to_string(),
            scenario: serde_json::json!({"phase1_final_score": 0.7}),
        };
        upsert_holding(&pool, &holding).await?;
        assert!(is_symbol_held(&pool, "TEST-USD").await?);

        let fetched = fetch_holding(&pool, "TEST-USD").await?.expect("row present");
        assert_eq!(fetched.buy_price, 100.0);
        assert_eq!(fetched.phase1_final_score, 0.7);

        delete_holding(&pool, "TEST-USD").await?;
        assert!(!is_symbol_held(&pool, "TEST-USD").await?);
        Ok(())
    }
}
