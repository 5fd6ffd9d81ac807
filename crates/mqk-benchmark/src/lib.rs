//! BenchmarkExporter (C9): read-only analytics over the persisted
//! holdings/trade-history/executions tables, producing the JSON document
//! consumed by the dashboard (§4.9). Never mutates engine state.

pub mod cycles;
pub mod series;

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use mqk_db::{fetch_holdings, fetch_order_executions, fetch_trade_history};
use mqk_md::provider::{CoinGeckoProvider, FetchRequest, Provider};
use mqk_schemas::{ExitReasonCategory, Holding, OrderExecution, TradeHistory};
use serde::Serialize;
use sqlx::PgPool;

pub use cycles::{parse_recent_cycles, CycleRecord};
pub use series::{algo_equity_series, benchmark_equity_series, equal_weight_universe_closes, strategy_start_date};

const ORDER_EXECUTION_LIMIT: i64 = 200;
const UNIVERSE_LOOKBACK_DAYS: i64 = 120;

#[derive(Debug, Clone, Serialize)]
pub struct ExitReasonCounts {
    pub stop_loss: i64,
    pub rotation: i64,
    pub normal: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSummary {
    pub algo_return_pct: f64,
    pub btc_return_pct: f64,
    pub universe_return_pct: f64,
    pub alpha_vs_btc_pct: f64,
    pub alpha_vs_universe_pct: f64,
    pub trades: usize,
    pub win_rate_pct: f64,
    pub open_positions: usize,
    pub exit_reasons: ExitReasonCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkDocument {
    pub summary: BenchmarkSummary,
    pub points: Vec<series::BenchmarkPoint>,
    pub holdings: Vec<Holding>,
    pub order_executions: Vec<OrderExecution>,
    pub recent_cycles: Vec<CycleRecord>,
}

fn pct_return(series: &[(NaiveDate, f64)]) -> f64 {
    match (series.first(), series.last()) {
        (Some((_, first)), Some((_, last))) if *first > 0.0 => (last / first - 1.0) * 100.0,
        _ => 0.0,
    }
}

fn exit_reason_counts(history: &[TradeHistory]) -> ExitReasonCounts {
    let mut counts = ExitReasonCounts { stop_loss: 0, rotation: 0, normal: 0 };
    for trade in history {
        match trade.exit_reason {
            ExitReasonCategory::StopLoss => counts.stop_loss += 1,
            ExitReasonCategory::Rotation => counts.rotation += 1,
            ExitReasonCategory::Normal => counts.normal += 1,
        }
    }
    counts
}

fn win_rate_pct(history: &[TradeHistory]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let wins = history.iter().filter(|t| t.profit_rate > 0.0).count();
    wins as f64 / history.len() as f64 * 100.0
}

/// Fetch BTC daily closes for `[start, end]` via `provider`, falling back to
/// an empty series (the exporter then falls back to local execution prices
/// for the benchmark track) when the provider is unreachable.
async fn fetch_btc_closes(
    provider: &CoinGeckoProvider,
    start: NaiveDate,
    end: NaiveDate,
) -> BTreeMap<NaiveDate, f64> {
    let days = (end - start).num_days().max(1) + 1;
    let req = FetchRequest { symbol: "BTC-USD".to_string(), period: format!("{days}d"), interval: "1d".to_string() };
    match provider.fetch_bars(&req).await {
        Ok(bars) => bars
            .into_iter()
            .filter_map(|bar| {
                chrono::DateTime::from_timestamp(bar.ts, 0).map(|dt| (dt.date_naive(), bar.close))
            })
            .collect(),
        Err(_) => BTreeMap::new(),
    }
}

/// Static fallback when the BTC provider is unavailable: a flat series
/// anchored on the latest known execution price for BTC, if any.
fn btc_closes_from_local_executions(executions: &[OrderExecution]) -> BTreeMap<NaiveDate, f64> {
    let mut closes = BTreeMap::new();
    for exec in executions {
        if !exec.symbol.starts_with("BTC") {
            continue;
        }
        let Some(price) = exec.executed_price.or(exec.requested_price) else { continue };
        let Some(day) = exec.created_at.split(' ').next().and_then(|d| NaiveDate::parse_from_str(d, series::DATE_FORMAT).ok())
        else {
            continue;
        };
        closes.insert(day, price);
    }
    closes
}

/// Per-symbol daily close series for the equal-weight universe benchmark,
/// built the same way as the BTC series, one symbol at a time.
async fn fetch_universe_closes(
    provider: &CoinGeckoProvider,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> BTreeMap<String, BTreeMap<NaiveDate, f64>> {
    let mut per_symbol = BTreeMap::new();
    let days = (end - start).num_days().max(1) + 1;
    for symbol in symbols {
        let req = FetchRequest { symbol: symbol.clone(), period: format!("{days}d"), interval: "1d".to_string() };
        if let Ok(bars) = provider.fetch_bars(&req).await {
            let closes: BTreeMap<NaiveDate, f64> = bars
                .into_iter()
                .filter_map(|bar| chrono::DateTime::from_timestamp(bar.ts, 0).map(|dt| (dt.date_naive(), bar.close)))
                .collect();
            if !closes.is_empty() {
                per_symbol.insert(symbol.clone(), closes);
            }
        }
    }
    per_symbol
}

/// Build the full export document. `universe` drives the equal-weight
/// benchmark and is typically the configured trading universe; `scheduler_log`
/// is the optional text of a scheduler log file for `recent_cycles`.
pub async fn export(
    pool: &PgPool,
    provider: &CoinGeckoProvider,
    universe: &[String],
    initial_capital: f64,
    scheduler_log: Option<&str>,
) -> Result<BenchmarkDocument> {
    let holdings = fetch_holdings(pool).await?;
    let history = fetch_trade_history(pool).await?;
    let executions = fetch_order_executions(pool, ORDER_EXECUTION_LIMIT).await?;

    let today = Utc::now().date_naive();
    let start = strategy_start_date(&holdings, &history, today);
    let end = today;

    let algo_points = algo_equity_series(&holdings, &history, initial_capital, start, end);

    let mut btc_closes = fetch_btc_closes(provider, start, end).await;
    if btc_closes.is_empty() {
        btc_closes = btc_closes_from_local_executions(&executions);
    }
    let btc_points = benchmark_equity_series(&btc_closes, initial_capital, start, end);

    let universe_lookback_start = start.min(today - chrono::Duration::days(UNIVERSE_LOOKBACK_DAYS));
    let per_symbol_closes = fetch_universe_closes(provider, universe, universe_lookback_start, end).await;
    let universe_closes = equal_weight_universe_closes(&per_symbol_closes);
    let universe_points = benchmark_equity_series(&universe_closes, initial_capital, start, end);

    let points: Vec<series::BenchmarkPoint> = algo_points
        .iter()
        .zip(btc_points.iter())
        .zip(universe_points.iter())
        .map(|((a, b), u)| series::BenchmarkPoint {
            date: a.0.format(series::DATE_FORMAT).to_string(),
            algo_equity: a.1,
            btc_equity: b.1,
            universe_equity: u.1,
        })
        .collect();

    let algo_return_pct = pct_return(&algo_points);
    let btc_return_pct = pct_return(&btc_points);
    let universe_return_pct = pct_return(&universe_points);

    let recent_cycles = match scheduler_log {
        Some(text) => parse_recent_cycles(text, Utc::now(), 20),
        None => Vec::new(),
    };

    Ok(BenchmarkDocument {
        summary: BenchmarkSummary {
            algo_return_pct,
            btc_return_pct,
            universe_return_pct,
            alpha_vs_btc_pct: algo_return_pct - btc_return_pct,
            alpha_vs_universe_pct: algo_return_pct - universe_return_pct,
            trades: history.len(),
            win_rate_pct: win_rate_pct(&history),
            open_positions: holdings.len(),
            exit_reasons: exit_reason_counts(&history),
        },
        points,
        holdings,
        order_executions: executions,
        recent_cycles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution(symbol: &str, price: f64, created_at: &str) -> OrderExecution {
        OrderExecution {
            symbol: symbol.to_string(),
            side: mqk_schemas::Side::Buy,
            order_type: mqk_schemas::OrderType::Market,
            status: mqk_schemas::OrderStatus::Filled,
            requested_price: Some(price),
            executed_price: Some(price),
            quantity: Some(1.0),
            quote_amount: Some(price),
            fee_amount: Some(0.1),
            mode: mqk_schemas::TradeMode::Paper,
            message: "ok".to_string(),
            metadata: String::new(),
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn btc_fallback_uses_local_executions_for_btc_symbols_only() {
        let execs = vec![
            execution("BTC-USD", 50_000.0, "2026-07-20 00:00:00"),
            execution("ETH-USD", 3_000.0, "2026-07-20 00:00:00"),
        ];
        let closes = btc_closes_from_local_executions(&execs);
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[&NaiveDate::from_ymd_opt(2026, 7, 20).unwrap()], 50_000.0);
    }

    #[test]
    fn pct_return_is_zero_on_degenerate_series() {
        assert_eq!(pct_return(&[]), 0.0);
        assert_eq!(pct_return(&[(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), 0.0)]), 0.0);
    }

    #[test]
    fn win_rate_counts_positive_profit_rate_trades() {
        let history = vec![
            TradeHistory {
                symbol: "BTC-USD".to_string(),
                asset_name: "BTC".to_string(),
                buy_price: 100.0,
                buy_date: "2026-01-01 00:00:00".to_string(),
                quantity: 1.0,
                notional: 100.0,
                sell_price: 110.0,
                sell_date: "2026-01-02 00:00:00".to_string(),
                profit_rate: 10.0,
                holding_hours: 24.0,
                theme: "L1".to_string(),
                trigger_type: "Volume-Momentum".to_string(),
                timeframe: "1h".to_string(),
                exit_reason: ExitReasonCategory::Normal,
                scenario: serde_json::Value::Null,
            },
            TradeHistory {
                symbol: "ETH-USD".to_string(),
                asset_name: "ETH".to_string(),
                buy_price: 100.0,
                buy_date: "2026-01-01 00:00:00".to_string(),
                quantity: 1.0,
                notional: 100.0,
                sell_price: 90.0,
                sell_date: "2026-01-02 00:00:00".to_string(),
                profit_rate: -10.0,
                holding_hours: 24.0,
                theme: "L1".to_string(),
                trigger_type: "Volume-Momentum".to_string(),
                timeframe: "1h".to_string(),
                exit_reason: ExitReasonCategory::StopLoss,
                scenario: serde_json::Value::Null,
            },
        ];
        assert_eq!(win_rate_pct(&history), 50.0);
        let counts = exit_reason_counts(&history);
        assert_eq!(counts.stop_loss, 1);
        assert_eq!(counts.normal, 1);
    }
}
