//! Daily time-series construction: realized/unrealized equity, BTC close,
//! and equal-weight universe benchmark (§4.9).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use mqk_schemas::{Holding, TradeHistory};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One row of the exported `points` series.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchmarkPoint {
    pub date: String,
    pub algo_equity: f64,
    pub btc_equity: f64,
    pub universe_equity: f64,
}

fn parse_buy_date(buy_date: &str) -> Option<NaiveDate> {
    // `buy_date` is `YYYY-MM-DD HH:MM:SS`; the date component is what matters here.
    buy_date.split(' ').next().and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
}

/// Earliest `buy_date` across current holdings and trade history, or `today`
/// when the store has no rows yet (a brand-new deployment gets a
/// single-point series rather than an error).
pub fn strategy_start_date(holdings: &[Holding], history: &[TradeHistory], today: NaiveDate) -> NaiveDate {
    holdings
        .iter()
        .filter_map(|h| parse_buy_date(&h.buy_date))
        .chain(history.iter().filter_map(|t| parse_buy_date(&t.buy_date)))
        .min()
        .unwrap_or(today)
}

/// Realized P&L in dollars for one closed trade, per §4.9: `notional *
/// profit_rate / 100`, falling back to `quantity * buy_price * profit_rate /
/// 100` when `notional` is zero (older rows predating the notional column).
fn realized_pnl(trade: &TradeHistory) -> f64 {
    if trade.notional > 0.0 {
        trade.notional * trade.profit_rate / 100.0
    } else {
        trade.quantity * trade.buy_price * trade.profit_rate / 100.0
    }
}

/// Unrealized P&L in dollars for one open holding.
fn unrealized_pnl(holding: &Holding) -> f64 {
    (holding.current_price - holding.buy_price) * holding.quantity
}

/// Cumulative realized P&L per day, keyed by the trade's `sell_date`
/// (date component only), sorted ascending.
fn daily_realized(history: &[TradeHistory]) -> BTreeMap<NaiveDate, f64> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for trade in history {
        let Some(day) = trade.sell_date.split(' ').next().and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
        else {
            continue;
        };
        *by_day.entry(day).or_insert(0.0) += realized_pnl(trade);
    }
    by_day
}

/// Build the `algo_equity` series over `[start, end]` inclusive: running sum
/// of realized P&L per day, with the current unrealized P&L added only to
/// the last (today) point.
pub fn algo_equity_series(
    holdings: &[Holding],
    history: &[TradeHistory],
    initial_capital: f64,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(NaiveDate, f64)> {
    let realized_by_day = daily_realized(history);
    let total_unrealized: f64 = holdings.iter().map(unrealized_pnl).sum();

    let mut series = Vec::new();
    let mut cumulative = 0.0;
    let mut day = start;
    loop {
        cumulative += realized_by_day.get(&day).copied().unwrap_or(0.0);
        let mut equity = initial_capital + cumulative;
        if day == end {
            equity += total_unrealized;
        }
        series.push((day, equity));
        if day == end {
            break;
        }
        day = day.succ_opt().unwrap_or(end);
    }
    series
}

/// Build an equity-style series from a sparse daily-close map: percent
/// return vs the first aligned date, applied to `initial_capital`, carrying
/// forward the last known price across gaps.
pub fn benchmark_equity_series(
    closes: &BTreeMap<NaiveDate, f64>,
    initial_capital: f64,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(NaiveDate, f64)> {
    let mut series = Vec::new();
    let mut last_known: Option<f64> = None;
    let mut base: Option<f64> = None;
    let mut day = start;
    loop {
        if let Some(price) = closes.get(&day) {
            last_known = Some(*price);
            if base.is_none() {
                base = Some(*price);
            }
        }
        let equity = match (base, last_known) {
            (Some(b), Some(p)) if b > 0.0 => initial_capital * (p / b),
            _ => initial_capital,
        };
        series.push((day, equity));
        if day == end {
            break;
        }
        day = day.succ_opt().unwrap_or(end);
    }
    series
}

/// Average per-symbol percent return vs the first date each symbol has a
/// price for, producing one blended daily close series usable by
/// [`benchmark_equity_series`].
pub fn equal_weight_universe_closes(per_symbol: &BTreeMap<String, BTreeMap<NaiveDate, f64>>) -> BTreeMap<NaiveDate, f64> {
    let mut all_days: std::collections::BTreeSet<NaiveDate> = std::collections::BTreeSet::new();
    for series in per_symbol.values() {
        all_days.extend(series.keys().copied());
    }

    let mut last_known: BTreeMap<&String, f64> = BTreeMap::new();
    let mut base: BTreeMap<&String, f64> = BTreeMap::new();
    let mut blended = BTreeMap::new();

    for day in all_days {
        let mut returns = Vec::new();
        for (symbol, series) in per_symbol {
            if let Some(price) = series.get(&day) {
                last_known.insert(symbol, *price);
                base.entry(symbol).or_insert(*price);
            }
            if let Some(price) = last_known.get(symbol) {
                if let Some(b) = base.get(symbol) {
                    if *b > 0.0 {
                        returns.push(price / b);
                    }
                }
            }
        }
        if !returns.is_empty() {
            let avg = returns.iter().sum::<f64>() / returns.len() as f64;
            blended.insert(day, avg);
        }
    }
    blended
}
