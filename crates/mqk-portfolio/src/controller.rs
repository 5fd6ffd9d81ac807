//! Async cycle orchestrator: the only part of this crate that touches a
//! database connection, a market-data provider, an oracle, or the paper
//! exchange. Mirrors `update_holdings()` + `process_candidates_file()` —
//! refresh and exit-evaluate every open holding first, then walk the
//! Phase-1 candidate groups applying admission, cool-down, and rotation.

use chrono::{DateTime, Utc};
use mqk_broker_paper::PaperExchange;
use mqk_config::PortfolioConfig;
use mqk_md::{MarketData, Provider};
use mqk_oracle::Oracle;
use mqk_schemas::{classify_symbol_theme, Decision, ExitReasonCategory, Holding, TradeHistory, TriggerCandidate};
use sqlx::PgPool;
use uuid::Uuid;

use crate::accounting::ExitCounters;
use crate::cooldown;
use crate::error::EngineError;
use crate::exit::{self, holding_hours};
use crate::holding_build::{
    build_holding, build_performance_tracker, build_watchlist, sync_trailing_into_scenario, FillContext,
};
use crate::rotation::{self, RotationOutcome};
use crate::trailing;

/// Trade execution settings resolved from the Phase-2 CLI contract (§6):
/// `--execute-trades`, `--quote-amount`, `--rotation-reentry-cooldown-hours`.
/// `--trade-mode` is validated by the caller — only `paper` is implemented,
/// so by the time a `TradeSettings` exists the mode is already known-good.
#[derive(Debug, Clone)]
pub struct TradeSettings {
    pub execute_trades: bool,
    pub quote_amount: f64,
    pub rotation_reentry_cooldown_hours: f64,
    /// Oracle rationale language (`"ko"` or `"en"`); affects only the
    /// free-text scenario rationale, never the entry/exit decisions.
    pub language: String,
}

/// `(entry_count, no_entry_count, sold_count)` from the reference engine,
/// plus the exit-category tally logged at the end of every cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOutcome {
    pub entry_count: u32,
    pub no_entry_count: u32,
    pub sold_count: u32,
    pub exits: ExitCounters,
}

fn exit_category_metadata(reason: &str) -> String {
    format!("exit_category:{}", ExitReasonCategory::classify(reason).as_str())
}

/// Sell `holding` for `reason`: execute through `exchange` when trading is
/// enabled (recording the fill as an `OrderExecution`), archive a
/// `TradeHistory` row, and remove the holding. Returns whether the sell
/// completed — a rejected/unfilled paper execution leaves the holding in
/// place and returns `false`, matching `_sell_holding`'s `execute_trades`
/// failure path.
async fn sell_holding(
    pool: &PgPool,
    exchange: Option<&PaperExchange>,
    holding: &Holding,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<bool, EngineError> {
    let mut execution_price = holding.current_price;
    let quantity = if holding.quantity > 0.0 {
        holding.quantity
    } else if holding.buy_price > 0.0 && holding.notional > 0.0 {
        holding.notional / holding.buy_price
    } else {
        0.0
    };

    if let Some(exchange) = exchange {
        let metadata = exit_category_metadata(reason);
        let (outcome, execution) =
            exchange.sell_all(&holding.symbol, holding.current_price, quantity, None, &metadata);
        mqk_db::insert_order_execution(pool, &execution).await.map_err(EngineError::from)?;
        if !outcome.filled {
            tracing::warn!(symbol = %holding.symbol, message = %outcome.message, "paper sell failed");
            return Ok(false);
        }
        execution_price = outcome.executed_price;
    }

    let hours = holding_hours(holding, now);
    let profit_rate =
        if holding.buy_price > 0.0 { (execution_price - holding.buy_price) / holding.buy_price * 100.0 } else { 0.0 };

    let trade = TradeHistory {
        symbol: holding.symbol.clone(),
        asset_name: holding.asset_name.clone(),
        buy_price: holding.buy_price,
        buy_date: holding.buy_date.clone(),
        quantity: holding.quantity,
        notional: holding.notional,
        sell_price: execution_price,
        sell_date: now.format(exit::BUY_DATE_FORMAT).to_string(),
        profit_rate,
        holding_hours: hours,
        theme: holding.theme.clone(),
        trigger_type: holding.trigger_type.clone(),
        timeframe: holding.timeframe.clone(),
        exit_reason: ExitReasonCategory::classify(reason),
        scenario: holding.scenario.clone(),
    };
    mqk_db::insert_trade_history(pool, &trade).await.map_err(EngineError::from)?;
    mqk_db::delete_holding(pool, &holding.symbol).await.map_err(EngineError::from)?;
    Ok(true)
}

/// Refresh every open holding: fetch spot price (falling back to the stored
/// price on a failed fetch), roll the trailing-stop state machine, evaluate
/// the priority-ordered exit rules, and either sell or persist the refreshed
/// holding. Returns the number sold and their exit-category tally.
pub async fn refresh_holdings<P: Provider>(
    pool: &PgPool,
    md: &MarketData<P>,
    exchange: Option<&PaperExchange>,
    cfg: &PortfolioConfig,
    now: DateTime<Utc>,
) -> Result<(u32, ExitCounters), EngineError> {
    let holdings = mqk_db::fetch_holdings(pool).await.map_err(EngineError::from)?;
    let mut sold = 0u32;
    let mut exits = ExitCounters::default();

    for mut holding in holdings {
        let live_price = md.spot_price(&holding.symbol).await;
        let price = if live_price > 0.0 { live_price } else { holding.current_price };
        trailing::refresh(&mut holding, price, cfg.max_trail_buffer);

        let decision = exit::evaluate(&holding, now);
        if decision.should_sell {
            if sell_holding(pool, exchange, &holding, &decision.reason, now).await? {
                exits.record(&decision.reason);
                sold += 1;
            } else {
                sync_trailing_into_scenario(&mut holding);
                holding.last_updated = now.format(exit::BUY_DATE_FORMAT).to_string();
                mqk_db::upsert_holding(pool, &holding).await.map_err(EngineError::from)?;
            }
        } else {
            sync_trailing_into_scenario(&mut holding);
            holding.last_updated = now.format(exit::BUY_DATE_FORMAT).to_string();
            mqk_db::upsert_holding(pool, &holding).await.map_err(EngineError::from)?;
        }
    }

    Ok((sold, exits))
}

/// Attempt to buy `symbol` directly (slots available). Returns the filled
/// `FillContext`, or `None` when trading is enabled and the paper exchange
/// rejected/left the order unfilled.
async fn try_buy(
    pool: &PgPool,
    exchange: Option<&PaperExchange>,
    symbol: &str,
    market_price: f64,
    quote_amount: f64,
    metadata: &str,
) -> Result<Option<FillContext>, EngineError> {
    let Some(exchange) = exchange else {
        return Ok(Some(FillContext::default()));
    };
    let (outcome, execution) = exchange.buy(symbol, market_price, quote_amount, None, metadata);
    mqk_db::insert_order_execution(pool, &execution).await.map_err(EngineError::from)?;
    if !outcome.filled {
        tracing::warn!(symbol, message = %outcome.message, "paper buy failed");
        return Ok(None);
    }
    Ok(Some(FillContext {
        executed_price: Some(outcome.executed_price),
        quantity: Some(outcome.quantity),
        quote_amount: Some(outcome.quote_amount),
    }))
}

/// Attempt a rotation: sell the weakest eligible holding, then buy
/// `candidate`. Both sides must succeed; a failed post-sell buy leaves the
/// candidate to be recorded in Watchlist by the caller and the target
/// holding already sold (matching `_try_rotation_entry`'s
/// non-transactional sell-then-buy sequencing).
async fn try_rotation_entry(
    pool: &PgPool,
    exchange: Option<&PaperExchange>,
    symbol: &str,
    _trigger_type: &str,
    new_final_score: f64,
    now: DateTime<Utc>,
    cfg: &PortfolioConfig,
) -> Result<(bool, String, u32), EngineError> {
    let holdings = mqk_db::fetch_holdings(pool).await.map_err(EngineError::from)?;
    match rotation::plan(symbol, new_final_score, &holdings, now, cfg) {
        RotationOutcome::Blocked { reason } => Ok((false, reason, 0)),
        RotationOutcome::Rotate { target_symbol, reason } => {
            let target = holdings.iter().find(|h| h.symbol == target_symbol).expect("planned target exists");
            if !sell_holding(pool, exchange, target, &reason, now).await? {
                return Ok((false, format!("rotation sell failed: {target_symbol}"), 0));
            }
            // The replacement buy itself is attempted by the caller with the
            // real candidate price/quote amount (`admit_candidate`); this
            // function only clears the slot.
            Ok((true, reason, 1))
        }
    }
}

/// Write the supplemental `performance_tracker` row for one decision (§10.6).
/// Read-only analytics — never awaited for its own error beyond logging-style
/// propagation, since it mirrors the Watchlist/Holding write it always
/// accompanies.
#[allow(clippy::too_many_arguments)]
async fn track_performance(
    pool: &PgPool,
    symbol: &str,
    trigger_type: &str,
    timeframe: &str,
    candidate: &TriggerCandidate,
    scenario: &mqk_schemas::Scenario,
    skip_reason: Option<&str>,
    was_traded: bool,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    let row = build_performance_tracker(symbol, trigger_type, timeframe, candidate, scenario, skip_reason, was_traded, now);
    let created_at = now.format(exit::BUY_DATE_FORMAT).to_string();
    mqk_db::insert_performance_tracker(pool, &row, &created_at).await.map_err(EngineError::from)
}

#[allow(clippy::too_many_arguments)]
async fn admit_candidate(
    pool: &PgPool,
    md_spot_price: f64,
    exchange: Option<&PaperExchange>,
    symbol: &str,
    trigger_type: &str,
    timeframe: &str,
    candidate: &TriggerCandidate,
    settings: &TradeSettings,
    cfg: &PortfolioConfig,
    rotations_done: &mut usize,
    now: DateTime<Utc>,
) -> Result<(bool, bool, String), EngineError> {
    // Returns (entered, rotated, reason_if_no_entry).
    let scenario = mqk_oracle::select_oracle(&mqk_config::ResolvedSecrets::from_env())
        .analyze(symbol, trigger_type, candidate, &settings.language)
        .await;

    let entry_condition = scenario.decision == Decision::Entry && scenario.buy_score >= scenario.min_score;
    if !entry_condition {
        let reason = if scenario.decision != Decision::Entry || scenario.buy_score < scenario.min_score {
            format!("decision={}, score={}/{}", scenario.decision, scenario.buy_score, scenario.min_score)
        } else {
            "no entry".to_string()
        };
        let watchlist = build_watchlist(symbol, trigger_type, timeframe, candidate, &scenario, &reason, now);
        mqk_db::insert_watchlist(pool, &watchlist).await.map_err(EngineError::from)?;
        track_performance(pool, symbol, trigger_type, timeframe, candidate, &scenario, Some(&reason), false, now).await?;
        return Ok((false, false, reason));
    }

    let slots_full = mqk_db::holdings_count(pool).await.map_err(EngineError::from)? as usize >= cfg.max_slots;
    if slots_full {
        if *rotations_done >= cfg.rotation_max_per_cycle {
            let reason = format!(
                "max slots reached ({}), rotation limit reached ({}/cycle)",
                cfg.max_slots, cfg.rotation_max_per_cycle
            );
            let watchlist = build_watchlist(symbol, trigger_type, timeframe, candidate, &scenario, &reason, now);
            mqk_db::insert_watchlist(pool, &watchlist).await.map_err(EngineError::from)?;
            track_performance(pool, symbol, trigger_type, timeframe, candidate, &scenario, Some(&reason), false, now).await?;
            return Ok((false, false, reason));
        }

        let (rotated, reason, rotated_count) =
            try_rotation_entry(pool, exchange, symbol, trigger_type, candidate.final_score, now, cfg).await?;
        if rotated {
            *rotations_done += rotated_count as usize;
            let fill = try_buy(
                pool,
                exchange,
                symbol,
                md_spot_price,
                settings.quote_amount,
                &format!("trigger_type:{trigger_type},rotation:true"),
            )
            .await?;
            let Some(fill) = fill else {
                let reason = "paper buy failed after rotation".to_string();
                let watchlist = build_watchlist(symbol, trigger_type, timeframe, candidate, &scenario, &reason, now);
                mqk_db::insert_watchlist(pool, &watchlist).await.map_err(EngineError::from)?;
                track_performance(pool, symbol, trigger_type, timeframe, candidate, &scenario, Some(&reason), false, now)
                    .await?;
                return Ok((true, true, reason));
            };
            let holding = build_holding(symbol, trigger_type, timeframe, candidate, &scenario, fill, now);
            mqk_db::upsert_holding(pool, &holding).await.map_err(EngineError::from)?;
            track_performance(pool, symbol, trigger_type, timeframe, candidate, &scenario, None, true, now).await?;
            return Ok((true, true, String::new()));
        }
        let watchlist = build_watchlist(symbol, trigger_type, timeframe, candidate, &scenario, &reason, now);
        mqk_db::insert_watchlist(pool, &watchlist).await.map_err(EngineError::from)?;
        track_performance(pool, symbol, trigger_type, timeframe, candidate, &scenario, Some(&reason), false, now).await?;
        return Ok((false, false, reason));
    }

    let fill = try_buy(
        pool,
        exchange,
        symbol,
        md_spot_price,
        settings.quote_amount,
        &format!("trigger_type:{trigger_type}"),
    )
    .await?;
    let Some(fill) = fill else {
        let reason = "paper buy failed".to_string();
        let watchlist = build_watchlist(symbol, trigger_type, timeframe, candidate, &scenario, &reason, now);
        mqk_db::insert_watchlist(pool, &watchlist).await.map_err(EngineError::from)?;
        track_performance(pool, symbol, trigger_type, timeframe, candidate, &scenario, Some(&reason), false, now).await?;
        return Ok((false, false, reason));
    };
    let holding = build_holding(symbol, trigger_type, timeframe, candidate, &scenario, fill, now);
    mqk_db::upsert_holding(pool, &holding).await.map_err(EngineError::from)?;
    track_performance(pool, symbol, trigger_type, timeframe, candidate, &scenario, None, true, now).await?;
    Ok((true, false, String::new()))
}

/// Run one full cycle: refresh holdings and evaluate exits, then walk the
/// Phase-1 candidate groups applying admission, cool-down, and rotation.
/// Mirrors `process_candidates_file`. `run_id`/`config_hash` identify the
/// cycle in both the start/end log events and the caller's audit ledger
/// (§10.2/§10.3) — this function only logs them, it never writes the ledger
/// itself.
#[allow(clippy::too_many_arguments)]
pub async fn run_cycle<P: Provider>(
    pool: &PgPool,
    md: &MarketData<P>,
    exchange: Option<&PaperExchange>,
    candidate_groups: &[(&'static str, Vec<TriggerCandidate>)],
    timeframe: &str,
    settings: &TradeSettings,
    cfg: &PortfolioConfig,
    now: DateTime<Utc>,
    run_id: Uuid,
    config_hash: &str,
) -> Result<CycleOutcome, EngineError> {
    let candidate_count: usize = candidate_groups.iter().map(|(_, c)| c.len()).sum();
    tracing::info!(%run_id, config_hash, candidate_count, "cycle start");

    let (sold_from_refresh, mut exits) = refresh_holdings(pool, md, exchange, cfg, now).await?;
    let mut outcome = CycleOutcome { sold_count: sold_from_refresh, ..Default::default() };
    let mut rotations_done = 0usize;

    for (trigger_type, candidates) in candidate_groups {
        for candidate in candidates {
            let symbol = &candidate.snapshot.symbol;
            if symbol.is_empty() {
                continue;
            }

            if mqk_db::is_symbol_held(pool, symbol).await.map_err(EngineError::from)? {
                tracing::info!(symbol, "skip already-held symbol");
                continue;
            }

            let last_sell = mqk_db::last_sell_date(pool, symbol).await.map_err(EngineError::from)?;
            let (cooldown_active, cooldown_reason) =
                cooldown::evaluate(last_sell.as_deref(), now, settings.rotation_reentry_cooldown_hours);
            if cooldown_active {
                let fallback = mqk_oracle::malformed_output_fallback();
                let watchlist =
                    build_watchlist(symbol, trigger_type, timeframe, candidate, &fallback, &cooldown_reason, now);
                mqk_db::insert_watchlist(pool, &watchlist).await.map_err(EngineError::from)?;
                track_performance(
                    pool,
                    symbol,
                    trigger_type,
                    timeframe,
                    candidate,
                    &fallback,
                    Some(&cooldown_reason),
                    false,
                    now,
                )
                .await?;
                outcome.no_entry_count += 1;
                continue;
            }

            let mut candidate = candidate.clone();
            if candidate.snapshot.theme.is_empty() {
                candidate.snapshot.theme = classify_symbol_theme(symbol).as_str().to_string();
            }
            let spot_price = md.spot_price(symbol).await;
            let market_price = if spot_price > 0.0 { spot_price } else { candidate.snapshot.close };

            let (entered, rotated, reason) = admit_candidate(
                pool,
                market_price,
                exchange,
                symbol,
                trigger_type,
                timeframe,
                &candidate,
                settings,
                cfg,
                &mut rotations_done,
                now,
            )
            .await?;

            if entered {
                outcome.entry_count += 1;
                if rotated {
                    outcome.sold_count += 1;
                    exits.record("rotation replace:");
                }
            } else {
                outcome.no_entry_count += 1;
                tracing::info!(symbol, trigger_type, reason, "NO_ENTRY");
            }
        }
    }

    outcome.exits = exits;
    tracing::info!(
        %run_id,
        config_hash,
        entries = outcome.entry_count,
        no_entries = outcome.no_entry_count,
        stop_loss = outcome.exits.stop_loss,
        rotation = outcome.exits.rotation,
        normal = outcome.exits.normal,
        total = outcome.exits.total(),
        "cycle end"
    );
    Ok(outcome)
}
