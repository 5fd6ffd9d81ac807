//! Phase-2 `mqk decide`: load the Phase-1 candidates, refresh holdings,
//! and apply admission/rotation/cool-down against the persisted portfolio
//! (§6 Phase-2 CLI contract).

use anyhow::{bail, Context, Result};
use chrono::Utc;
use mqk_audit::AuditWriter;
use mqk_broker_paper::PaperExchange;
use mqk_config::{EngineConfig, ResolvedSecrets};
use mqk_md::{CoinGeckoProvider, MarketData};
use mqk_portfolio::controller::{run_cycle, TradeSettings};
use uuid::Uuid;

use super::{connect, load_json_file};

pub struct DecideArgs {
    pub candidates_json: String,
    pub db_path: Option<String>,
    pub language: String,
    pub timeframe: String,
    pub execute_trades: bool,
    pub trade_mode: String,
    pub quote_amount: f64,
    pub rotation_reentry_cooldown_hours: f64,
    pub config_paths: Vec<String>,
    /// Append-only audit log path (§10's "audit ledger"). Skipped when unset.
    pub audit_log: Option<String>,
}

pub async fn run(args: DecideArgs) -> Result<()> {
    if args.trade_mode != "paper" {
        bail!("--trade-mode '{}' is not implemented; only 'paper' is supported", args.trade_mode);
    }
    if args.rotation_reentry_cooldown_hours < 0.0 {
        bail!("--rotation-reentry-cooldown-hours must be >= 0");
    }

    let doc = load_json_file(&args.candidates_json)
        .with_context(|| format!("loading candidates from {}", args.candidates_json))?;
    let candidate_groups = mqk_strategy::output::parse_phase1_json(&doc)?;

    let path_refs: Vec<&str> = args.config_paths.iter().map(String::as_str).collect();
    let (config, loaded) = EngineConfig::load(&path_refs)?;
    let run_id = Uuid::new_v4();

    let pool = connect(args.db_path.as_deref()).await?;
    mqk_db::migrate(&pool).await?;

    let secrets = ResolvedSecrets::from_env();
    tracing::info!(has_llm = secrets.has_llm_credentials(), "oracle credential check");

    let provider = CoinGeckoProvider::new();
    let md = MarketData::new(provider);
    let exchange = if args.execute_trades {
        Some(PaperExchange::new(config.exchange.fee_rate, config.exchange.slippage_rate))
    } else {
        None
    };

    let settings = TradeSettings {
        execute_trades: args.execute_trades,
        quote_amount: args.quote_amount,
        rotation_reentry_cooldown_hours: args.rotation_reentry_cooldown_hours,
        language: args.language,
    };

    let outcome = run_cycle(
        &pool,
        &md,
        exchange.as_ref(),
        &candidate_groups,
        &args.timeframe,
        &settings,
        &config.portfolio,
        Utc::now(),
        run_id,
        &loaded.config_hash,
    )
    .await
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    if let Some(audit_path) = &args.audit_log {
        let mut writer = AuditWriter::new(audit_path, true).context("open audit log")?;
        writer
            .append(
                run_id,
                "decide",
                "cycle_complete",
                serde_json::json!({
                    "config_hash": loaded.config_hash,
                    "entries": outcome.entry_count,
                    "no_entries": outcome.no_entry_count,
                    "sold": outcome.sold_count,
                    "exits": {
                        "stop_loss": outcome.exits.stop_loss,
                        "rotation": outcome.exits.rotation,
                        "normal": outcome.exits.normal,
                    },
                }),
            )
            .context("append audit event")?;
    }

    println!(
        "entries={} no_entries={} sold={} exits(stop_loss={},rotation={},normal={})",
        outcome.entry_count,
        outcome.no_entry_count,
        outcome.sold_count,
        outcome.exits.stop_loss,
        outcome.exits.rotation,
        outcome.exits.normal,
    );
    Ok(())
}
