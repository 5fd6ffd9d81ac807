//! Phase-1 `mqk screen`: fetch bars for the universe, run the two-pass
//! hybrid selector, and write the Phase-1 JSON document (§6).

use anyhow::{Context, Result};
use mqk_config::EngineConfig;
use mqk_md::{CoinGeckoProvider, MarketData};
use mqk_strategy::output::{build_phase1_json, Phase1Metadata};

pub struct ScreenArgs {
    pub config_paths: Vec<String>,
    pub symbols: Option<Vec<String>>,
    pub interval: String,
    pub period: String,
    pub output: Option<String>,
}

pub async fn run(args: ScreenArgs) -> Result<()> {
    let path_refs: Vec<&str> = args.config_paths.iter().map(String::as_str).collect();
    let (mut config, _) = EngineConfig::load(&path_refs)?;
    if let Some(symbols) = args.symbols {
        config.universe = symbols;
    }
    if args.interval != "1h" {
        tracing::info!(interval = %args.interval, "overriding default screen interval");
    }

    let provider = CoinGeckoProvider::new();
    let md = MarketData::new(provider);

    let mut bars_by_symbol = Vec::with_capacity(config.universe.len());
    for symbol in &config.universe {
        let bars = md.fetch_bars(symbol, &args.period, &args.interval).await;
        if bars.is_empty() {
            tracing::warn!(symbol, "no bars returned for universe symbol, skipping");
            continue;
        }
        bars_by_symbol.push((symbol.clone(), bars));
    }

    let universe_size = config.universe.len();
    let groups = mqk_strategy::run_cycle(&bars_by_symbol, &config);
    let doc = build_phase1_json(
        &groups,
        Phase1Metadata {
            interval: args.interval,
            period: args.period,
            universe_size,
            max_positions: config.selector.max_positions,
            fallback_max_entries: config.selector.fallback_max_entries,
        },
    );

    let text = serde_json::to_string_pretty(&doc).context("serialize phase-1 document")?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, &text).with_context(|| format!("write {path} failed"))?;
            tracing::info!(path, "saved phase-1 output");
        }
        None => println!("{text}"),
    }
    Ok(())
}
