//! `mqk benchmark-export`: run the read-only BenchmarkExporter (C9) and
//! write its JSON document to `--output` (defaulting to the configured
//! `benchmark_output_path`).

use anyhow::{Context, Result};
use mqk_config::EngineConfig;
use mqk_md::CoinGeckoProvider;

use super::connect;

pub struct BenchmarkArgs {
    pub db_path: Option<String>,
    pub output: Option<String>,
    pub scheduler_log: Option<String>,
    pub config_paths: Vec<String>,
}

pub async fn run(args: BenchmarkArgs) -> Result<()> {
    let path_refs: Vec<&str> = args.config_paths.iter().map(String::as_str).collect();
    let (config, _) = EngineConfig::load(&path_refs)?;

    let pool = connect(args.db_path.as_deref()).await?;
    let provider = CoinGeckoProvider::new();

    let scheduler_log_text = match &args.scheduler_log {
        Some(path) => Some(std::fs::read_to_string(path).with_context(|| format!("read {path} failed"))?),
        None => None,
    };

    let doc = mqk_benchmark::export(
        &pool,
        &provider,
        &config.universe,
        config.initial_capital,
        scheduler_log_text.as_deref(),
    )
    .await?;

    let text = serde_json::to_string_pretty(&doc).context("serialize benchmark document")?;
    let out_path = args.output.unwrap_or(config.benchmark_output_path);
    if let Some(parent) = std::path::Path::new(&out_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {} failed", parent.display()))?;
        }
    }
    std::fs::write(&out_path, text).with_context(|| format!("write {out_path} failed"))?;
    println!("benchmark_output={out_path}");
    Ok(())
}
