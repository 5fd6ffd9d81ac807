//! Command handler modules for mqk-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod benchmark;
pub mod config;
pub mod db;
pub mod decide;
pub mod screen;

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;

/// Load a JSON document from a file path, stripping a UTF-8 BOM if present.
pub fn load_json_file(path: &str) -> Result<Value> {
    let bytes = fs::read(path).with_context(|| format!("read {path} failed"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = String::from_utf8(bytes.to_vec()).with_context(|| format!("{path} must be UTF-8 text"))?;
    serde_json::from_str(raw.trim()).with_context(|| format!("{path} must contain valid JSON"))
}

/// Resolve the Postgres connection override the `--db-path` flag carries
/// (see DESIGN.md): when set, it takes precedence over `MQK_DATABASE_URL`.
pub async fn connect(db_path: Option<&str>) -> Result<sqlx::PgPool> {
    match db_path {
        Some(url) => sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .with_context(|| "failed to connect to Postgres via --db-path".to_string()),
        None => mqk_db::connect_from_env().await,
    }
}
