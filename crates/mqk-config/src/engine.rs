//! Engine-wide tunables: universe, trigger thresholds, rotation/trailing
//! constants, fee/slippage rates. Loaded through the layered-YAML + canonical
//! hash machinery in the crate root so every cycle's audit record can carry
//! the exact `config_hash` that produced it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{load_layered_yaml, LoadedConfig};

/// Base (pre-tightening) gate thresholds for one trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerThresholds {
    pub volume_momentum_vr_min: f64,
    pub volume_momentum_r1_min: f64,
    pub volatility_trend_r4_min: f64,
    pub range_breakout_vr_min: f64,
    /// Adaptive-tightening factor applied to the above (§4.3).
    pub tighten_factor: f64,
    /// Top-N ranked candidates kept per trigger before the final selector runs.
    pub top_n: usize,
}

impl Default for TriggerThresholds {
    fn default() -> Self {
        Self {
            volume_momentum_vr_min: 1.8,
            volume_momentum_r1_min: 1.5,
            volatility_trend_r4_min: 3.0,
            range_breakout_vr_min: 1.5,
            tighten_factor: 0.25,
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub max_positions: usize,
    pub fallback_max_entries: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_positions: 3,
            fallback_max_entries: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub max_slots: usize,
    pub rotation_min_score_delta: f64,
    pub rotation_loss_priority_pct: f64,
    pub rotation_max_per_cycle: usize,
    pub rotation_min_holding_hours: f64,
    pub max_trail_buffer: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            max_slots: 10,
            rotation_min_score_delta: 0.12,
            rotation_loss_priority_pct: -2.0,
            rotation_max_per_cycle: 1,
            rotation_min_holding_hours: 4.0,
            max_trail_buffer: 0.04,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub fee_rate: f64,
    pub slippage_rate: f64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.001,
            slippage_rate: 0.0005,
        }
    }
}

fn default_universe() -> Vec<String> {
    [
        "BTC-USD", "ETH-USD", "SOL-USD", "XRP-USD", "ADA-USD", "AVAX-USD", "DOGE-USD", "DOT-USD",
        "LINK-USD", "MATIC-USD", "LTC-USD", "UNI-USD", "ATOM-USD", "NEAR-USD", "APT-USD",
        "ARB-USD",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_benchmark_output_path() -> String {
    "dashboard/public/crypto_benchmark_data.json".to_string()
}

fn default_initial_capital() -> f64 {
    1000.0
}

/// The full engine configuration, deep-merged from zero or more layered YAML
/// files over these defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub universe: Vec<String>,
    pub triggers: TriggerThresholds,
    pub selector: SelectorConfig,
    pub portfolio: PortfolioConfig,
    pub exchange: ExchangeConfig,
    pub benchmark_output_path: String,
    pub initial_capital: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            universe: default_universe(),
            triggers: TriggerThresholds::default(),
            selector: SelectorConfig::default(),
            portfolio: PortfolioConfig::default(),
            exchange: ExchangeConfig::default(),
            benchmark_output_path: default_benchmark_output_path(),
            initial_capital: default_initial_capital(),
        }
    }
}

impl EngineConfig {
    /// Load zero or more layered YAML override files on top of
    /// [`EngineConfig::default`]. Returns the resolved config plus the
    /// canonical-hash envelope so callers can attach `config_hash` to the
    /// cycle's audit record.
    pub fn load(paths: &[&str]) -> Result<(EngineConfig, LoadedConfig)> {
        if paths.is_empty() {
            let default = EngineConfig::default();
            let loaded = LoadedConfig {
                config_json: serde_json::to_value(&default).context("serialize defaults")?,
                canonical_json: serde_json::to_string(&default).context("serialize defaults")?,
                config_hash: String::new(),
            };
            return Ok((default, loaded));
        }

        let loaded = load_layered_yaml(paths)?;
        let config: EngineConfig = serde_json::from_value(loaded.config_json.clone())
            .context("engine config did not match expected shape")?;
        Ok((config, loaded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.portfolio.max_slots, 10);
        assert_eq!(cfg.portfolio.rotation_min_score_delta, 0.12);
        assert_eq!(cfg.portfolio.rotation_loss_priority_pct, -2.0);
        assert_eq!(cfg.portfolio.rotation_max_per_cycle, 1);
        assert_eq!(cfg.portfolio.rotation_min_holding_hours, 4.0);
        assert_eq!(cfg.exchange.fee_rate, 0.001);
        assert_eq!(cfg.exchange.slippage_rate, 0.0005);
        assert_eq!(cfg.selector.max_positions, 3);
        assert_eq!(cfg.selector.fallback_max_entries, 1);
    }

    #[test]
    fn load_with_no_paths_returns_defaults() {
        let (config, loaded) = EngineConfig::load(&[]).expect("defaults must load");
        assert_eq!(config, EngineConfig::default());
        assert!(loaded.config_hash.is_empty());
    }
}
