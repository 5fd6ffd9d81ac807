//! Config hash stability: identical merged content hashes identically
//! regardless of key order, and different content hashes differently.

use mqk_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
universe:
  - "BTC-USD"
  - "ETH-USD"
portfolio:
  max_slots: 10
  rotation_min_score_delta: 0.12
exchange:
  fee_rate: 0.001
  slippage_rate: 0.0005
"#;

const BASE_YAML_REORDERED: &str = r#"
exchange:
  slippage_rate: 0.0005
  fee_rate: 0.001
portfolio:
  rotation_min_score_delta: 0.12
  max_slots: 10
universe:
  - "BTC-USD"
  - "ETH-USD"
"#;

const DIFFERENT_YAML: &str = r#"
portfolio:
  max_slots: 5
"#;

#[test]
fn identical_layers_hash_identically_on_repeat_calls() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn key_reordering_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn different_values_hash_differently() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[DIFFERENT_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn later_layer_overrides_earlier_layer() {
    let overlay = r#"
portfolio:
  max_slots: 20
"#;
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, overlay]).unwrap();
    assert_eq!(
        loaded.config_json.pointer("/portfolio/max_slots").and_then(|v| v.as_i64()),
        Some(20)
    );
    // Keys not touched by the overlay survive the merge.
    assert_eq!(
        loaded
            .config_json
            .pointer("/exchange/fee_rate")
            .and_then(|v| v.as_f64()),
        Some(0.001)
    );
}
