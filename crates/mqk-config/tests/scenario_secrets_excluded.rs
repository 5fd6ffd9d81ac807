//! `OPENAI_API_KEY` resolution (§6 Environment): its presence/absence
//! selects the oracle variant, and it never leaks into Debug output.

use mqk_config::ResolvedSecrets;
use std::sync::Mutex;

// Serializes tests that mutate the shared process environment.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn absent_key_selects_heuristic_oracle() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var("OPENAI_API_KEY");
    let secrets = ResolvedSecrets::from_env();
    assert!(!secrets.has_llm_credentials());
    assert!(secrets.openai_api_key().is_none());
}

#[test]
fn blank_key_counts_as_absent() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("OPENAI_API_KEY", "   ");
    let secrets = ResolvedSecrets::from_env();
    assert!(!secrets.has_llm_credentials());
    std::env::remove_var("OPENAI_API_KEY");
}

#[test]
fn present_key_selects_llm_oracle_and_is_redacted() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("OPENAI_API_KEY", "sk-test-not-a-real-key");
    let secrets = ResolvedSecrets::from_env();
    assert!(secrets.has_llm_credentials());
    assert_eq!(secrets.openai_api_key(), Some("sk-test-not-a-real-key"));
    let printed = format!("{:?}", secrets);
    assert!(!printed.contains("sk-test-not-a-real-key"));
    std::env::remove_var("OPENAI_API_KEY");
}
