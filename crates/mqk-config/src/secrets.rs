//! Secret resolution — the single place that reads environment variables
//! for API credentials.
//!
//! The only secret the core cares about is `OPENAI_API_KEY` (§6
//! Environment): its presence selects the LLM oracle variant; its absence
//! switches the controller to the deterministic heuristic oracle. Values are
//! never logged or included in `Debug` output.

use std::env;

const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Resolved oracle credentials. `Debug` redacts the key itself.
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    openai_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ResolvedSecrets {
    /// Read `OPENAI_API_KEY` from the process environment. A blank value is
    /// treated the same as an absent one.
    pub fn from_env() -> Self {
        let key = env::var(OPENAI_API_KEY_VAR)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self { openai_api_key: key }
    }

    /// `true` iff an LLM oracle can be constructed; `false` selects the
    /// heuristic fallback.
    pub fn has_llm_credentials(&self) -> bool {
        self.openai_api_key.is_some()
    }

    /// The raw key, for handing to the LLM client constructor. Callers must
    /// not log this value.
    pub fn openai_api_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_key() {
        let secrets = ResolvedSecrets {
            openai_api_key: Some("sk-super-secret".to_string()),
        };
        let printed = format!("{:?}", secrets);
        assert!(!printed.contains("sk-super-secret"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn blank_env_var_counts_as_absent() {
        let secrets = ResolvedSecrets {
            openai_api_key: Some("   ".to_string()).filter(|s| !s.trim().is_empty()),
        };
        assert!(!secrets.has_llm_credentials());
    }
}
