//! `EngineError`: the typed error surface for the portfolio controller —
//! the one component where market data, oracle, exchange, persistence, and
//! config inputs all converge in a single cycle.
//!
//! Plain enum + hand-written `Display`, matching the house style used
//! elsewhere in this codebase rather than a derive-macro error type.

use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    /// `mqk-md` could not produce a usable price/bar series for a symbol.
    DataUnavailable { symbol: String, detail: String },
    /// The oracle produced output that could not be coerced into a `Scenario`
    /// even by the heuristic fallback.
    OracleFailure { symbol: String, detail: String },
    /// `mqk-broker-paper` rejected or left an order unfilled when the
    /// controller needed it to succeed.
    ExecutionRejected { symbol: String, detail: String },
    /// A `mqk-db` call failed.
    PersistenceError { detail: String },
    /// The resolved `EngineConfig` is internally inconsistent.
    ConfigError { detail: String },
    /// A controller invariant was violated (e.g. holdings count exceeded
    /// `max_slots` after an admission that should have been gated).
    InvariantViolation { detail: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::DataUnavailable { symbol, detail } => {
                write!(f, "data unavailable for {symbol}: {detail}")
            }
            EngineError::OracleFailure { symbol, detail } => {
                write!(f, "oracle failure for {symbol}: {detail}")
            }
            EngineError::ExecutionRejected { symbol, detail } => {
                write!(f, "execution rejected for {symbol}: {detail}")
            }
            EngineError::PersistenceError { detail } => write!(f, "persistence error: {detail}"),
            EngineError::ConfigError { detail } => write!(f, "config error: {detail}"),
            EngineError::InvariantViolation { detail } => write!(f, "invariant violation: {detail}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::PersistenceError { detail: format!("{err:#}") }
    }
}
