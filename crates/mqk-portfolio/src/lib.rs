//! PortfolioController (C6): holding refresh and the trailing-stop state
//! machine, the priority-ordered exit evaluator, rotation, re-entry
//! cool-down, and per-cycle exit accounting, wired together by an async
//! cycle orchestrator over `mqk-md` / `mqk-oracle` / `mqk-broker-paper` /
//! `mqk-db`.
//!
//! The decision submodules (`trailing`, `exit`, `rotation`, `cooldown`,
//! `accounting`) are pure and unit-tested in isolation; `controller` is the
//! only place that touches a database connection, a provider, or an oracle.

pub mod accounting;
pub mod controller;
pub mod cooldown;
pub mod error;
pub mod exit;
pub mod holding_build;
pub mod rotation;
pub mod trailing;

pub use accounting::ExitCounters;
pub use controller::{run_cycle, CycleOutcome, TradeSettings};
pub use error::EngineError;
pub use exit::ExitDecision;
pub use rotation::RotationOutcome;
