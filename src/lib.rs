//! Matchpoint - Multi-format tournament engine
//!
//! This crate runs round robin, single-elimination playoff, Swiss, and
//! compound multi-stage tournaments, computing point-exchange skill ratings
//! from match results. It is a library behind a persistence port: callers
//! bring the store (and optionally an event sink), the engine brings the
//! format logic.

pub mod bracket;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod format;
pub mod rating;
pub mod store;
pub mod swiss;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{EngineError, Result};
pub use types::*;

// Re-export key components
pub use config::EngineConfig;
pub use engine::TournamentEngine;
pub use events::{EventSink, NoopEventSink};
pub use format::{Format, FormatRegistry, MatchTarget, MatchUpdate, Schedule, StateChange};
pub use store::{InMemoryStore, TournamentStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
