//! Error types for the tournament engine
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the crate. The variants follow the engine's error taxonomy:
//! validation errors, structural errors, and not-yet-ready errors.

use uuid::Uuid;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific tournament-engine scenarios
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed score input: both-forfeit, a tie, or a winner that is not
    /// one of the match occupants. Surfaced to the immediate caller.
    #[error("invalid score: {reason}")]
    InvalidScore { reason: String },

    #[error("tournament not found: {tournament_id}")]
    TournamentNotFound { tournament_id: Uuid },

    #[error("match not found: {match_id}")]
    MatchNotFound { match_id: Uuid },

    #[error("bracket slot not found: {bracket_match_id}")]
    BracketSlotNotFound { bracket_match_id: Uuid },

    /// A BYE slot has no opponent and can never be played.
    #[error("bracket slot {bracket_match_id} is a BYE and cannot be played")]
    ByeSlotNotPlayable { bracket_match_id: Uuid },

    /// A match, bracket slot, or participant was addressed through a
    /// tournament it does not belong to.
    #[error("{entity} does not belong to tournament {tournament_id}")]
    OwnershipMismatch { entity: String, tournament_id: Uuid },

    /// The operation is valid but the tournament has not reached the state
    /// that allows it; the caller must re-request once state changes.
    #[error("not ready: {reason}")]
    NotYetReady { reason: String },

    /// The tournament already transitioned to COMPLETED and the operation
    /// is no longer allowed.
    #[error("tournament {tournament_id} is already completed")]
    AlreadyCompleted { tournament_id: Uuid },

    /// The format does not support the requested operation (for example
    /// scoring a match directly on a compound tournament).
    #[error("format {format} does not support {operation}")]
    UnsupportedOperation { format: String, operation: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("storage error: {message}")]
    StorageError { message: String },
}

impl EngineError {
    /// Shorthand for validation failures on score input.
    pub fn invalid_score(reason: impl Into<String>) -> Self {
        EngineError::InvalidScore {
            reason: reason.into(),
        }
    }

    /// Shorthand for configuration problems surfaced before any writes.
    pub fn config(message: impl Into<String>) -> Self {
        EngineError::ConfigurationError {
            message: message.into(),
        }
    }

    /// Shorthand for operations rejected until state changes.
    pub fn not_ready(reason: impl Into<String>) -> Self {
        EngineError::NotYetReady {
            reason: reason.into(),
        }
    }
}
