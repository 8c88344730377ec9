//! Utility functions for the tournament engine

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique tournament ID
pub fn generate_tournament_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique bracket slot ID
pub fn generate_bracket_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Absolute difference between two ratings
pub fn rating_difference(rating1: i32, rating2: i32) -> u32 {
    (rating1 - rating2).unsigned_abs()
}

/// Install a global tracing subscriber honoring `RUST_LOG`, falling back to
/// the given directive. Embedding applications that bring their own
/// subscriber should skip this; calling it twice returns an error.
pub fn init_tracing(default_level: &str) -> crate::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
