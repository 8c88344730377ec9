//! Persistence port for the tournament engine
//!
//! The engine is request-scoped and stateless between invocations: all
//! durable state lives behind this trait. Implementations must apply the
//! bundle and replace-history operations atomically; the engine assumes the
//! caller serializes operations on a single tournament.

pub mod memory;

pub use memory::InMemoryStore;

use crate::error::Result;
use crate::types::{
    BracketMatch, BracketMatchId, Match, MatchId, Participant, PlayerId, PointExchangeRule,
    Rating, RatingHistory, SwissState, Tournament, TournamentId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Everything created together with a tournament, written in one transaction
#[derive(Debug, Clone)]
pub struct TournamentBundle {
    pub tournament: Tournament,
    pub participants: Vec<Participant>,
    pub matches: Vec<Match>,
    pub bracket_matches: Vec<BracketMatch>,
    pub swiss_state: Option<SwissState>,
}

/// Trait for tournament persistence operations
#[async_trait]
pub trait TournamentStore: Send + Sync {
    /// Atomically create a tournament together with its participants and
    /// initial matches, bracket slots, and Swiss state.
    async fn create_tournament_bundle(&self, bundle: TournamentBundle) -> Result<()>;

    async fn tournament(&self, id: TournamentId) -> Result<Option<Tournament>>;

    async fn update_tournament(&self, tournament: &Tournament) -> Result<()>;

    /// Child tournaments of a compound parent, ordered by group number with
    /// non-grouped children (the final stage) last.
    async fn children_of(&self, parent_id: TournamentId) -> Result<Vec<Tournament>>;

    /// Remove a tournament and all rows hanging off it, including children.
    async fn delete_tournament(&self, id: TournamentId) -> Result<()>;

    async fn participants(&self, tournament_id: TournamentId) -> Result<Vec<Participant>>;

    async fn update_participant(&self, participant: &Participant) -> Result<()>;

    /// Matches ordered by play sequence.
    async fn matches(&self, tournament_id: TournamentId) -> Result<Vec<Match>>;

    async fn match_by_id(&self, id: MatchId) -> Result<Option<Match>>;

    async fn insert_match(&self, m: &Match) -> Result<()>;

    async fn update_match(&self, m: &Match) -> Result<()>;

    async fn bracket_matches(&self, tournament_id: TournamentId) -> Result<Vec<BracketMatch>>;

    async fn bracket_match(&self, id: BracketMatchId) -> Result<Option<BracketMatch>>;

    async fn update_bracket_match(&self, bracket_match: &BracketMatch) -> Result<()>;

    async fn swiss_state(&self, tournament_id: TournamentId) -> Result<Option<SwissState>>;

    async fn update_swiss_state(&self, state: &SwissState) -> Result<()>;

    /// A player's rating ledger in recording order.
    async fn rating_history(&self, player_id: &PlayerId) -> Result<Vec<RatingHistory>>;

    /// The player's current rating: the latest ledger entry, None if the
    /// player has never been rated.
    async fn latest_rating(&self, player_id: &PlayerId) -> Result<Option<Rating>>;

    /// Atomically delete all history rows for the match and insert the given
    /// replacements. Re-scoring a match is delete-then-recreate, never
    /// append, so retries can never double-apply a delta.
    async fn replace_match_rating_history(
        &self,
        match_id: MatchId,
        rows: Vec<RatingHistory>,
    ) -> Result<()>;

    /// Atomically replace the tournament-level history rows (those with no
    /// match id) for the tournament. Per-match rows are untouched.
    async fn replace_tournament_rating_history(
        &self,
        tournament_id: TournamentId,
        rows: Vec<RatingHistory>,
    ) -> Result<()>;

    /// The point-exchange rule generation in force at the given instant;
    /// empty when no rules have been stored.
    async fn point_rules_effective_at(
        &self,
        when: DateTime<Utc>,
    ) -> Result<Vec<PointExchangeRule>>;

    async fn insert_point_rules(&self, rules: Vec<PointExchangeRule>) -> Result<()>;
}
