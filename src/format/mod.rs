//! Format plugins: the per-format tournament behavior
//!
//! Every tournament format implements [`Format`]: creation, completion
//! detection, match updates, and rating hooks. Compound formats orchestrate
//! child tournaments through the same interface. Plugins are stateless;
//! everything durable flows through the [`FormatContext`]'s store.

pub mod compound;
pub mod multi_group;
pub mod playoff;
pub mod preliminary;
pub mod registry;
pub mod round_robin;
pub mod swiss;

pub use registry::FormatRegistry;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::EventSink;
use crate::rating::{incremental_adjustment, PointTable};
use crate::store::TournamentStore;
use crate::swiss::StandingsRow;
use crate::types::{
    BracketMatch, BracketMatchId, FormatKind, Match, MatchId, NewTournament, Participant,
    PlayerId, Rating, RatingHistory, ScoreInput, SwissState, Tournament, TournamentStatus,
};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// Shared dependencies handed to every plugin call
#[derive(Clone, Copy)]
pub struct FormatContext<'a> {
    pub store: &'a dyn TournamentStore,
    pub registry: &'a FormatRegistry,
    pub events: &'a dyn EventSink,
    pub table: &'a PointTable,
    pub config: &'a EngineConfig,
    /// Current parent/child nesting level
    pub depth: u32,
}

impl<'a> FormatContext<'a> {
    /// Context for operating on a child tournament, one level down.
    pub fn descend(&self) -> Result<FormatContext<'a>> {
        if self.depth + 1 > self.config.max_nesting_depth {
            return Err(EngineError::config(format!(
                "tournament nesting exceeds the configured depth of {}",
                self.config.max_nesting_depth
            ))
            .into());
        }
        Ok(FormatContext {
            depth: self.depth + 1,
            ..*self
        })
    }
}

/// How a match update addresses its target
#[derive(Debug, Clone)]
pub enum MatchTarget {
    /// A concrete match row
    Match(MatchId),
    /// A bracket slot; resolved to (or created as) a match row by bracket
    /// formats
    Slot(BracketMatchId),
    /// Create the match being scored; only formats that allow ad hoc match
    /// creation accept this
    New {
        player1: PlayerId,
        player2: PlayerId,
    },
}

/// Whether a format rates match-by-match or in bulk at completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingMode {
    PerMatch,
    OnCompletion,
    /// Compound formats: rating happens inside the children
    None,
}

/// State transitions caused by a match update or child completion
#[derive(Debug, Clone, Default)]
pub struct StateChange {
    pub tournament_completed: bool,
    /// A new Swiss round was generated
    pub round_generated: Option<u32>,
    /// A preliminary format created its final stage
    pub final_stage_created: Option<crate::types::TournamentId>,
}

impl StateChange {
    pub fn completed() -> Self {
        Self {
            tournament_completed: true,
            ..Default::default()
        }
    }
}

/// Result of a match update
#[derive(Debug, Clone)]
pub struct MatchUpdate {
    pub match_record: Match,
    pub state_change: StateChange,
}

/// Display-oriented view of a tournament and (recursively) its children
#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub tournament: Tournament,
    pub participants: Vec<Participant>,
    pub matches: Vec<Match>,
    pub bracket: Vec<BracketMatch>,
    pub swiss: Option<SwissState>,
    pub standings: Vec<StandingsRow>,
    pub children: Vec<Schedule>,
}

impl Schedule {
    /// Plain-text rendering for printouts.
    pub fn printable(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, 0);
        out
    }

    fn render(&self, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        out.push_str(&format!(
            "{pad}{} [{}] {:?}\n",
            self.tournament.name, self.tournament.format, self.tournament.status
        ));
        for row in &self.standings {
            out.push_str(&format!(
                "{pad}  {:<20} {:>3} pts  {}\n",
                row.player_id,
                row.points,
                row.rating.map_or("unrated".to_string(), |r| r.to_string())
            ));
        }
        for m in &self.matches {
            let score = if m.player1_forfeit || m.player2_forfeit {
                "w/o".to_string()
            } else {
                format!("{}:{}", m.player1_sets, m.player2_sets)
            };
            out.push_str(&format!(
                "{pad}  {} vs {}  {}\n",
                m.player1, m.player2, score
            ));
        }
        for child in &self.children {
            child.render(out, indent + 1);
        }
    }
}

/// Trait implemented by every tournament format
#[async_trait]
pub trait Format: Send + Sync {
    fn kind(&self) -> FormatKind;

    fn rating_mode(&self) -> RatingMode;

    /// Whether cancelling keeps the recorded matches. Formats that feed the
    /// rating ledger always retain them.
    fn retain_matches_on_cancel(&self) -> bool {
        true
    }

    fn can_cancel(&self, tournament: &Tournament) -> bool {
        tournament.is_active()
    }

    /// Deletion is only allowed while nothing has been scored.
    async fn can_delete(&self, ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<bool> {
        let matches = ctx.store.matches(tournament.id).await?;
        Ok(!matches.iter().any(Match::is_scored))
    }

    /// Create the tournament with its participants and initial structure,
    /// atomically.
    async fn create_tournament(
        &self,
        ctx: &FormatContext<'_>,
        spec: NewTournament,
    ) -> Result<Tournament>;

    async fn is_complete(&self, ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<bool>;

    async fn matches_remaining(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
    ) -> Result<u32>;

    /// Resolve an update target to a concrete match row. The default handles
    /// direct match references; bracket formats override to resolve slots.
    async fn resolve_match(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        target: &MatchTarget,
    ) -> Result<Match> {
        match target {
            MatchTarget::Match(match_id) => {
                let m = ctx
                    .store
                    .match_by_id(*match_id)
                    .await?
                    .ok_or(EngineError::MatchNotFound { match_id: *match_id })?;
                if m.tournament_id != tournament.id {
                    return Err(EngineError::OwnershipMismatch {
                        entity: format!("match {match_id}"),
                        tournament_id: tournament.id,
                    }
                    .into());
                }
                Ok(m)
            }
            MatchTarget::Slot(bracket_match_id) => Err(EngineError::UnsupportedOperation {
                format: self.kind().to_string(),
                operation: format!("resolving bracket slot {bracket_match_id}"),
            }
            .into()),
            MatchTarget::New { .. } => Err(EngineError::UnsupportedOperation {
                format: self.kind().to_string(),
                operation: "ad hoc match creation".to_string(),
            }
            .into()),
        }
    }

    /// Validate and record a score, then run the format's completion and
    /// rating logic.
    async fn update_match(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        target: MatchTarget,
        score: ScoreInput,
    ) -> Result<MatchUpdate>;

    /// Completion and rating logic run after a match is scored.
    async fn on_match_completed(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        m: &Match,
    ) -> Result<StateChange>;

    /// A child of this (compound) tournament completed.
    async fn on_child_completed(
        &self,
        _ctx: &FormatContext<'_>,
        tournament: &Tournament,
        child: &Tournament,
    ) -> Result<StateChange> {
        Err(EngineError::UnsupportedOperation {
            format: tournament.format.to_string(),
            operation: format!("child-completion notification from {}", child.id),
        }
        .into())
    }

    /// Display view; the default covers basic formats and recurses into
    /// children for compound ones.
    async fn schedule(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
    ) -> Result<Schedule> {
        base_schedule(ctx, tournament).await
    }

    /// Format-specific escape hatch for operations outside the common
    /// contract (bracket reseed, previews, manual position edits).
    async fn handle_plugin_request(
        &self,
        _ctx: &FormatContext<'_>,
        tournament: &Tournament,
        _request: serde_json::Value,
    ) -> Result<serde_json::Value> {
        Err(EngineError::UnsupportedOperation {
            format: tournament.format.to_string(),
            operation: "plugin request".to_string(),
        }
        .into())
    }
}

/// Generic schedule assembly shared by the formats.
pub(crate) async fn base_schedule(
    ctx: &FormatContext<'_>,
    tournament: &Tournament,
) -> Result<Schedule> {
    let participants = ctx.store.participants(tournament.id).await?;
    let matches = ctx.store.matches(tournament.id).await?;
    let bracket = ctx.store.bracket_matches(tournament.id).await?;
    let swiss = ctx.store.swiss_state(tournament.id).await?;
    let standings = if bracket.is_empty() && !matches.is_empty() {
        crate::swiss::standings(&participants, &matches)
    } else {
        Vec::new()
    };

    let mut children = Vec::new();
    for child in ctx.store.children_of(tournament.id).await? {
        let child_ctx = ctx.descend()?;
        let plugin = ctx.registry.get(child.format)?;
        children.push(plugin.schedule(&child_ctx, &child).await?);
    }

    Ok(Schedule {
        tournament: tournament.clone(),
        participants,
        matches,
        bracket,
        swiss,
        standings,
        children,
    })
}

/// Snapshot current ratings and build the participant rows for a new
/// tournament.
pub(crate) async fn snapshot_participants(
    ctx: &FormatContext<'_>,
    tournament_id: crate::types::TournamentId,
    players: &[PlayerId],
) -> Result<Vec<Participant>> {
    let mut participants = Vec::with_capacity(players.len());
    for player in players {
        if participants
            .iter()
            .any(|p: &Participant| p.player_id == *player)
        {
            return Err(EngineError::config(format!("duplicate participant {player}")).into());
        }
        let rating = ctx.store.latest_rating(player).await?;
        participants.push(Participant::new(tournament_id, player.clone(), rating));
    }
    Ok(participants)
}

/// Score a resolved match row: uniform validation, winner sanity, persist.
pub(crate) async fn record_score(
    ctx: &FormatContext<'_>,
    m: &mut Match,
    score: &ScoreInput,
) -> Result<()> {
    score.validate()?;
    m.apply_score(score);
    ctx.store.update_match(m).await?;
    Ok(())
}

/// Per-match incremental rating with delete-then-recreate semantics.
///
/// The match's prior history rows are removed first, so the current ratings
/// read below never include this match and re-scoring can never
/// double-apply. A match involving an unrated player produces no rating
/// change.
pub(crate) async fn apply_match_rating(
    ctx: &FormatContext<'_>,
    tournament: &Tournament,
    m: &Match,
) -> Result<()> {
    ctx.store.replace_match_rating_history(m.id, vec![]).await?;

    let participants = ctx.store.participants(tournament.id).await?;
    let rating_of = |player: &PlayerId| -> Option<Rating> {
        participants
            .iter()
            .find(|p| p.player_id == *player)
            .and_then(|p| p.rating_at_entry)
    };

    let current1 = match ctx.store.latest_rating(&m.player1).await? {
        Some(rating) => Some(rating),
        None => rating_of(&m.player1),
    };
    let current2 = match ctx.store.latest_rating(&m.player2).await? {
        Some(rating) => Some(rating),
        None => rating_of(&m.player2),
    };
    let (Some(rating1), Some(rating2)) = (current1, current2) else {
        // Unrated participants: no change, no history record
        return Ok(());
    };

    let winner = m
        .winner()
        .ok_or_else(|| EngineError::invalid_score("match has no decided winner"))?;
    let player1_won = *winner == m.player1;

    let delta1 = incremental_adjustment(ctx.table, rating1, rating2, player1_won);
    let delta2 = incremental_adjustment(ctx.table, rating2, rating1, !player1_won);
    let rows = vec![
        RatingHistory::new(
            m.player1.clone(),
            tournament.id,
            Some(m.id),
            rating1 + delta1,
            delta1,
        ),
        RatingHistory::new(
            m.player2.clone(),
            tournament.id,
            Some(m.id),
            rating2 + delta2,
            delta2,
        ),
    ];
    ctx.store.replace_match_rating_history(m.id, rows).await?;
    ctx.events
        .ratings_invalidated(&[m.player1.clone(), m.player2.clone()])
        .await;
    Ok(())
}

/// Mark the tournament completed and stamp each participant's
/// post-tournament rating from the ledger.
pub(crate) async fn complete_tournament(
    ctx: &FormatContext<'_>,
    tournament: &Tournament,
) -> Result<()> {
    let mut completed = tournament.clone();
    completed.status = TournamentStatus::Completed;
    completed.completed_at = Some(crate::utils::current_timestamp());
    ctx.store.update_tournament(&completed).await?;

    stamp_post_tournament_ratings(ctx, tournament).await?;

    info!(tournament_id = %tournament.id, format = %tournament.format, "tournament completed");
    Ok(())
}

/// Stamp each participant's post-tournament rating from the ledger. Also
/// run when a corrected result shifts ratings after completion, so the
/// snapshot tracks the recompute.
pub(crate) async fn stamp_post_tournament_ratings(
    ctx: &FormatContext<'_>,
    tournament: &Tournament,
) -> Result<()> {
    for mut participant in ctx.store.participants(tournament.id).await? {
        let current = match ctx.store.latest_rating(&participant.player_id).await? {
            Some(rating) => Some(rating),
            None => participant.rating_at_entry,
        };
        participant.post_tournament_rating = current;
        ctx.store.update_participant(&participant).await?;
    }
    Ok(())
}
