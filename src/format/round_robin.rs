//! Round robin: every participant plays every other once
//!
//! All matches are pre-created at tournament creation. Rating runs in bulk at
//! completion via the multi-pass recompute, writing at most one history
//! record per player.

use super::{
    complete_tournament, record_score, snapshot_participants, stamp_post_tournament_ratings,
    Format, FormatContext, MatchTarget, MatchUpdate, RatingMode, StateChange,
};
use crate::error::{EngineError, Result};
use crate::rating::{multi_pass_recompute, MatchResult};
use crate::store::TournamentBundle;
use crate::types::{
    FormatConfig, FormatKind, Match, NewTournament, Participant, PlayerId, RatingHistory,
    ScoreInput, Tournament, TournamentStatus,
};
use async_trait::async_trait;
use tracing::{debug, info};

pub struct RoundRobinFormat;

#[async_trait]
impl Format for RoundRobinFormat {
    fn kind(&self) -> FormatKind {
        FormatKind::RoundRobin
    }

    fn rating_mode(&self) -> RatingMode {
        RatingMode::OnCompletion
    }

    async fn create_tournament(
        &self,
        ctx: &FormatContext<'_>,
        spec: NewTournament,
    ) -> Result<Tournament> {
        if spec.players.len() < 2 {
            return Err(EngineError::config("a round robin needs at least two players").into());
        }
        if !matches!(spec.config, FormatConfig::None) {
            return Err(EngineError::config("round robin takes no format configuration").into());
        }

        let tournament = Tournament {
            id: crate::utils::generate_tournament_id(),
            name: spec.name,
            format: FormatKind::RoundRobin,
            status: TournamentStatus::Active,
            parent_id: spec.parent_id,
            group_number: spec.group_number,
            config: FormatConfig::None,
            created_at: crate::utils::current_timestamp(),
            completed_at: None,
        };
        let participants = snapshot_participants(ctx, tournament.id, &spec.players).await?;

        let mut matches = Vec::new();
        let mut sequence = 0;
        for i in 0..spec.players.len() {
            for j in (i + 1)..spec.players.len() {
                matches.push(Match::new(
                    tournament.id,
                    spec.players[i].clone(),
                    spec.players[j].clone(),
                    sequence,
                ));
                sequence += 1;
            }
        }

        info!(
            tournament_id = %tournament.id,
            players = spec.players.len(),
            matches = matches.len(),
            "creating round robin tournament"
        );
        ctx.store
            .create_tournament_bundle(TournamentBundle {
                tournament: tournament.clone(),
                participants,
                matches,
                bracket_matches: vec![],
                swiss_state: None,
            })
            .await?;
        Ok(tournament)
    }

    async fn is_complete(&self, ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<bool> {
        let matches = ctx.store.matches(tournament.id).await?;
        Ok(matches.iter().all(Match::is_scored))
    }

    async fn matches_remaining(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
    ) -> Result<u32> {
        let matches = ctx.store.matches(tournament.id).await?;
        Ok(matches.iter().filter(|m| !m.is_scored()).count() as u32)
    }

    async fn resolve_match(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        target: &MatchTarget,
    ) -> Result<Match> {
        // All pairings exist up front, so a by-players reference resolves to
        // the pre-created row rather than minting a duplicate.
        if let MatchTarget::New { player1, player2 } = target {
            let matches = ctx.store.matches(tournament.id).await?;
            return matches
                .iter()
                .find(|m| m.involves(player1) && m.involves(player2))
                .cloned()
                .ok_or_else(|| {
                    EngineError::config(format!(
                        "no pairing of {player1} and {player2} in this tournament"
                    ))
                    .into()
                });
        }
        default_resolve(self, ctx, tournament, target).await
    }

    async fn update_match(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        target: MatchTarget,
        score: ScoreInput,
    ) -> Result<MatchUpdate> {
        let mut m = self.resolve_match(ctx, tournament, &target).await?;
        record_score(ctx, &mut m, &score).await?;
        let state_change = self.on_match_completed(ctx, tournament, &m).await?;
        Ok(MatchUpdate {
            match_record: m,
            state_change,
        })
    }

    async fn on_match_completed(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        _m: &Match,
    ) -> Result<StateChange> {
        let matches = ctx.store.matches(tournament.id).await?;
        if !matches.iter().all(Match::is_scored) {
            return Ok(StateChange::default());
        }

        let participants = ctx.store.participants(tournament.id).await?;
        recompute_tournament_ratings(ctx, tournament, &participants, &matches).await?;

        // A corrected result after completion recomputes ratings but does not
        // complete the tournament a second time; the post-tournament
        // snapshots still follow the recompute.
        if !tournament.is_active() {
            stamp_post_tournament_ratings(ctx, tournament).await?;
            return Ok(StateChange::default());
        }
        complete_tournament(ctx, tournament).await?;
        Ok(StateChange::completed())
    }
}

/// Default by-id resolution, shared with the trait's provided method.
async fn default_resolve(
    format: &dyn Format,
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
        _ => Err(EngineError::UnsupportedOperation {
            format: format.kind().to_string(),
            operation: "bracket slot resolution".to_string(),
        }
        .into()),
    }
}

/// Bulk multi-pass rating over the finished tournament. One ledger row per
/// player whose rating actually moved; rewriting is idempotent because the
/// tournament's bulk rows are replaced wholesale.
async fn recompute_tournament_ratings(
    ctx: &FormatContext<'_>,
    tournament: &Tournament,
    participants: &[Participant],
    matches: &[Match],
) -> Result<()> {
    let snapshot = |player: &PlayerId| -> Option<i32> {
        participants
            .iter()
            .find(|p| p.player_id == *player)
            .and_then(|p| p.rating_at_entry)
    };

    let mut rows = Vec::new();
    let mut touched = Vec::new();
    for participant in participants {
        let results: Vec<MatchResult> = matches
            .iter()
            .filter(|m| m.is_scored() && m.involves(&participant.player_id))
            .filter_map(|m| {
                let opponent = m.opponent_of(&participant.player_id)?;
                Some(MatchResult {
                    opponent_rating: snapshot(opponent)?,
                    won: m.winner() == Some(&participant.player_id),
                })
            })
            .collect();

        let initial = participant.rating_at_entry;
        let Some(final_rating) = multi_pass_recompute(ctx.table, initial, &results) else {
            continue;
        };
        let initial = initial.unwrap_or(final_rating);
        if final_rating == initial {
            debug!(player = %participant.player_id, rating = final_rating, "rating unchanged");
            continue;
        }
        rows.push(RatingHistory::new(
            participant.player_id.clone(),
            tournament.id,
            None,
            final_rating,
            final_rating - initial,
        ));
        touched.push(participant.player_id.clone());
    }

    ctx.store
        .replace_tournament_rating_history(tournament.id, rows)
        .await?;
    if !touched.is_empty() {
        ctx.events.ratings_invalidated(&touched).await;
    }
    Ok(())
}
