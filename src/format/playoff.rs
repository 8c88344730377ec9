//! Single-elimination playoff
//!
//! The whole bracket tree is laid out at creation. Externally a playoff is
//! addressed by bracket slot; the slot is resolved to (or lazily created as)
//! a match row when scored. Rating is incremental, one exchange per played
//! match.

use super::{
    apply_match_rating, complete_tournament, record_score, snapshot_participants,
    stamp_post_tournament_ratings, Format, FormatContext, MatchTarget, MatchUpdate, RatingMode,
    StateChange,
};
use crate::bracket::{
    advance_winner, bracket_size, build_bracket, generate_positions, reseed, rewrite_first_round,
    seed, SeedEntry,
};
use crate::error::{EngineError, Result};
use crate::store::TournamentBundle;
use crate::types::{
    BracketMatch, FormatConfig, FormatKind, Match, NewTournament, ScoreInput, Slot, Tournament,
    TournamentStatus,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

pub struct PlayoffFormat;

/// Escape-hatch operations that don't fit the common format contract
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum PlayoffRequest {
    /// Rewrite the first round from current ratings
    Reseed,
    /// Compute first-round positions without writing anything
    Preview,
    /// Manually assign the first-round positions
    SetPositions { positions: Vec<Slot> },
}

#[async_trait]
impl Format for PlayoffFormat {
    fn kind(&self) -> FormatKind {
        FormatKind::Playoff
    }

    fn rating_mode(&self) -> RatingMode {
        RatingMode::PerMatch
    }

    async fn create_tournament(
        &self,
        ctx: &FormatContext<'_>,
        spec: NewTournament,
    ) -> Result<Tournament> {
        if spec.players.len() < 2 {
            return Err(EngineError::config("a playoff needs at least two players").into());
        }
        let (explicit_positions, number_of_seeds) = match &spec.config {
            FormatConfig::None => (None, None),
            FormatConfig::Playoff {
                bracket_positions,
                number_of_seeds,
            } => (bracket_positions.clone(), *number_of_seeds),
            other => {
                return Err(EngineError::config(format!(
                    "configuration {other:?} does not apply to a playoff"
                ))
                .into())
            }
        };

        let tournament = Tournament {
            id: crate::utils::generate_tournament_id(),
            name: spec.name,
            format: FormatKind::Playoff,
            status: TournamentStatus::Active,
            parent_id: spec.parent_id,
            group_number: spec.group_number,
            config: spec.config.clone(),
            created_at: crate::utils::current_timestamp(),
            completed_at: None,
        };
        let participants = snapshot_participants(ctx, tournament.id, &spec.players).await?;

        let size = bracket_size(spec.players.len());
        let positions = match explicit_positions {
            Some(positions) => {
                validate_positions(&positions, size, &spec.players)?;
                positions
            }
            None => {
                let entries: Vec<SeedEntry> = participants
                    .iter()
                    .map(|p| SeedEntry {
                        player_id: p.player_id.clone(),
                        rating: p.rating_at_entry,
                    })
                    .collect();
                let seeded = seed(&entries);
                let seeds = number_of_seeds.or(ctx.config.default_seed_count);
                generate_positions(&seeded, size, seeds, &mut rand::thread_rng())?
            }
        };

        let bracket = build_bracket(tournament.id, &positions)?;

        info!(
            tournament_id = %tournament.id,
            players = spec.players.len(),
            bracket_size = size,
            "creating playoff tournament"
        );
        ctx.store
            .create_tournament_bundle(TournamentBundle {
                tournament: tournament.clone(),
                participants,
                matches: vec![],
                bracket_matches: bracket,
                swiss_state: None,
            })
            .await?;
        Ok(tournament)
    }

    async fn is_complete(&self, ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<bool> {
        Ok(self.matches_remaining(ctx, tournament).await? == 0)
    }

    async fn matches_remaining(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
    ) -> Result<u32> {
        let bracket = ctx.store.bracket_matches(tournament.id).await?;
        let matches: HashMap<_, _> = ctx
            .store
            .matches(tournament.id)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        // BYE pairings are never played; everything else is either scored or
        // still owed a result.
        let remaining = bracket
            .iter()
            .filter(|bm| !bm.has_bye())
            .filter(|bm| {
                bm.match_id
                    .and_then(|id| matches.get(&id))
                    .map_or(true, |m| !m.is_scored())
            })
            .count();
        Ok(remaining as u32)
    }

    async fn resolve_match(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        target: &MatchTarget,
    ) -> Result<Match> {
        let MatchTarget::Slot(bracket_match_id) = target else {
            if let MatchTarget::Match(match_id) = target {
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
                return Ok(m);
            }
            return Err(EngineError::UnsupportedOperation {
                format: self.kind().to_string(),
                operation: "ad hoc match creation".to_string(),
            }
            .into());
        };

        let mut bracket_match = ctx
            .store
            .bracket_match(*bracket_match_id)
            .await?
            .ok_or(EngineError::BracketSlotNotFound {
                bracket_match_id: *bracket_match_id,
            })?;
        if bracket_match.tournament_id != tournament.id {
            return Err(EngineError::OwnershipMismatch {
                entity: format!("bracket slot {bracket_match_id}"),
                tournament_id: tournament.id,
            }
            .into());
        }
        if bracket_match.has_bye() {
            return Err(EngineError::ByeSlotNotPlayable {
                bracket_match_id: *bracket_match_id,
            }
            .into());
        }
        if let Some(match_id) = bracket_match.match_id {
            return ctx
                .store
                .match_by_id(match_id)
                .await?
                .ok_or(EngineError::MatchNotFound { match_id }.into());
        }
        if !bracket_match.is_playable() {
            return Err(EngineError::not_ready(format!(
                "bracket slot {bracket_match_id} is waiting on earlier results"
            ))
            .into());
        }

        let sequence = ctx.store.matches(tournament.id).await?.len() as u32;
        let m = new_slot_match(tournament, &bracket_match, sequence)?;
        ctx.store.insert_match(&m).await?;
        bracket_match.match_id = Some(m.id);
        ctx.store.update_bracket_match(&bracket_match).await?;
        Ok(m)
    }

    async fn update_match(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        target: MatchTarget,
        score: ScoreInput,
    ) -> Result<MatchUpdate> {
        // Validate before resolving so a malformed score cannot mint a match
        // row for an untouched slot
        score.validate()?;
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
        m: &Match,
    ) -> Result<StateChange> {
        apply_match_rating(ctx, tournament, m).await?;

        let bracket_match_id = m.bracket_match_id.ok_or_else(|| {
            EngineError::config(format!("match {} is not attached to a bracket slot", m.id))
        })?;
        let winner = m
            .winner()
            .ok_or_else(|| EngineError::invalid_score("scored match has no winner"))?
            .clone();
        let outcome = advance_winner(ctx.store, tournament.id, bracket_match_id, &winner).await?;

        // A corrected result on a finished bracket reshapes the ledger; the
        // post-tournament snapshots follow it.
        if !tournament.is_active() {
            stamp_post_tournament_ratings(ctx, tournament).await?;
            return Ok(StateChange::default());
        }
        if !outcome.tournament_completed {
            return Ok(StateChange::default());
        }
        complete_tournament(ctx, tournament).await?;
        Ok(StateChange::completed())
    }

    async fn handle_plugin_request(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        request: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let request: PlayoffRequest = serde_json::from_value(request)
            .map_err(|e| EngineError::config(format!("malformed playoff request: {e}")))?;
        match request {
            PlayoffRequest::Reseed => {
                reseed(ctx.store, tournament).await?;
                let bracket = ctx.store.bracket_matches(tournament.id).await?;
                Ok(json!({ "bracket": bracket }))
            }
            PlayoffRequest::Preview => {
                let participants = ctx.store.participants(tournament.id).await?;
                let entries: Vec<SeedEntry> = participants
                    .iter()
                    .map(|p| SeedEntry {
                        player_id: p.player_id.clone(),
                        rating: p.rating_at_entry,
                    })
                    .collect();
                let seeded = seed(&entries);
                let positions = generate_positions(
                    &seeded,
                    bracket_size(participants.len()),
                    None,
                    &mut rand::thread_rng(),
                )?;
                Ok(json!({ "positions": positions }))
            }
            PlayoffRequest::SetPositions { positions } => {
                let participants = ctx.store.participants(tournament.id).await?;
                let players: Vec<_> =
                    participants.iter().map(|p| p.player_id.clone()).collect();
                validate_positions(&positions, bracket_size(players.len()), &players)?;
                let bracket = ctx.store.bracket_matches(tournament.id).await?;
                rewrite_first_round(ctx.store, tournament, bracket, &positions).await?;
                let bracket = ctx.store.bracket_matches(tournament.id).await?;
                Ok(json!({ "bracket": bracket }))
            }
        }
    }
}

fn new_slot_match(
    tournament: &Tournament,
    bracket_match: &BracketMatch,
    sequence: u32,
) -> Result<Match> {
    let (Some(player1), Some(player2)) = (bracket_match.slot1.player(), bracket_match.slot2.player())
    else {
        return Err(EngineError::not_ready(format!(
            "bracket slot {} is not fully occupied",
            bracket_match.id
        ))
        .into());
    };
    let mut m = Match::new(tournament.id, player1.clone(), player2.clone(), sequence);
    m.bracket_match_id = Some(bracket_match.id);
    Ok(m)
}

/// An explicit position list must exactly fill the bracket with every
/// registered player once, padded with BYEs.
fn validate_positions(positions: &[Slot], size: usize, players: &[String]) -> Result<()> {
    if positions.len() != size {
        return Err(EngineError::config(format!(
            "{} positions do not fill a bracket of {size}",
            positions.len()
        ))
        .into());
    }
    let mut seen = std::collections::HashSet::new();
    for slot in positions {
        match slot {
            Slot::Player(p) => {
                if !players.contains(p) {
                    return Err(
                        EngineError::config(format!("{p} is not registered in this tournament"))
                            .into(),
                    );
                }
                if !seen.insert(p.clone()) {
                    return Err(EngineError::config(format!("{p} appears twice")).into());
                }
            }
            Slot::Bye => {}
            Slot::Open => {
                return Err(EngineError::config("first-round positions cannot be open").into())
            }
        }
    }
    if seen.len() != players.len() {
        return Err(EngineError::config(format!(
            "positions place {} of {} players",
            seen.len(),
            players.len()
        ))
        .into());
    }
    Ok(())
}
