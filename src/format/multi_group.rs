//! Multi-group: independent round robin groups under one parent
//!
//! The parent owns no matches; it completes when every group completes.

use super::compound::{children_matches_remaining, reject_direct_match_update};
use super::{
    complete_tournament, snapshot_participants, Format, FormatContext, MatchTarget, MatchUpdate,
    RatingMode, StateChange,
};
use crate::error::{EngineError, Result};
use crate::store::TournamentBundle;
use crate::types::{
    FormatConfig, FormatKind, Match, NewTournament, PlayerId, ScoreInput, Tournament,
    TournamentStatus,
};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;

pub struct MultiGroupFormat;

/// Groups must be non-empty, pairwise disjoint, and each playable on its own.
pub(crate) fn validate_groups(groups: &[Vec<PlayerId>]) -> Result<Vec<PlayerId>> {
    if groups.is_empty() {
        return Err(EngineError::config("at least one group is required").into());
    }
    let mut all = Vec::new();
    let mut seen = HashSet::new();
    for (index, group) in groups.iter().enumerate() {
        if group.len() < 2 {
            return Err(EngineError::config(format!(
                "group {} needs at least two players",
                index + 1
            ))
            .into());
        }
        for player in group {
            if !seen.insert(player.clone()) {
                return Err(
                    EngineError::config(format!("{player} appears in more than one group")).into(),
                );
            }
            all.push(player.clone());
        }
    }
    Ok(all)
}

/// Create one round robin child per group, numbered from 1.
pub(crate) async fn create_group_children(
    ctx: &FormatContext<'_>,
    parent: &Tournament,
    groups: &[Vec<PlayerId>],
) -> Result<()> {
    let plugin = ctx.registry.get(FormatKind::RoundRobin)?;
    let child_ctx = ctx.descend()?;
    for (index, group) in groups.iter().enumerate() {
        let number = index as u32 + 1;
        let mut spec = NewTournament::new(
            format!("{} - Group {number}", parent.name),
            FormatKind::RoundRobin,
            group.clone(),
        );
        spec.parent_id = Some(parent.id);
        spec.group_number = Some(number);
        plugin.create_tournament(&child_ctx, spec).await?;
    }
    Ok(())
}

#[async_trait]
impl Format for MultiGroupFormat {
    fn kind(&self) -> FormatKind {
        FormatKind::MultiGroup
    }

    fn rating_mode(&self) -> RatingMode {
        RatingMode::None
    }

    async fn can_delete(&self, ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<bool> {
        for child in ctx.store.children_of(tournament.id).await? {
            let matches = ctx.store.matches(child.id).await?;
            if matches.iter().any(Match::is_scored) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn create_tournament(
        &self,
        ctx: &FormatContext<'_>,
        spec: NewTournament,
    ) -> Result<Tournament> {
        let FormatConfig::MultiGroup { ref groups } = spec.config else {
            return Err(EngineError::config("a multi-group tournament needs its groups").into());
        };
        let all_players = validate_groups(groups)?;
        let groups = groups.clone();

        let tournament = Tournament {
            id: crate::utils::generate_tournament_id(),
            name: spec.name,
            format: FormatKind::MultiGroup,
            status: TournamentStatus::Active,
            parent_id: spec.parent_id,
            group_number: spec.group_number,
            config: spec.config.clone(),
            created_at: crate::utils::current_timestamp(),
            completed_at: None,
        };
        let participants = snapshot_participants(ctx, tournament.id, &all_players).await?;

        info!(
            tournament_id = %tournament.id,
            groups = groups.len(),
            players = all_players.len(),
            "creating multi-group tournament"
        );
        ctx.store
            .create_tournament_bundle(TournamentBundle {
                tournament: tournament.clone(),
                participants,
                matches: vec![],
                bracket_matches: vec![],
                swiss_state: None,
            })
            .await?;
        create_group_children(ctx, &tournament, &groups).await?;
        Ok(tournament)
    }

    async fn is_complete(&self, ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<bool> {
        let children = ctx.store.children_of(tournament.id).await?;
        Ok(!children.is_empty() && children.iter().all(|child| !child.is_active()))
    }

    async fn matches_remaining(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
    ) -> Result<u32> {
        children_matches_remaining(ctx, tournament.id).await
    }

    async fn update_match(
        &self,
        _ctx: &FormatContext<'_>,
        tournament: &Tournament,
        _target: MatchTarget,
        _score: ScoreInput,
    ) -> Result<MatchUpdate> {
        Err(reject_direct_match_update(tournament.format).into())
    }

    async fn on_match_completed(
        &self,
        _ctx: &FormatContext<'_>,
        tournament: &Tournament,
        _m: &Match,
    ) -> Result<StateChange> {
        Err(reject_direct_match_update(tournament.format).into())
    }

    async fn on_child_completed(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        child: &Tournament,
    ) -> Result<StateChange> {
        info!(
            tournament_id = %tournament.id,
            child_id = %child.id,
            "group completed"
        );
        if !self.is_complete(ctx, tournament).await? || !tournament.is_active() {
            return Ok(StateChange::default());
        }
        complete_tournament(ctx, tournament).await?;
        Ok(StateChange::completed())
    }
}
