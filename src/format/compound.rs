//! Shared machinery for compound formats that orchestrate child tournaments
//!
//! Compound tournaments own no matches of their own; everything playable
//! lives in their children. This module holds the group-standings ranking
//! and the qualification algorithm the preliminary variants share.

use super::FormatContext;
use crate::error::{EngineError, Result};
use crate::types::{Match, Participant, PlayerId, Rating, TournamentId};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// One row of a preliminary group's final standings
#[derive(Debug, Clone, Serialize)]
pub struct GroupRow {
    pub player_id: PlayerId,
    pub wins: u32,
    pub set_difference: i32,
    pub rating: Option<Rating>,
}

/// Rank a group's participants: wins descending, set difference descending,
/// then entry rating descending (unrated last).
pub fn group_standings(participants: &[Participant], matches: &[Match]) -> Vec<GroupRow> {
    let mut rows: Vec<GroupRow> = participants
        .iter()
        .map(|participant| {
            let wins = matches
                .iter()
                .filter(|m| m.winner() == Some(&participant.player_id))
                .count() as u32;
            let set_difference = matches
                .iter()
                .filter(|m| m.is_scored())
                .map(|m| m.set_difference(&participant.player_id))
                .sum();
            GroupRow {
                player_id: participant.player_id.clone(),
                wins,
                set_difference,
                rating: participant.rating_at_entry,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then(b.set_difference.cmp(&a.set_difference))
            .then(b.rating.unwrap_or(Rating::MIN).cmp(&a.rating.unwrap_or(Rating::MIN)))
            .then(a.player_id.cmp(&b.player_id))
    });
    rows
}

/// Pick who moves on to the final stage: auto-qualified players first, then
/// every group winner, then wildcards filled by scanning place index 2, 3, …
/// across all groups at once and taking the highest-rated candidates at each
/// index until the final is full.
pub fn build_qualified_list(
    group_standings: &[Vec<GroupRow>],
    final_size: usize,
    auto_qualified: &[PlayerId],
) -> Vec<PlayerId> {
    let mut qualified: Vec<PlayerId> = Vec::with_capacity(final_size);
    let mut taken: HashSet<PlayerId> = HashSet::new();

    for player in auto_qualified {
        if qualified.len() >= final_size {
            return qualified;
        }
        if taken.insert(player.clone()) {
            qualified.push(player.clone());
        }
    }

    for group in group_standings {
        if qualified.len() >= final_size {
            return qualified;
        }
        if let Some(winner) = group.first() {
            if taken.insert(winner.player_id.clone()) {
                qualified.push(winner.player_id.clone());
            }
        }
    }

    let deepest = group_standings.iter().map(Vec::len).max().unwrap_or(0);
    for place in 1..deepest {
        if qualified.len() >= final_size {
            break;
        }
        let mut candidates: Vec<&GroupRow> = group_standings
            .iter()
            .filter_map(|group| group.get(place))
            .filter(|row| !taken.contains(&row.player_id))
            .collect();
        candidates.sort_by(|a, b| {
            b.rating
                .unwrap_or(Rating::MIN)
                .cmp(&a.rating.unwrap_or(Rating::MIN))
                .then(a.player_id.cmp(&b.player_id))
        });
        for row in candidates {
            if qualified.len() >= final_size {
                break;
            }
            taken.insert(row.player_id.clone());
            qualified.push(row.player_id.clone());
        }
    }

    debug!(qualified = qualified.len(), final_size, "qualification computed");
    qualified
}

/// Sum the children's remaining matches, skipping completed children.
pub(crate) async fn children_matches_remaining(
    ctx: &FormatContext<'_>,
    parent_id: TournamentId,
) -> Result<u32> {
    let mut total = 0;
    for child in ctx.store.children_of(parent_id).await? {
        if !child.is_active() {
            continue;
        }
        let plugin = ctx.registry.get(child.format)?;
        let child_ctx = ctx.descend()?;
        total += plugin.matches_remaining(&child_ctx, &child).await?;
    }
    Ok(total)
}

/// Standings of every grouped (numbered) child, ordered by group number.
pub(crate) async fn grouped_standings(
    ctx: &FormatContext<'_>,
    parent_id: TournamentId,
) -> Result<Vec<Vec<GroupRow>>> {
    let mut all = Vec::new();
    for child in ctx.store.children_of(parent_id).await? {
        if child.group_number.is_none() {
            continue;
        }
        let participants = ctx.store.participants(child.id).await?;
        let matches = ctx.store.matches(child.id).await?;
        all.push(group_standings(&participants, &matches));
    }
    Ok(all)
}

/// Compound tournaments never own matches; scoring one through the parent is
/// a caller bug.
pub(crate) fn reject_direct_match_update(format: crate::types::FormatKind) -> EngineError {
    EngineError::UnsupportedOperation {
        format: format.to_string(),
        operation: "direct match updates (matches belong to child tournaments)".to_string(),
    }
}
