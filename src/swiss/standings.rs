//! Swiss standings: one point per win, ranked by points then rating

use crate::types::{Match, Participant, PlayerId, Rating};
use serde::Serialize;

/// One row of the ranked standings
#[derive(Debug, Clone, Serialize)]
pub struct StandingsRow {
    pub player_id: PlayerId,
    pub points: u32,
    pub rating: Option<Rating>,
}

/// Rank participants by points descending, then rating descending (unrated
/// players last), then player id for a stable total order. Forfeits count as
/// a full win and loss, not half-points.
pub fn standings(participants: &[Participant], matches: &[Match]) -> Vec<StandingsRow> {
    let mut rows: Vec<StandingsRow> = participants
        .iter()
        .map(|participant| {
            let points = matches
                .iter()
                .filter(|m| m.winner() == Some(&participant.player_id))
                .count() as u32;
            StandingsRow {
                player_id: participant.player_id.clone(),
                points,
                rating: participant.rating_at_entry,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| {
                b.rating
                    .unwrap_or(Rating::MIN)
                    .cmp(&a.rating.unwrap_or(Rating::MIN))
            })
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    rows
}
