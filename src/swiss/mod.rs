//! Swiss pairing: standings computation and round generation

pub mod pairing;
pub mod standings;

pub use pairing::{pair_round, prior_opponents, Pair};
pub use standings::{standings, StandingsRow};

use crate::error::{EngineError, Result};
use crate::store::TournamentStore;
use crate::types::{Match, Tournament};
use tracing::info;

/// A round is complete when every match carrying that round number has a
/// forfeit flag or distinguishable set scores.
pub fn round_complete(matches: &[Match], round: u32) -> bool {
    matches
        .iter()
        .filter(|m| m.round == Some(round))
        .all(Match::is_scored)
}

/// Compute standings over everything recorded so far, pair the next round,
/// and persist one new match per pair. Fails once all configured rounds have
/// been generated.
pub async fn generate_next_round(
    store: &dyn TournamentStore,
    tournament: &Tournament,
) -> Result<u32> {
    let mut state = store
        .swiss_state(tournament.id)
        .await?
        .ok_or_else(|| EngineError::StorageError {
            message: format!("missing swiss state for tournament {}", tournament.id),
        })?;

    if state.current_round >= state.total_rounds {
        return Err(EngineError::not_ready(format!(
            "all {} rounds already generated",
            state.total_rounds
        ))
        .into());
    }

    let participants = store.participants(tournament.id).await?;
    let matches = store.matches(tournament.id).await?;
    let ranked = standings(&participants, &matches);
    let prior = prior_opponents(&matches);
    let pairs = pair_round(&ranked, &prior);

    let next_round = state.current_round + 1;
    let mut sequence = matches.len() as u32;
    for pair in &pairs {
        let mut new_match = Match::new(
            tournament.id,
            pair.player1.clone(),
            pair.player2.clone(),
            sequence,
        );
        new_match.round = Some(next_round);
        store.insert_match(&new_match).await?;
        sequence += 1;
    }

    state.current_round = next_round;
    store.update_swiss_state(&state).await?;

    info!(
        tournament_id = %tournament.id,
        round = next_round,
        pairs = pairs.len(),
        "swiss round generated"
    );
    Ok(next_round)
}
