//! Single-elimination tree construction with BYE auto-advancement

use crate::error::{EngineError, Result};
use crate::types::{BracketMatch, Slot, TournamentId};
use crate::utils::generate_bracket_match_id;

/// Build the full bracket tree from first-round positions.
///
/// The position list must exactly fill a power-of-two bracket; anything else
/// is a configuration error surfaced before any writes. Slots paired against
/// a BYE auto-advance their sole occupant through every subsequent all-BYE
/// ancestor.
pub fn build_bracket(
    tournament_id: TournamentId,
    positions: &[Slot],
) -> Result<Vec<BracketMatch>> {
    let size = positions.len();
    if !size.is_power_of_two() || size < 2 {
        return Err(EngineError::config(format!(
            "bracket position list of {size} does not fill a power-of-two bracket"
        ))
        .into());
    }
    if positions.iter().any(|slot| matches!(slot, Slot::Open)) {
        return Err(EngineError::config("first-round positions must not be open").into());
    }

    let total_rounds = size.trailing_zeros();

    // rounds[r - 1] holds round r; round 1 is the final
    let mut rounds: Vec<Vec<BracketMatch>> = Vec::with_capacity(total_rounds as usize);
    for round in 1..=total_rounds {
        let count = 1usize << (round - 1);
        let mut matches = Vec::with_capacity(count);
        for position in 1..=count as u32 {
            let next_match_id = if round == 1 {
                None
            } else {
                let parent_index = ((position + 1) / 2 - 1) as usize;
                Some(rounds[round as usize - 2][parent_index].id)
            };
            matches.push(BracketMatch {
                id: generate_bracket_match_id(),
                tournament_id,
                round,
                position,
                slot1: Slot::Open,
                slot2: Slot::Open,
                next_match_id,
                match_id: None,
            });
        }
        rounds.push(matches);
    }

    // First round occupants come straight from the position list
    let first_round = rounds.last_mut().expect("at least one round");
    for (index, bracket_match) in first_round.iter_mut().enumerate() {
        bracket_match.slot1 = positions[index * 2].clone();
        bracket_match.slot2 = positions[index * 2 + 1].clone();
    }

    propagate_byes(&mut rounds);

    Ok(rounds.into_iter().flatten().collect())
}

/// Walk from the first round toward the final, advancing sole occupants of
/// one-sided BYE pairings and propagating the BYE itself when both sides are
/// BYEs.
pub(crate) fn propagate_byes(rounds: &mut [Vec<BracketMatch>]) {
    for round_index in (1..rounds.len()).rev() {
        for match_index in 0..rounds[round_index].len() {
            let advanced = {
                let bracket_match = &rounds[round_index][match_index];
                match (&bracket_match.slot1, &bracket_match.slot2) {
                    (Slot::Player(p), Slot::Bye) | (Slot::Bye, Slot::Player(p)) => {
                        Some(Slot::Player(p.clone()))
                    }
                    (Slot::Bye, Slot::Bye) => Some(Slot::Bye),
                    _ => None,
                }
            };
            if let Some(slot) = advanced {
                let position = rounds[round_index][match_index].position;
                let parent_index = ((position + 1) / 2 - 1) as usize;
                let parent = &mut rounds[round_index - 1][parent_index];
                if position % 2 == 1 {
                    parent.slot1 = slot;
                } else {
                    parent.slot2 = slot;
                }
            }
        }
    }
}
