//! Winner advancement and first-round reseeding

use crate::bracket::builder::propagate_byes;
use crate::bracket::seeding::{generate_positions, seed, SeedEntry};
use crate::error::{EngineError, Result};
use crate::store::TournamentStore;
use crate::types::{BracketMatch, BracketMatchId, PlayerId, Slot, Tournament, TournamentId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/// Result of advancing a winner out of a bracket slot
#[derive(Debug, Clone, Copy)]
pub struct AdvanceOutcome {
    /// The advanced slot was the final; the tournament is decided
    pub tournament_completed: bool,
}

/// Write the winner into the slot of the next-round bracket match it is
/// routed to, riding through BYE pairings along the way. Advancing the final
/// sets tournament completion and never creates a next match. Idempotent
/// under retry: re-advancing an already-written winner is a no-op.
pub async fn advance_winner(
    store: &dyn TournamentStore,
    tournament_id: TournamentId,
    bracket_match_id: BracketMatchId,
    winner: &PlayerId,
) -> Result<AdvanceOutcome> {
    let mut current = load_owned(store, tournament_id, bracket_match_id).await?;

    if current.slot1.player() != Some(winner) && current.slot2.player() != Some(winner) {
        return Err(EngineError::invalid_score(format!(
            "winner {winner} is not an occupant of bracket slot {bracket_match_id}"
        ))
        .into());
    }

    loop {
        let Some(next_id) = current.next_match_id else {
            debug!(
                tournament_id = %tournament_id,
                winner = %winner,
                "final decided"
            );
            return Ok(AdvanceOutcome {
                tournament_completed: true,
            });
        };

        let mut parent = load_owned(store, tournament_id, next_id).await?;
        let target = if current.position % 2 == 1 {
            &mut parent.slot1
        } else {
            &mut parent.slot2
        };
        if target.player() != Some(winner) {
            *target = Slot::Player(winner.clone());
            store.update_bracket_match(&parent).await?;
        }

        // A BYE in the parent's other slot means the winner keeps moving
        if parent.has_bye() {
            current = parent;
            continue;
        }
        return Ok(AdvanceOutcome {
            tournament_completed: false,
        });
    }
}

/// Recompute and rewrite only the first-round slot assignments from current
/// ratings. Forbidden once the tournament is completed or any first-round
/// slot has been played.
pub async fn reseed(store: &dyn TournamentStore, tournament: &Tournament) -> Result<()> {
    if !tournament.is_active() {
        return Err(EngineError::AlreadyCompleted {
            tournament_id: tournament.id,
        }
        .into());
    }

    let participants = store.participants(tournament.id).await?;
    let mut entries = Vec::with_capacity(participants.len());
    for participant in &participants {
        let current = match store.latest_rating(&participant.player_id).await? {
            Some(rating) => Some(rating),
            None => participant.rating_at_entry,
        };
        entries.push(SeedEntry {
            player_id: participant.player_id.clone(),
            rating: current,
        });
    }

    let bracket = store.bracket_matches(tournament.id).await?;
    let size = bracket
        .iter()
        .map(|bm| bm.round)
        .max()
        .map(|first_round| 1usize << first_round)
        .ok_or_else(|| EngineError::config("tournament has no bracket"))?;

    let seeded = seed(&entries);
    // Reseeding is deterministic: every player keeps an anchor position
    let mut rng = StdRng::seed_from_u64(0);
    let positions = generate_positions(&seeded, size, None, &mut rng)?;

    rewrite_first_round(store, tournament, bracket, &positions).await
}

/// Replace the first-round slot assignments with the given positions and
/// re-derive the BYE advancements. Rejected once any first-round slot has a
/// played match.
pub async fn rewrite_first_round(
    store: &dyn TournamentStore,
    tournament: &Tournament,
    mut bracket: Vec<BracketMatch>,
    positions: &[Slot],
) -> Result<()> {
    let first_round = bracket
        .iter()
        .map(|bm| bm.round)
        .max()
        .ok_or_else(|| EngineError::config("tournament has no bracket"))?;

    let expected = bracket.iter().filter(|bm| bm.round == first_round).count() * 2;
    if positions.len() != expected {
        return Err(EngineError::config(format!(
            "{} positions do not fill a bracket of {expected}",
            positions.len()
        ))
        .into());
    }
    if bracket.iter().any(|bm| bm.match_id.is_some()) {
        return Err(EngineError::not_ready("bracket already has played slots").into());
    }

    bracket.sort_by_key(|bm| (std::cmp::Reverse(bm.round), bm.position));
    let mut rounds: Vec<Vec<BracketMatch>> = Vec::new();
    for bracket_match in bracket {
        if rounds.last().map(|r: &Vec<BracketMatch>| r[0].round) != Some(bracket_match.round) {
            rounds.push(Vec::new());
        }
        rounds
            .last_mut()
            .expect("pushed above")
            .push(bracket_match);
    }
    // rounds is ordered first round .. final; propagate_byes expects the
    // final first
    rounds.reverse();

    let first = rounds.last_mut().expect("non-empty bracket");
    for (index, bracket_match) in first.iter_mut().enumerate() {
        bracket_match.slot1 = positions[index * 2].clone();
        bracket_match.slot2 = positions[index * 2 + 1].clone();
    }
    // Later-round slots are derived state while nothing has been played
    for round in rounds.iter_mut().rev().skip(1) {
        for bracket_match in round.iter_mut() {
            bracket_match.slot1 = Slot::Open;
            bracket_match.slot2 = Slot::Open;
        }
    }
    propagate_byes(&mut rounds);

    for bracket_match in rounds.into_iter().flatten() {
        store.update_bracket_match(&bracket_match).await?;
    }
    debug!(tournament_id = %tournament.id, "first round rewritten");
    Ok(())
}

async fn load_owned(
    store: &dyn TournamentStore,
    tournament_id: TournamentId,
    bracket_match_id: BracketMatchId,
) -> Result<BracketMatch> {
    let bracket_match = store
        .bracket_match(bracket_match_id)
        .await?
        .ok_or(EngineError::BracketSlotNotFound { bracket_match_id })?;
    if bracket_match.tournament_id != tournament_id {
        return Err(EngineError::OwnershipMismatch {
            entity: format!("bracket slot {bracket_match_id}"),
            tournament_id,
        }
        .into());
    }
    Ok(bracket_match)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::builder::build_bracket;
    use crate::store::memory::InMemoryStore;
    use crate::store::TournamentBundle;
    use crate::types::{FormatConfig, FormatKind, Participant, TournamentStatus};
    use crate::utils::{current_timestamp, generate_tournament_id};

    fn player(id: &str) -> Slot {
        Slot::Player(id.to_string())
    }

    async fn bracket_fixture(positions: Vec<Slot>) -> (InMemoryStore, Tournament) {
        let tournament = Tournament {
            id: generate_tournament_id(),
            name: "playoff".to_string(),
            format: FormatKind::Playoff,
            status: TournamentStatus::Active,
            parent_id: None,
            group_number: None,
            config: FormatConfig::None,
            created_at: current_timestamp(),
            completed_at: None,
        };
        let participants = positions
            .iter()
            .filter_map(|slot| slot.player())
            .map(|p| Participant::new(tournament.id, p.clone(), Some(1500)))
            .collect();
        let bracket = build_bracket(tournament.id, &positions).unwrap();

        let store = InMemoryStore::new();
        store
            .create_tournament_bundle(TournamentBundle {
                tournament: tournament.clone(),
                participants,
                matches: vec![],
                bracket_matches: bracket,
                swiss_state: None,
            })
            .await
            .unwrap();
        (store, tournament)
    }

    async fn find(store: &InMemoryStore, tournament: &Tournament, round: u32) -> BracketMatch {
        store
            .bracket_matches(tournament.id)
            .await
            .unwrap()
            .into_iter()
            .find(|bm| bm.round == round && bm.position == 1)
            .unwrap()
    }

    #[tokio::test]
    async fn test_advance_writes_parent_slot() {
        let (store, tournament) =
            bracket_fixture(vec![player("a"), player("b"), player("c"), player("d")]).await;
        let first = find(&store, &tournament, 2).await;

        let outcome = advance_winner(&store, tournament.id, first.id, &"a".to_string())
            .await
            .unwrap();
        assert!(!outcome.tournament_completed);

        let final_match = find(&store, &tournament, 1).await;
        assert_eq!(final_match.slot1, player("a"));
        assert_eq!(final_match.slot2, Slot::Open);
    }

    #[tokio::test]
    async fn test_advance_is_idempotent_under_retry() {
        let (store, tournament) =
            bracket_fixture(vec![player("a"), player("b"), player("c"), player("d")]).await;
        let first = find(&store, &tournament, 2).await;

        advance_winner(&store, tournament.id, first.id, &"b".to_string())
            .await
            .unwrap();
        advance_winner(&store, tournament.id, first.id, &"b".to_string())
            .await
            .unwrap();

        let final_match = find(&store, &tournament, 1).await;
        assert_eq!(final_match.slot1, player("b"));
    }

    #[tokio::test]
    async fn test_advancing_the_final_completes_and_creates_nothing() {
        let (store, tournament) = bracket_fixture(vec![player("a"), player("b")]).await;
        let final_match = find(&store, &tournament, 1).await;

        let outcome = advance_winner(&store, tournament.id, final_match.id, &"a".to_string())
            .await
            .unwrap();
        assert!(outcome.tournament_completed);
        assert_eq!(
            store.bracket_matches(tournament.id).await.unwrap().len(),
            1,
            "no next match is ever created past the final"
        );
    }

    #[tokio::test]
    async fn test_advance_rejects_non_occupant() {
        let (store, tournament) = bracket_fixture(vec![player("a"), player("b")]).await;
        let final_match = find(&store, &tournament, 1).await;
        let result =
            advance_winner(&store, tournament.id, final_match.id, &"ghost".to_string()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_advance_rides_through_bye_pairings() {
        // a vs b in one half of an 8-bracket whose sibling branch is all
        // BYEs; the winner must ride straight into the semifinal slot beyond
        let (store, tournament) = bracket_fixture(vec![
            player("a"),
            player("b"),
            Slot::Bye,
            Slot::Bye,
            player("c"),
            player("d"),
            Slot::Bye,
            Slot::Bye,
        ])
        .await;
        let first = find(&store, &tournament, 3).await;

        advance_winner(&store, tournament.id, first.id, &"a".to_string())
            .await
            .unwrap();

        // semifinal 1 had a BYE in slot 2, so "a" continues into the final
        let final_match = find(&store, &tournament, 1).await;
        assert_eq!(final_match.slot1, player("a"));
    }

    #[tokio::test]
    async fn test_reseed_rewrites_first_round_only_before_play() {
        let (store, tournament) =
            bracket_fixture(vec![player("a"), player("b"), player("c"), player("d")]).await;

        assert!(reseed(&store, &tournament).await.is_ok());

        // once a slot has a played match, reseeding is rejected
        let mut first = find(&store, &tournament, 2).await;
        first.match_id = Some(crate::utils::generate_match_id());
        store.update_bracket_match(&first).await.unwrap();
        assert!(reseed(&store, &tournament).await.is_err());
    }

    #[tokio::test]
    async fn test_reseed_forbidden_once_completed() {
        let (store, mut tournament) = bracket_fixture(vec![player("a"), player("b")]).await;
        tournament.status = TournamentStatus::Completed;
        assert!(reseed(&store, &tournament).await.is_err());
    }
}
