//! Seeding and first-round position generation

use crate::error::{EngineError, Result};
use crate::types::{PlayerId, Rating, Slot};
use rand::seq::SliceRandom;
use rand::Rng;

/// A participant considered for seeding
#[derive(Debug, Clone)]
pub struct SeedEntry {
    pub player_id: PlayerId,
    pub rating: Option<Rating>,
}

/// Smallest power of two that fits the participant count.
pub fn bracket_size(participant_count: usize) -> usize {
    participant_count.max(2).next_power_of_two()
}

/// Order participants highest rating first. Unrated players sort last and
/// ties break on player id, so the order is total and deterministic.
pub fn seed(participants: &[SeedEntry]) -> Vec<PlayerId> {
    let mut entries: Vec<&SeedEntry> = participants.iter().collect();
    entries.sort_by(|a, b| {
        b.rating
            .unwrap_or(Rating::MIN)
            .cmp(&a.rating.unwrap_or(Rating::MIN))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    entries.into_iter().map(|e| e.player_id.clone()).collect()
}

/// Standard bracket anchor order for a bracket of `size`, as 1-based seed
/// numbers: seed 1 meets the bottom seed, seed 2 the second-from-bottom, and
/// seeds 1 and 2 land in opposite halves.
fn anchor_order(size: usize) -> Vec<usize> {
    let mut order = vec![1, 2];
    while order.len() < size {
        let next_len = order.len() * 2;
        let mut next = Vec::with_capacity(next_len);
        for &seed_number in &order {
            next.push(seed_number);
            next.push(next_len + 1 - seed_number);
        }
        order = next;
    }
    order
}

/// Lay seeded players out over a full bracket. The first `number_of_seeds`
/// players keep their anchor positions, the rest are shuffled among the
/// remaining player slots, and slots beyond the participant count become
/// BYEs paired against the top seeds.
pub fn generate_positions<R: Rng + ?Sized>(
    seeded_players: &[PlayerId],
    size: usize,
    number_of_seeds: Option<usize>,
    rng: &mut R,
) -> Result<Vec<Slot>> {
    if !size.is_power_of_two() || size < 2 {
        return Err(EngineError::config(format!("bracket size {size} is not a power of two")).into());
    }
    if seeded_players.len() > size {
        return Err(EngineError::config(format!(
            "{} players do not fit a bracket of {size}",
            seeded_players.len()
        ))
        .into());
    }

    let mut padded: Vec<Slot> = seeded_players
        .iter()
        .cloned()
        .map(Slot::Player)
        .chain(std::iter::repeat(Slot::Bye))
        .take(size)
        .collect();

    let fixed = number_of_seeds
        .unwrap_or(seeded_players.len())
        .min(seeded_players.len());
    padded[fixed..seeded_players.len()].shuffle(rng);

    let order = anchor_order(size);
    Ok(order.into_iter().map(|s| padded[s - 1].clone()).collect())
}
