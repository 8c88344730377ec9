//! Multi-pass rating recomputation with dampening
//!
//! Used by formats that rate at tournament completion. Pass 1 walks the
//! matches in play order applying the incremental adjustment against the
//! running rating. Pass 2 dampens outlier jumps from small samples: small
//! net movement is discarded entirely, moderate movement is kept as-is, and
//! large movement is pulled toward the strength of the opposition faced.

use crate::rating::exchange::{incremental_adjustment, PointTable};
use crate::types::Rating;

/// Net movement below this is discarded as noise.
const NOISE_FLOOR: i32 = 50;
/// Net movement at or above this triggers dampening.
const DAMPENING_THRESHOLD: i32 = 75;
/// A single-opponent sample can move the rating at most this far.
const SINGLE_OPPONENT_CAP: i32 = 100;

/// One entry of a player's ordered match history within a tournament
#[derive(Debug, Clone, Copy)]
pub struct MatchResult {
    pub opponent_rating: Rating,
    pub won: bool,
}

/// Recompute a player's rating from an ordered match history.
///
/// Returns None for unrated players: no rating change, no history record.
pub fn multi_pass_recompute(
    table: &PointTable,
    initial_rating: Option<Rating>,
    results: &[MatchResult],
) -> Option<Rating> {
    let initial = initial_rating?;
    if results.is_empty() {
        return Some(initial);
    }

    // Pass 1: sequential adjustment against the running rating
    let mut running = initial;
    for result in results {
        running += incremental_adjustment(table, running, result.opponent_rating, result.won);
    }
    let pass1 = running;

    // Pass 2: dampening on the magnitude of the net movement. The tiers are
    // symmetric so the winless branches below stay reachable.
    let moved = (pass1 - initial).abs();
    if moved < NOISE_FLOOR {
        return Some(initial);
    }
    if moved < DAMPENING_THRESHOLD {
        return Some(pass1);
    }

    let wins = results.iter().filter(|r| r.won).count();
    let losses = results.len() - wins;

    if results.len() == 1 {
        // A single opponent is too small a sample for a large swing.
        let capped = pass1
            .max(initial - SINGLE_OPPONENT_CAP)
            .min(initial + SINGLE_OPPONENT_CAP);
        if losses > 0 {
            // An all-loss single-opponent result can never land above pass 1.
            return Some(capped.min(pass1));
        }
        return Some(capped);
    }

    if wins > 0 && losses > 0 {
        // Mixed record: pull pass 1 toward the midpoint of the best win and
        // the worst loss.
        let best_win = results
            .iter()
            .filter(|r| r.won)
            .map(|r| r.opponent_rating)
            .max()
            .expect("at least one win");
        let worst_loss = results
            .iter()
            .filter(|r| !r.won)
            .map(|r| r.opponent_rating)
            .min()
            .expect("at least one loss");
        let anchor = (best_win + worst_loss) / 2;
        return Some((pass1 + anchor) / 2);
    }

    // Perfect or winless against multiple opponents: the median opposition
    // rating is the best estimate of actual strength.
    let mut ratings: Vec<Rating> = results.iter().map(|r| r.opponent_rating).collect();
    ratings.sort_unstable();
    let mid = ratings.len() / 2;
    if ratings.len() % 2 == 1 {
        Some(ratings[mid])
    } else {
        Some((ratings[mid - 1] + ratings[mid]) / 2)
    }
}
