//! Greedy Swiss round pairing with an anti-rematch constraint
//!
//! The top unpaired player is matched with the lowest-ranked eligible
//! opponent in the same point group, falling back to successively lower
//! point groups. Pairing high-with-low inside a group reduces future
//! rematches. A player with no eligible opponent anywhere sits out the round
//! (a structural bye).

use crate::swiss::standings::StandingsRow;
use crate::types::{Match, PlayerId};
use std::collections::{HashMap, HashSet};

/// A pairing for the next round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub player1: PlayerId,
    pub player2: PlayerId,
}

/// Map each player to the opponents they have already faced.
pub fn prior_opponents(matches: &[Match]) -> HashMap<PlayerId, HashSet<PlayerId>> {
    let mut prior: HashMap<PlayerId, HashSet<PlayerId>> = HashMap::new();
    for m in matches {
        prior
            .entry(m.player1.clone())
            .or_default()
            .insert(m.player2.clone());
        prior
            .entry(m.player2.clone())
            .or_default()
            .insert(m.player1.clone());
    }
    prior
}

/// Pair a ranked standings list for one round.
pub fn pair_round(
    standings: &[StandingsRow],
    prior: &HashMap<PlayerId, HashSet<PlayerId>>,
) -> Vec<Pair> {
    let mut paired = vec![false; standings.len()];
    let mut pairs = Vec::with_capacity(standings.len() / 2);

    for top in 0..standings.len() {
        if paired[top] {
            continue;
        }

        // Candidate point groups: the top player's own group first, then
        // strictly lower groups in descending order.
        let mut group_points: Vec<u32> = standings
            .iter()
            .map(|row| row.points)
            .filter(|&points| points <= standings[top].points)
            .collect();
        group_points.sort_unstable_by(|a, b| b.cmp(a));
        group_points.dedup();

        let already_faced = prior.get(&standings[top].player_id);
        let mut opponent = None;
        'groups: for points in group_points {
            // Lowest-ranked eligible opponent within the group
            for candidate in (0..standings.len()).rev() {
                if candidate == top || paired[candidate] {
                    continue;
                }
                if standings[candidate].points != points {
                    continue;
                }
                if already_faced
                    .map_or(false, |faced| faced.contains(&standings[candidate].player_id))
                {
                    continue;
                }
                opponent = Some(candidate);
                break 'groups;
            }
        }

        if let Some(candidate) = opponent {
            paired[top] = true;
            paired[candidate] = true;
            pairs.push(Pair {
                player1: standings[top].player_id.clone(),
                player2: standings[candidate].player_id.clone(),
            });
        }
        // else: structural bye; the player sits out this round
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, points: u32, rating: i32) -> StandingsRow {
        StandingsRow {
            player_id: id.to_string(),
            points,
            rating: Some(rating),
        }
    }

    fn faced(pairs: &[(&str, &str)]) -> HashMap<PlayerId, HashSet<PlayerId>> {
        let mut prior: HashMap<PlayerId, HashSet<PlayerId>> = HashMap::new();
        for (a, b) in pairs {
            prior
                .entry(a.to_string())
                .or_default()
                .insert(b.to_string());
            prior
                .entry(b.to_string())
                .or_default()
                .insert(a.to_string());
        }
        prior
    }

    #[test]
    fn test_high_pairs_with_low_inside_a_point_group() {
        let standings = vec![
            row("a", 1, 1600),
            row("b", 1, 1500),
            row("c", 1, 1400),
            row("d", 1, 1300),
        ];
        let pairs = pair_round(&standings, &HashMap::new());
        assert_eq!(
            pairs,
            vec![
                Pair {
                    player1: "a".to_string(),
                    player2: "d".to_string()
                },
                Pair {
                    player1: "b".to_string(),
                    player2: "c".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_prior_opponents_excluded() {
        let standings = vec![
            row("a", 1, 1600),
            row("b", 1, 1500),
            row("c", 1, 1400),
            row("d", 1, 1300),
        ];
        // a already played d, so a takes c and b takes d
        let prior = faced(&[("a", "d")]);
        let pairs = pair_round(&standings, &prior);
        assert_eq!(pairs[0].player1, "a");
        assert_eq!(pairs[0].player2, "c");
        assert_eq!(pairs[1].player1, "b");
        assert_eq!(pairs[1].player2, "d");
    }

    #[test]
    fn test_falls_through_to_next_lower_point_group() {
        let standings = vec![
            row("a", 2, 1600),
            row("b", 2, 1500),
            row("c", 1, 1400),
            row("d", 1, 1300),
        ];
        // a and b have met: a must drop into the 1-point group
        let prior = faced(&[("a", "b")]);
        let pairs = pair_round(&standings, &prior);
        assert_eq!(pairs[0].player1, "a");
        assert_eq!(pairs[0].player2, "d");
        assert_eq!(pairs[1].player1, "b");
        assert_eq!(pairs[1].player2, "c");
    }

    #[test]
    fn test_odd_player_count_leaves_structural_bye() {
        let standings = vec![row("a", 0, 1600), row("b", 0, 1500), row("c", 0, 1400)];
        let pairs = pair_round(&standings, &HashMap::new());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].player1, "a");
        assert_eq!(pairs[0].player2, "c");
        // b sits out the round
    }

    #[test]
    fn test_exhausted_opponents_leave_player_unpaired() {
        let standings = vec![row("a", 1, 1600), row("b", 1, 1500)];
        let prior = faced(&[("a", "b")]);
        assert!(pair_round(&standings, &prior).is_empty());
    }

    #[test]
    fn test_prior_opponents_map_is_symmetric() {
        let t = uuid::Uuid::new_v4();
        let m = Match::new(t, "a".to_string(), "b".to_string(), 0);
        let prior = prior_opponents(&[m]);
        assert!(prior["a"].contains("b"));
        assert!(prior["b"].contains("a"));
    }
}
