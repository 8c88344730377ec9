//! Common types used throughout the tournament engine

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for tournaments
pub type TournamentId = Uuid;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Unique identifier for bracket slots
pub type BracketMatchId = Uuid;

/// Integer skill rating
pub type Rating = i32;

/// The closed set of tournament formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKind {
    RoundRobin,
    Playoff,
    Swiss,
    MultiGroup,
    PreliminaryWithPlayoff,
    PreliminaryWithRoundRobin,
}

impl FormatKind {
    /// Whether tournaments of this format own child tournaments instead of
    /// matches.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            FormatKind::MultiGroup
                | FormatKind::PreliminaryWithPlayoff
                | FormatKind::PreliminaryWithRoundRobin
        )
    }

    /// Formats this format may use for its child tournaments. Empty for
    /// basic formats.
    pub fn allowed_child_formats(&self) -> &'static [FormatKind] {
        match self {
            FormatKind::MultiGroup => &[FormatKind::RoundRobin],
            FormatKind::PreliminaryWithPlayoff => &[FormatKind::RoundRobin, FormatKind::Playoff],
            FormatKind::PreliminaryWithRoundRobin => &[FormatKind::RoundRobin],
            _ => &[],
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatKind::RoundRobin => write!(f, "RoundRobin"),
            FormatKind::Playoff => write!(f, "Playoff"),
            FormatKind::Swiss => write!(f, "Swiss"),
            FormatKind::MultiGroup => write!(f, "MultiGroup"),
            FormatKind::PreliminaryWithPlayoff => write!(f, "PreliminaryWithPlayoff"),
            FormatKind::PreliminaryWithRoundRobin => write!(f, "PreliminaryWithRoundRobin"),
        }
    }
}

/// Tournament lifecycle status; transitions `Active -> Completed` exactly
/// once and never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TournamentStatus {
    Active,
    Completed,
}

/// A competition instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub format: FormatKind,
    pub status: TournamentStatus,
    /// Parent tournament for children of compound formats
    pub parent_id: Option<TournamentId>,
    /// Position among sibling children; None for non-grouped children such
    /// as a final stage
    pub group_number: Option<u32>,
    pub config: FormatConfig,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Tournament {
    pub fn is_active(&self) -> bool {
        self.status == TournamentStatus::Active
    }
}

/// Join of a tournament and a player, carrying the rating snapshot taken at
/// tournament creation. The snapshot is immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub tournament_id: TournamentId,
    pub player_id: PlayerId,
    /// None for unrated players
    pub rating_at_entry: Option<Rating>,
    /// Filled in once the tournament completes, for display
    pub post_tournament_rating: Option<Rating>,
}

impl Participant {
    pub fn new(tournament_id: TournamentId, player_id: PlayerId, rating: Option<Rating>) -> Self {
        Self {
            tournament_id,
            player_id,
            rating_at_entry: rating,
            post_tournament_rating: None,
        }
    }
}

/// Raw score input for a match update
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreInput {
    pub player1_sets: u8,
    pub player2_sets: u8,
    pub player1_forfeit: bool,
    pub player2_forfeit: bool,
}

impl ScoreInput {
    pub fn sets(player1_sets: u8, player2_sets: u8) -> Self {
        Self {
            player1_sets,
            player2_sets,
            ..Default::default()
        }
    }

    pub fn forfeit_player1() -> Self {
        Self {
            player1_forfeit: true,
            ..Default::default()
        }
    }

    pub fn forfeit_player2() -> Self {
        Self {
            player2_forfeit: true,
            ..Default::default()
        }
    }

    /// Uniform score validation: at most one forfeit flag, and without a
    /// forfeit the set counts must differ. The domain has no draws, so an
    /// equal score (including 0-0) is rejected rather than treated as
    /// "not yet played".
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.player1_forfeit && self.player2_forfeit {
            return Err(EngineError::invalid_score("both players cannot forfeit"));
        }
        if !self.player1_forfeit && !self.player2_forfeit && self.player1_sets == self.player2_sets
        {
            return Err(EngineError::invalid_score(
                "set counts must differ for a non-forfeit result",
            ));
        }
        Ok(())
    }
}

/// A single best-of-N result between two participants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub player1_sets: u8,
    pub player2_sets: u8,
    pub player1_forfeit: bool,
    pub player2_forfeit: bool,
    /// Bracket formats only: the slot this match was played for
    pub bracket_match_id: Option<BracketMatchId>,
    /// Swiss only: the round this match belongs to
    pub round: Option<u32>,
    /// Play order within the tournament
    pub sequence: u32,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn new(
        tournament_id: TournamentId,
        player1: PlayerId,
        player2: PlayerId,
        sequence: u32,
    ) -> Self {
        Self {
            id: crate::utils::generate_match_id(),
            tournament_id,
            player1,
            player2,
            player1_sets: 0,
            player2_sets: 0,
            player1_forfeit: false,
            player2_forfeit: false,
            bracket_match_id: None,
            round: None,
            sequence,
            created_at: crate::utils::current_timestamp(),
        }
    }

    /// A match is scored once it carries a forfeit flag or distinguishable
    /// set counts.
    pub fn is_scored(&self) -> bool {
        self.player1_forfeit || self.player2_forfeit || self.player1_sets != self.player2_sets
    }

    pub fn apply_score(&mut self, score: &ScoreInput) {
        self.player1_sets = score.player1_sets;
        self.player2_sets = score.player2_sets;
        self.player1_forfeit = score.player1_forfeit;
        self.player2_forfeit = score.player2_forfeit;
    }

    pub fn winner(&self) -> Option<&PlayerId> {
        if self.player1_forfeit {
            Some(&self.player2)
        } else if self.player2_forfeit {
            Some(&self.player1)
        } else if self.player1_sets > self.player2_sets {
            Some(&self.player1)
        } else if self.player2_sets > self.player1_sets {
            Some(&self.player2)
        } else {
            None
        }
    }

    pub fn loser(&self) -> Option<&PlayerId> {
        self.winner().map(|w| {
            if *w == self.player1 {
                &self.player2
            } else {
                &self.player1
            }
        })
    }

    pub fn involves(&self, player: &PlayerId) -> bool {
        self.player1 == *player || self.player2 == *player
    }

    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        if self.player1 == *player {
            Some(&self.player2)
        } else if self.player2 == *player {
            Some(&self.player1)
        } else {
            None
        }
    }

    /// Sets won minus sets lost from the given player's perspective.
    pub fn set_difference(&self, player: &PlayerId) -> i32 {
        if self.player1 == *player {
            i32::from(self.player1_sets) - i32::from(self.player2_sets)
        } else if self.player2 == *player {
            i32::from(self.player2_sets) - i32::from(self.player1_sets)
        } else {
            0
        }
    }
}

/// Occupant of a bracket slot position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "player", rename_all = "snake_case")]
pub enum Slot {
    Player(PlayerId),
    /// No opponent; the other occupant auto-advances without a played match
    Bye,
    /// Not yet determined (fed by a later first-round result)
    Open,
}

impl Slot {
    pub fn player(&self) -> Option<&PlayerId> {
        match self {
            Slot::Player(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_bye(&self) -> bool {
        matches!(self, Slot::Bye)
    }
}

/// A slot in a single-elimination tree. Rounds are numbered descending:
/// round 1 is the final, the highest round number is the first round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketMatch {
    pub id: BracketMatchId,
    pub tournament_id: TournamentId,
    pub round: u32,
    /// 1-based position within the round; odd positions feed slot 1 of the
    /// next-round match, even positions feed slot 2
    pub position: u32,
    pub slot1: Slot,
    pub slot2: Slot,
    /// The next-round bracket match the winner advances into; None for the
    /// final
    pub next_match_id: Option<BracketMatchId>,
    /// The match row once the slot is played
    pub match_id: Option<MatchId>,
}

impl BracketMatch {
    /// A slot pairing involving a BYE is never played.
    pub fn has_bye(&self) -> bool {
        self.slot1.is_bye() || self.slot2.is_bye()
    }

    /// Both occupants known and neither is a BYE.
    pub fn is_playable(&self) -> bool {
        self.slot1.player().is_some() && self.slot2.player().is_some()
    }

    /// The single present occupant of a one-sided BYE pairing.
    pub fn sole_occupant(&self) -> Option<&PlayerId> {
        match (&self.slot1, &self.slot2) {
            (Slot::Player(p), Slot::Bye) => Some(p),
            (Slot::Bye, Slot::Player(p)) => Some(p),
            _ => None,
        }
    }
}

/// Per-tournament Swiss bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwissState {
    pub tournament_id: TournamentId,
    pub total_rounds: u32,
    pub current_round: u32,
    pub completed: bool,
}

/// Immutable audit record of a rating change. Round robin tournaments write
/// one record per player per tournament (match_id None); bracket and Swiss
/// formats write one per rated match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingHistory {
    pub id: Uuid,
    pub player_id: PlayerId,
    pub tournament_id: TournamentId,
    pub match_id: Option<MatchId>,
    pub rating_after: Rating,
    pub delta: i32,
    pub recorded_at: DateTime<Utc>,
}

impl RatingHistory {
    pub fn new(
        player_id: PlayerId,
        tournament_id: TournamentId,
        match_id: Option<MatchId>,
        rating_after: Rating,
        delta: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id,
            tournament_id,
            match_id,
            rating_after,
            delta,
            recorded_at: crate::utils::current_timestamp(),
        }
    }
}

/// One effective-dated bracket of the point-exchange table, looked up by
/// absolute rating difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointExchangeRule {
    pub min_diff: u32,
    /// None for the open-ended last bracket
    pub max_diff: Option<u32>,
    /// Points exchanged when the rating favorite wins
    pub expected_points: u32,
    /// Points exchanged when the lower-rated side wins
    pub upset_points: u32,
    pub effective_from: DateTime<Utc>,
}

impl PointExchangeRule {
    pub fn covers(&self, diff: u32) -> bool {
        diff >= self.min_diff && self.max_diff.map_or(true, |max| diff <= max)
    }
}

/// Per-format configuration blob persisted with the tournament
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum FormatConfig {
    #[default]
    None,
    Swiss {
        number_of_rounds: u32,
    },
    Playoff {
        /// Explicit first-round slot assignments; must fill the bracket
        #[serde(default)]
        bracket_positions: Option<Vec<Slot>>,
        /// How many top-rated players get fixed anchor positions; the rest
        /// are shuffled
        #[serde(default)]
        number_of_seeds: Option<usize>,
    },
    MultiGroup {
        groups: Vec<Vec<PlayerId>>,
    },
    Preliminary {
        groups: Vec<Vec<PlayerId>>,
        /// Seats in the final stage (final-size for a round robin final,
        /// bracket size for a playoff final)
        final_size: usize,
        #[serde(default)]
        auto_qualified_member_ids: Vec<PlayerId>,
        /// Cap on how many of the listed auto-qualified members apply
        #[serde(default)]
        auto_qualified_count: Option<usize>,
    },
}

/// Request to create a tournament. Parent linkage is filled in by compound
/// formats when they create their children; external callers leave it unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub format: FormatKind,
    pub players: Vec<PlayerId>,
    #[serde(default)]
    pub config: FormatConfig,
    #[serde(default)]
    pub parent_id: Option<TournamentId>,
    #[serde(default)]
    pub group_number: Option<u32>,
}

impl NewTournament {
    pub fn new(name: impl Into<String>, format: FormatKind, players: Vec<PlayerId>) -> Self {
        Self {
            name: name.into(),
            format,
            players,
            config: FormatConfig::None,
            parent_id: None,
            group_number: None,
        }
    }

    pub fn with_config(mut self, config: FormatConfig) -> Self {
        self.config = config;
        self
    }
}
