//! Bracket service: seeding, tree construction, and winner advancement
//!
//! Bracket rounds are numbered descending: round 1 is the final and the
//! highest round number is the first round. Odd positions feed slot 1 of the
//! next-round match, even positions feed slot 2.

pub mod advance;
pub mod builder;
pub mod seeding;

pub use advance::{advance_winner, reseed, rewrite_first_round, AdvanceOutcome};
pub use builder::build_bracket;
pub use seeding::{bracket_size, generate_positions, seed, SeedEntry};
