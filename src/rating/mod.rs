//! Rating engine: point-exchange lookup and multi-pass adjustment
//!
//! Pure functions over match history. Bracket and Swiss formats rate
//! match-by-match through [`incremental_adjustment`]; round robin rates in
//! bulk at completion through [`multi_pass_recompute`].

pub mod exchange;
pub mod multipass;

pub use exchange::{incremental_adjustment, is_upset, PointTable};
pub use multipass::{multi_pass_recompute, MatchResult};
