//! Swiss format: a fixed number of rounds, paired by standings
//!
//! Only round 1 exists at creation; each later round is generated when the
//! previous one finishes. Rating is incremental per match.

use super::{
    apply_match_rating, complete_tournament, record_score, snapshot_participants,
    stamp_post_tournament_ratings, Format, FormatContext, MatchTarget, MatchUpdate, RatingMode,
    StateChange,
};
use crate::error::{EngineError, Result};
use crate::store::TournamentBundle;
use crate::swiss::{generate_next_round, pair_round, prior_opponents, round_complete, standings};
use crate::types::{
    FormatConfig, FormatKind, Match, NewTournament, ScoreInput, SwissState, Tournament,
    TournamentStatus,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

pub struct SwissFormat;

#[async_trait]
impl Format for SwissFormat {
    fn kind(&self) -> FormatKind {
        FormatKind::Swiss
    }

    fn rating_mode(&self) -> RatingMode {
        RatingMode::PerMatch
    }

    async fn create_tournament(
        &self,
        ctx: &FormatContext<'_>,
        spec: NewTournament,
    ) -> Result<Tournament> {
        let FormatConfig::Swiss { number_of_rounds } = spec.config else {
            return Err(EngineError::config("a swiss tournament needs a round count").into());
        };
        if number_of_rounds == 0 {
            return Err(EngineError::config("a swiss tournament needs at least one round").into());
        }
        if spec.players.len() < 2 {
            return Err(EngineError::config("a swiss tournament needs at least two players").into());
        }

        let tournament = Tournament {
            id: crate::utils::generate_tournament_id(),
            name: spec.name,
            format: FormatKind::Swiss,
            status: TournamentStatus::Active,
            parent_id: spec.parent_id,
            group_number: spec.group_number,
            config: spec.config.clone(),
            created_at: crate::utils::current_timestamp(),
            completed_at: None,
        };
        let participants = snapshot_participants(ctx, tournament.id, &spec.players).await?;

        // Round 1 pairs off the entry ratings; nobody has points yet
        let ranked = standings(&participants, &[]);
        let pairs = pair_round(&ranked, &HashMap::new());
        let mut matches = Vec::with_capacity(pairs.len());
        for (sequence, pair) in pairs.iter().enumerate() {
            let mut m = Match::new(
                tournament.id,
                pair.player1.clone(),
                pair.player2.clone(),
                sequence as u32,
            );
            m.round = Some(1);
            matches.push(m);
        }

        info!(
            tournament_id = %tournament.id,
            players = spec.players.len(),
            rounds = number_of_rounds,
            "creating swiss tournament"
        );
        ctx.store
            .create_tournament_bundle(TournamentBundle {
                tournament: tournament.clone(),
                participants,
                matches,
                bracket_matches: vec![],
                swiss_state: Some(SwissState {
                    tournament_id: tournament.id,
                    total_rounds: number_of_rounds,
                    current_round: 1,
                    completed: false,
                }),
            })
            .await?;
        Ok(tournament)
    }

    async fn is_complete(&self, ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<bool> {
        Ok(load_state(ctx, tournament).await?.completed)
    }

    async fn matches_remaining(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
    ) -> Result<u32> {
        let state = load_state(ctx, tournament).await?;
        if state.completed {
            return Ok(0);
        }
        let matches = ctx.store.matches(tournament.id).await?;
        let unscored = matches.iter().filter(|m| !m.is_scored()).count() as u32;

        // Ungenerated rounds are estimated at one match per pair of players
        let participants = ctx.store.participants(tournament.id).await?;
        let per_round = (participants.len() / 2) as u32;
        let future_rounds = state.total_rounds - state.current_round;
        Ok(unscored + future_rounds * per_round)
    }

    async fn update_match(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        target: MatchTarget,
        score: ScoreInput,
    ) -> Result<MatchUpdate> {
        let mut m = self.resolve_match(ctx, tournament, &target).await?;
        record_score(ctx, &mut m, &score).await?;
        let state_change = self.on_match_completed(ctx, tournament, &m).await?;
        Ok(MatchUpdate {
            match_record: m,
            state_change,
        })
    }

    async fn on_match_completed(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        scored: &Match,
    ) -> Result<StateChange> {
        apply_match_rating(ctx, tournament, scored).await?;

        let mut state = load_state(ctx, tournament).await?;
        if state.completed {
            // A corrected result after the last round: ratings were redone
            // above and the post-tournament snapshots follow; nothing
            // structural changes
            stamp_post_tournament_ratings(ctx, tournament).await?;
            return Ok(StateChange::default());
        }
        let matches = ctx.store.matches(tournament.id).await?;
        if !round_complete(&matches, state.current_round) {
            return Ok(StateChange::default());
        }

        // A generated round can pair nobody when every remaining pairing is
        // a rematch. Such a round is complete the moment it exists, so keep
        // going until a playable round appears or the rounds run out.
        loop {
            if state.current_round >= state.total_rounds {
                state.completed = true;
                ctx.store.update_swiss_state(&state).await?;
                complete_tournament(ctx, tournament).await?;
                return Ok(StateChange::completed());
            }

            let next = generate_next_round(ctx.store, tournament).await?;
            let matches = ctx.store.matches(tournament.id).await?;
            if matches.iter().any(|m| m.round == Some(next)) {
                return Ok(StateChange {
                    round_generated: Some(next),
                    ..Default::default()
                });
            }
            state = load_state(ctx, tournament).await?;
        }
    }
}

async fn load_state(ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<SwissState> {
    ctx.store
        .swiss_state(tournament.id)
        .await?
        .ok_or_else(|| {
            EngineError::StorageError {
                message: format!("missing swiss state for tournament {}", tournament.id),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::events::NoopEventSink;
    use crate::format::FormatRegistry;
    use crate::rating::PointTable;
    use crate::store::{InMemoryStore, TournamentStore};
    use crate::types::PlayerId;

    struct Fixture {
        store: InMemoryStore,
        registry: FormatRegistry,
        events: NoopEventSink,
        table: PointTable,
        config: EngineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: InMemoryStore::new(),
                registry: FormatRegistry::standard(),
                events: NoopEventSink,
                table: PointTable::standard(),
                config: EngineConfig::default(),
            }
        }

        fn ctx(&self) -> FormatContext<'_> {
            FormatContext {
                store: &self.store,
                registry: &self.registry,
                events: &self.events,
                table: &self.table,
                config: &self.config,
                depth: 0,
            }
        }
    }

    fn players(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| n.to_string()).collect()
    }

    async fn swiss(fx: &Fixture, names: &[&str], rounds: u32) -> Tournament {
        SwissFormat
            .create_tournament(
                &fx.ctx(),
                NewTournament::new("open", FormatKind::Swiss, players(names))
                    .with_config(FormatConfig::Swiss {
                        number_of_rounds: rounds,
                    }),
            )
            .await
            .unwrap()
    }

    async fn score_round(fx: &Fixture, t: &Tournament, round: u32) -> StateChange {
        let ctx = fx.ctx();
        let matches: Vec<Match> = fx
            .store
            .matches(t.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.round == Some(round))
            .collect();
        let mut last = StateChange::default();
        for m in matches {
            // the alphabetically earlier player always wins
            let score = if m.player1 < m.player2 {
                ScoreInput::sets(3, 0)
            } else {
                ScoreInput::sets(0, 3)
            };
            last = SwissFormat
                .update_match(&ctx, t, MatchTarget::Match(m.id), score)
                .await
                .unwrap()
                .state_change;
        }
        last
    }

    #[tokio::test]
    async fn test_creation_pairs_round_one_by_rating() {
        let fx = Fixture::new();
        fx.store.seed_rating(&"a".to_string(), 1800).unwrap();
        fx.store.seed_rating(&"b".to_string(), 1700).unwrap();
        fx.store.seed_rating(&"c".to_string(), 1600).unwrap();
        fx.store.seed_rating(&"d".to_string(), 1500).unwrap();
        let t = swiss(&fx, &["a", "b", "c", "d"], 3).await;

        let matches = fx.store.matches(t.id).await.unwrap();
        assert_eq!(matches.len(), 2);
        // top of the table plays the bottom
        assert!(matches[0].involves(&"a".to_string()) && matches[0].involves(&"d".to_string()));
        assert!(matches[1].involves(&"b".to_string()) && matches[1].involves(&"c".to_string()));

        let state = fx.store.swiss_state(t.id).await.unwrap().unwrap();
        assert_eq!(state.current_round, 1);
        assert_eq!(state.total_rounds, 3);
    }

    #[tokio::test]
    async fn test_round_completion_generates_the_next_round() {
        let fx = Fixture::new();
        let t = swiss(&fx, &["a", "b", "c", "d"], 2).await;

        let change = score_round(&fx, &t, 1).await;
        assert_eq!(change.round_generated, Some(2));
        assert!(!change.tournament_completed);

        let state = fx.store.swiss_state(t.id).await.unwrap().unwrap();
        assert_eq!(state.current_round, 2);
        let round2: Vec<Match> = fx
            .store
            .matches(t.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.round == Some(2))
            .collect();
        assert_eq!(round2.len(), 2);
    }

    #[tokio::test]
    async fn test_last_round_completion_completes_tournament() {
        let fx = Fixture::new();
        let t = swiss(&fx, &["a", "b", "c", "d"], 2).await;

        score_round(&fx, &t, 1).await;
        let change = score_round(&fx, &t, 2).await;
        assert!(change.tournament_completed);

        let ctx = fx.ctx();
        assert!(SwissFormat.is_complete(&ctx, &t).await.unwrap());
        assert_eq!(SwissFormat.matches_remaining(&ctx, &t).await.unwrap(), 0);
        let stored = fx.store.tournament(t.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TournamentStatus::Completed);
    }

    #[tokio::test]
    async fn test_no_rematch_across_rounds() {
        let fx = Fixture::new();
        let t = swiss(&fx, &["a", "b", "c", "d", "e", "f"], 3).await;

        score_round(&fx, &t, 1).await;
        score_round(&fx, &t, 2).await;
        score_round(&fx, &t, 3).await;

        let matches = fx.store.matches(t.id).await.unwrap();
        let mut seen = std::collections::HashSet::new();
        for m in &matches {
            let mut key = [m.player1.clone(), m.player2.clone()];
            key.sort();
            assert!(seen.insert(key), "rematch of {} and {}", m.player1, m.player2);
        }
    }

    #[tokio::test]
    async fn test_unpairable_round_completes_the_tournament() {
        // Two players over two rounds: round 2 would be a rematch, so it
        // pairs nobody and the tournament finishes with round 1.
        let fx = Fixture::new();
        let t = swiss(&fx, &["a", "b"], 2).await;

        let change = score_round(&fx, &t, 1).await;
        assert!(change.tournament_completed);
        assert_eq!(change.round_generated, None);

        let ctx = fx.ctx();
        assert!(SwissFormat.is_complete(&ctx, &t).await.unwrap());
        assert_eq!(SwissFormat.matches_remaining(&ctx, &t).await.unwrap(), 0);
        let stored = fx.store.tournament(t.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TournamentStatus::Completed);
        let matches = fx.store.matches(t.id).await.unwrap();
        assert_eq!(matches.len(), 1, "no rematch was generated");
    }

    #[tokio::test]
    async fn test_consecutive_empty_rounds_run_out() {
        // With rounds to spare, every generated round after the first is
        // empty; the completion check walks through all of them.
        let fx = Fixture::new();
        let t = swiss(&fx, &["a", "b"], 4).await;

        let change = score_round(&fx, &t, 1).await;
        assert!(change.tournament_completed);

        let state = fx.store.swiss_state(t.id).await.unwrap().unwrap();
        assert!(state.completed);
        assert_eq!(state.current_round, state.total_rounds);
    }

    #[tokio::test]
    async fn test_matches_remaining_counts_future_rounds() {
        let fx = Fixture::new();
        let t = swiss(&fx, &["a", "b", "c", "d"], 3).await;
        let ctx = fx.ctx();
        // 2 unscored in round 1 plus 2 estimated per remaining round
        assert_eq!(SwissFormat.matches_remaining(&ctx, &t).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_requires_round_count() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let result = SwissFormat
            .create_tournament(
                &ctx,
                NewTournament::new("open", FormatKind::Swiss, players(&["a", "b"])),
            )
            .await;
        assert!(result.is_err());
    }
}
