//! Preliminary groups feeding a final stage
//!
//! Group play is round robin; once every group completes, the qualification
//! algorithm picks the final field and the final-stage child is created in
//! the configured format. The parent completes when the final completes.

use super::compound::{
    build_qualified_list, children_matches_remaining, grouped_standings,
    reject_direct_match_update,
};
use super::multi_group::{create_group_children, validate_groups};
use super::{
    complete_tournament, snapshot_participants, Format, FormatContext, MatchTarget, MatchUpdate,
    RatingMode, StateChange,
};
use crate::error::{EngineError, Result};
use crate::store::TournamentBundle;
use crate::types::{
    FormatConfig, FormatKind, Match, NewTournament, PlayerId, ScoreInput, Tournament,
    TournamentStatus,
};
use async_trait::async_trait;
use tracing::info;

/// Shared by both preliminary variants; `final_format` picks the format of
/// the stage the qualifiers advance into.
pub struct PreliminaryFormat {
    kind: FormatKind,
    final_format: FormatKind,
}

impl PreliminaryFormat {
    pub fn with_playoff_final() -> Self {
        Self {
            kind: FormatKind::PreliminaryWithPlayoff,
            final_format: FormatKind::Playoff,
        }
    }

    pub fn with_round_robin_final() -> Self {
        Self {
            kind: FormatKind::PreliminaryWithRoundRobin,
            final_format: FormatKind::RoundRobin,
        }
    }

    fn read_config(
        &self,
        config: &FormatConfig,
    ) -> Result<(Vec<Vec<PlayerId>>, usize, Vec<PlayerId>)> {
        let FormatConfig::Preliminary {
            groups,
            final_size,
            auto_qualified_member_ids,
            auto_qualified_count,
        } = config
        else {
            return Err(
                EngineError::config("a preliminary tournament needs groups and a final size")
                    .into(),
            );
        };
        if *final_size < 2 {
            return Err(EngineError::config("the final stage needs at least two seats").into());
        }
        let mut auto_qualified = auto_qualified_member_ids.clone();
        if let Some(count) = auto_qualified_count {
            auto_qualified.truncate(*count);
        }
        if auto_qualified.len() >= *final_size {
            return Err(EngineError::config(
                "auto-qualified players would fill the entire final",
            )
            .into());
        }
        Ok((groups.clone(), *final_size, auto_qualified))
    }

    /// The non-grouped child, if the final stage exists yet.
    async fn final_child(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
    ) -> Result<Option<Tournament>> {
        Ok(ctx
            .store
            .children_of(tournament.id)
            .await?
            .into_iter()
            .find(|child| child.group_number.is_none()))
    }

    async fn create_final_stage(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
    ) -> Result<Tournament> {
        let (_, final_size, auto_qualified) = self.read_config(&tournament.config)?;
        let standings = grouped_standings(ctx, tournament.id).await?;
        let qualified = build_qualified_list(&standings, final_size, &auto_qualified);
        if qualified.len() < 2 {
            return Err(EngineError::not_ready(
                "not enough qualified players to seat a final",
            )
            .into());
        }

        let plugin = ctx.registry.get(self.final_format)?;
        let child_ctx = ctx.descend()?;
        let mut spec = NewTournament::new(
            format!("{} - Final", tournament.name),
            self.final_format,
            qualified,
        );
        spec.parent_id = Some(tournament.id);
        let final_stage = plugin.create_tournament(&child_ctx, spec).await?;
        info!(
            tournament_id = %tournament.id,
            final_id = %final_stage.id,
            format = %self.final_format,
            "final stage created"
        );
        Ok(final_stage)
    }
}

#[async_trait]
impl Format for PreliminaryFormat {
    fn kind(&self) -> FormatKind {
        self.kind
    }

    fn rating_mode(&self) -> RatingMode {
        RatingMode::None
    }

    async fn can_delete(&self, ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<bool> {
        for child in ctx.store.children_of(tournament.id).await? {
            let matches = ctx.store.matches(child.id).await?;
            if matches.iter().any(Match::is_scored) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn create_tournament(
        &self,
        ctx: &FormatContext<'_>,
        spec: NewTournament,
    ) -> Result<Tournament> {
        let (groups, final_size, auto_qualified) = self.read_config(&spec.config)?;
        let mut all_players = validate_groups(&groups)?;
        for player in &auto_qualified {
            if !all_players.contains(player) {
                // auto-qualified players may skip group play entirely
                all_players.push(player.clone());
            }
        }
        if final_size > all_players.len() {
            return Err(EngineError::config(format!(
                "a final of {final_size} cannot be seated from {} players",
                all_players.len()
            ))
            .into());
        }

        let tournament = Tournament {
            id: crate::utils::generate_tournament_id(),
            name: spec.name,
            format: self.kind,
            status: TournamentStatus::Active,
            parent_id: spec.parent_id,
            group_number: spec.group_number,
            config: spec.config.clone(),
            created_at: crate::utils::current_timestamp(),
            completed_at: None,
        };
        let participants = snapshot_participants(ctx, tournament.id, &all_players).await?;

        info!(
            tournament_id = %tournament.id,
            groups = groups.len(),
            final_size,
            "creating preliminary tournament"
        );
        ctx.store
            .create_tournament_bundle(TournamentBundle {
                tournament: tournament.clone(),
                participants,
                matches: vec![],
                bracket_matches: vec![],
                swiss_state: None,
            })
            .await?;
        create_group_children(ctx, &tournament, &groups).await?;
        Ok(tournament)
    }

    async fn is_complete(&self, ctx: &FormatContext<'_>, tournament: &Tournament) -> Result<bool> {
        match self.final_child(ctx, tournament).await? {
            Some(final_stage) => Ok(!final_stage.is_active()),
            None => Ok(false),
        }
    }

    async fn matches_remaining(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
    ) -> Result<u32> {
        children_matches_remaining(ctx, tournament.id).await
    }

    async fn update_match(
        &self,
        _ctx: &FormatContext<'_>,
        tournament: &Tournament,
        _target: MatchTarget,
        _score: ScoreInput,
    ) -> Result<MatchUpdate> {
        Err(reject_direct_match_update(tournament.format).into())
    }

    async fn on_match_completed(
        &self,
        _ctx: &FormatContext<'_>,
        tournament: &Tournament,
        _m: &Match,
    ) -> Result<StateChange> {
        Err(reject_direct_match_update(tournament.format).into())
    }

    async fn on_child_completed(
        &self,
        ctx: &FormatContext<'_>,
        tournament: &Tournament,
        child: &Tournament,
    ) -> Result<StateChange> {
        if child.group_number.is_none() {
            // the final stage finished
            if !tournament.is_active() {
                return Ok(StateChange::default());
            }
            complete_tournament(ctx, tournament).await?;
            return Ok(StateChange::completed());
        }

        let groups_done = ctx
            .store
            .children_of(tournament.id)
            .await?
            .iter()
            .filter(|c| c.group_number.is_some())
            .all(|c| !c.is_active());
        if !groups_done || self.final_child(ctx, tournament).await?.is_some() {
            return Ok(StateChange::default());
        }

        let final_stage = self.create_final_stage(ctx, tournament).await?;
        Ok(StateChange {
            final_stage_created: Some(final_stage.id),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::events::NoopEventSink;
    use crate::format::FormatRegistry;
    use crate::rating::PointTable;
    use crate::store::{InMemoryStore, TournamentStore};

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

    fn group(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| n.to_string()).collect()
    }

    /// Score every group match so the alphabetically earlier player wins,
    /// reporting each completed group to the parent.
    async fn finish_groups(
        fx: &Fixture,
        format: &PreliminaryFormat,
        t: &Tournament,
    ) -> StateChange {
        let ctx = fx.ctx();
        let round_robin = fx.registry.get(FormatKind::RoundRobin).unwrap();
        let mut last = StateChange::default();
        let children = fx.store.children_of(t.id).await.unwrap();
        for child in children.iter().filter(|c| c.group_number.is_some()) {
            for m in fx.store.matches(child.id).await.unwrap() {
                let score = if m.player1 < m.player2 {
                    ScoreInput::sets(3, 0)
                } else {
                    ScoreInput::sets(0, 3)
                };
                round_robin
                    .update_match(
                        &ctx.descend().unwrap(),
                        child,
                        MatchTarget::Match(m.id),
                        score,
                    )
                    .await
                    .unwrap();
            }
            let completed = fx.store.tournament(child.id).await.unwrap().unwrap();
            last = format
                .on_child_completed(&ctx, t, &completed)
                .await
                .unwrap();
        }
        last
    }

    #[tokio::test]
    async fn test_qualification_seats_the_final() {
        // 2 groups of 2, final of 3: group winners plus the best-rated
        // runner-up
        let fx = Fixture::new();
        fx.store.seed_rating(&"a".to_string(), 1500).unwrap();
        fx.store.seed_rating(&"b".to_string(), 1400).unwrap();
        fx.store.seed_rating(&"c".to_string(), 1300).unwrap();
        fx.store.seed_rating(&"d".to_string(), 1200).unwrap();
        let format = PreliminaryFormat::with_round_robin_final();
        let ctx = fx.ctx();
        let t = format
            .create_tournament(
                &ctx,
                NewTournament::new(
                    "championship",
                    FormatKind::PreliminaryWithRoundRobin,
                    group(&["a", "b", "c", "d"]),
                )
                .with_config(FormatConfig::Preliminary {
                    groups: vec![group(&["a", "b"]), group(&["c", "d"])],
                    final_size: 3,
                    auto_qualified_member_ids: vec![],
                    auto_qualified_count: None,
                }),
            )
            .await
            .unwrap();

        let change = finish_groups(&fx, &format, &t).await;
        let final_id = change.final_stage_created.expect("final stage created");
        let final_stage = fx.store.tournament(final_id).await.unwrap().unwrap();
        assert_eq!(final_stage.format, FormatKind::RoundRobin);
        assert_eq!(final_stage.group_number, None);

        let field: Vec<_> = fx
            .store
            .participants(final_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.player_id)
            .collect();
        assert_eq!(field, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_playoff_final_variant_builds_a_bracket() {
        let fx = Fixture::new();
        let format = PreliminaryFormat::with_playoff_final();
        let ctx = fx.ctx();
        let t = format
            .create_tournament(
                &ctx,
                NewTournament::new(
                    "championship",
                    FormatKind::PreliminaryWithPlayoff,
                    group(&["a", "b", "c", "d"]),
                )
                .with_config(FormatConfig::Preliminary {
                    groups: vec![group(&["a", "b"]), group(&["c", "d"])],
                    final_size: 2,
                    auto_qualified_member_ids: vec![],
                    auto_qualified_count: None,
                }),
            )
            .await
            .unwrap();

        let change = finish_groups(&fx, &format, &t).await;
        let final_id = change.final_stage_created.unwrap();
        let final_stage = fx.store.tournament(final_id).await.unwrap().unwrap();
        assert_eq!(final_stage.format, FormatKind::Playoff);
        assert_eq!(fx.store.bracket_matches(final_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_parent_completes_only_with_the_final() {
        let fx = Fixture::new();
        let format = PreliminaryFormat::with_round_robin_final();
        let ctx = fx.ctx();
        let t = format
            .create_tournament(
                &ctx,
                NewTournament::new(
                    "championship",
                    FormatKind::PreliminaryWithRoundRobin,
                    group(&["a", "b", "c", "d"]),
                )
                .with_config(FormatConfig::Preliminary {
                    groups: vec![group(&["a", "b"]), group(&["c", "d"])],
                    final_size: 2,
                    auto_qualified_member_ids: vec![],
                    auto_qualified_count: None,
                }),
            )
            .await
            .unwrap();

        let change = finish_groups(&fx, &format, &t).await;
        assert!(!change.tournament_completed);
        assert!(!format.is_complete(&ctx, &t).await.unwrap());

        // play out the final
        let final_id = change.final_stage_created.unwrap();
        let final_stage = fx.store.tournament(final_id).await.unwrap().unwrap();
        let round_robin = fx.registry.get(FormatKind::RoundRobin).unwrap();
        for m in fx.store.matches(final_id).await.unwrap() {
            round_robin
                .update_match(
                    &ctx.descend().unwrap(),
                    &final_stage,
                    MatchTarget::Match(m.id),
                    ScoreInput::sets(3, 2),
                )
                .await
                .unwrap();
        }
        let completed_final = fx.store.tournament(final_id).await.unwrap().unwrap();
        let change = format
            .on_child_completed(&ctx, &t, &completed_final)
            .await
            .unwrap();
        assert!(change.tournament_completed);
        assert!(format.is_complete(&ctx, &t).await.unwrap());
    }

    #[tokio::test]
    async fn test_final_is_created_once() {
        let fx = Fixture::new();
        let format = PreliminaryFormat::with_round_robin_final();
        let ctx = fx.ctx();
        let t = format
            .create_tournament(
                &ctx,
                NewTournament::new(
                    "championship",
                    FormatKind::PreliminaryWithRoundRobin,
                    group(&["a", "b", "c", "d"]),
                )
                .with_config(FormatConfig::Preliminary {
                    groups: vec![group(&["a", "b"]), group(&["c", "d"])],
                    final_size: 2,
                    auto_qualified_member_ids: vec![],
                    auto_qualified_count: None,
                }),
            )
            .await
            .unwrap();

        finish_groups(&fx, &format, &t).await;
        // a late duplicate completion event must not mint a second final
        let children = fx.store.children_of(t.id).await.unwrap();
        let group_child = children
            .iter()
            .find(|c| c.group_number == Some(1))
            .unwrap();
        let change = format
            .on_child_completed(&ctx, &t, group_child)
            .await
            .unwrap();
        assert_eq!(change.final_stage_created, None);

        let finals = fx
            .store
            .children_of(t.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.group_number.is_none())
            .count();
        assert_eq!(finals, 1);
    }

    #[tokio::test]
    async fn test_rejects_undersized_final() {
        let fx = Fixture::new();
        let format = PreliminaryFormat::with_round_robin_final();
        let result = format
            .create_tournament(
                &fx.ctx(),
                NewTournament::new(
                    "championship",
                    FormatKind::PreliminaryWithRoundRobin,
                    group(&["a", "b"]),
                )
                .with_config(FormatConfig::Preliminary {
                    groups: vec![group(&["a", "b"])],
                    final_size: 1,
                    auto_qualified_member_ids: vec![],
                    auto_qualified_count: None,
                }),
            )
            .await;
        assert!(result.is_err());
    }
}
