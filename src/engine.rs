//! Engine facade: the library's entry point
//!
//! The engine loads the effective point-exchange table, looks up the format
//! plugin, and drives the completion cascade up the parent chain. All
//! durable state lives behind the persistence port; the engine keeps nothing
//! between calls.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::{EventSink, NoopEventSink};
use crate::format::{FormatContext, FormatRegistry, MatchTarget, MatchUpdate, Schedule};
use crate::rating::PointTable;
use crate::store::TournamentStore;
use crate::types::{
    NewTournament, ScoreInput, Tournament, TournamentId, TournamentStatus,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct TournamentEngine {
    store: Arc<dyn TournamentStore>,
    registry: Arc<FormatRegistry>,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl TournamentEngine {
    pub fn new(store: Arc<dyn TournamentStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            registry: Arc::new(FormatRegistry::standard()),
            events: Arc::new(NoopEventSink),
            config,
        })
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_registry(mut self, registry: Arc<FormatRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// The point table in force right now: stored rule generations win,
    /// then a configured override, then the built-in chart.
    async fn load_table(&self) -> Result<PointTable> {
        let stored = self
            .store
            .point_rules_effective_at(crate::utils::current_timestamp())
            .await?;
        if !stored.is_empty() {
            return PointTable::new(stored);
        }
        if let Some(rules) = &self.config.point_rules {
            return PointTable::new(rules.clone());
        }
        Ok(PointTable::standard())
    }

    fn ctx<'a>(&'a self, table: &'a PointTable) -> FormatContext<'a> {
        FormatContext {
            store: self.store.as_ref(),
            registry: &self.registry,
            events: self.events.as_ref(),
            table,
            config: &self.config,
            depth: 0,
        }
    }

    async fn load_tournament(&self, tournament_id: TournamentId) -> Result<Tournament> {
        self.store
            .tournament(tournament_id)
            .await?
            .ok_or(EngineError::TournamentNotFound { tournament_id }.into())
    }

    pub async fn create_tournament(&self, spec: NewTournament) -> Result<Tournament> {
        if spec.parent_id.is_some() {
            return Err(EngineError::config(
                "child tournaments are created by their parent format, not by callers",
            )
            .into());
        }
        let table = self.load_table().await?;
        let plugin = self.registry.get(spec.format)?;
        plugin.create_tournament(&self.ctx(&table), spec).await
    }

    /// Record a score and run the owning format's completion logic, then
    /// cascade completion up the parent chain.
    pub async fn update_match(
        &self,
        tournament_id: TournamentId,
        target: MatchTarget,
        score: ScoreInput,
    ) -> Result<MatchUpdate> {
        let tournament = self.load_tournament(tournament_id).await?;
        let table = self.load_table().await?;
        let plugin = self.registry.get(tournament.format)?;
        let update = plugin
            .update_match(&self.ctx(&table), &tournament, target, score)
            .await?;

        if update.state_change.tournament_completed {
            self.events.tournament_completed(tournament.id).await;
            self.propagate_completion(&table, tournament).await;
        }
        Ok(update)
    }

    /// Walk the parent chain after a completion. The child's state change is
    /// already committed, so a parent-notification failure is logged and
    /// dropped rather than allowed to poison the update.
    async fn propagate_completion(&self, table: &PointTable, completed: Tournament) {
        let mut current = completed;
        for _ in 0..self.config.max_nesting_depth {
            let Some(parent_id) = current.parent_id else {
                return;
            };
            let parent = match self.load_tournament(parent_id).await {
                Ok(parent) => parent,
                Err(error) => {
                    warn!(parent_id = %parent_id, %error, "completion propagation aborted");
                    return;
                }
            };
            self.events.child_completed(parent.id, current.id).await;

            let change = match self.registry.get(parent.format) {
                Ok(plugin) => {
                    match plugin
                        .on_child_completed(&self.ctx(table), &parent, &current)
                        .await
                    {
                        Ok(change) => change,
                        Err(error) => {
                            warn!(
                                parent_id = %parent.id,
                                child_id = %current.id,
                                %error,
                                "parent notification failed; child result stands"
                            );
                            return;
                        }
                    }
                }
                Err(error) => {
                    warn!(parent_id = %parent.id, %error, "no plugin for parent format");
                    return;
                }
            };

            if let Some(final_id) = change.final_stage_created {
                info!(parent_id = %parent.id, final_id = %final_id, "final stage scheduled");
            }
            if !change.tournament_completed {
                return;
            }
            self.events.tournament_completed(parent.id).await;
            current = parent;
        }
        warn!("completion propagation stopped at the nesting depth limit");
    }

    pub async fn get_schedule(&self, tournament_id: TournamentId) -> Result<Schedule> {
        let tournament = self.load_tournament(tournament_id).await?;
        let table = self.load_table().await?;
        let plugin = self.registry.get(tournament.format)?;
        plugin.schedule(&self.ctx(&table), &tournament).await
    }

    pub async fn get_printable_view(&self, tournament_id: TournamentId) -> Result<String> {
        Ok(self.get_schedule(tournament_id).await?.printable())
    }

    pub async fn is_complete(&self, tournament_id: TournamentId) -> Result<bool> {
        let tournament = self.load_tournament(tournament_id).await?;
        if !tournament.is_active() {
            return Ok(true);
        }
        let table = self.load_table().await?;
        let plugin = self.registry.get(tournament.format)?;
        plugin.is_complete(&self.ctx(&table), &tournament).await
    }

    pub async fn matches_remaining(&self, tournament_id: TournamentId) -> Result<u32> {
        let tournament = self.load_tournament(tournament_id).await?;
        let table = self.load_table().await?;
        let plugin = self.registry.get(tournament.format)?;
        plugin
            .matches_remaining(&self.ctx(&table), &tournament)
            .await
    }

    pub async fn can_cancel(&self, tournament_id: TournamentId) -> Result<bool> {
        let tournament = self.load_tournament(tournament_id).await?;
        let plugin = self.registry.get(tournament.format)?;
        Ok(plugin.can_cancel(&tournament))
    }

    pub async fn can_delete(&self, tournament_id: TournamentId) -> Result<bool> {
        let tournament = self.load_tournament(tournament_id).await?;
        let table = self.load_table().await?;
        let plugin = self.registry.get(tournament.format)?;
        plugin.can_delete(&self.ctx(&table), &tournament).await
    }

    /// Cancel an active tournament and its active children. Returns whether
    /// the recorded matches are retained; formats that feed the rating
    /// ledger always keep them.
    pub async fn on_cancel(&self, tournament_id: TournamentId) -> Result<bool> {
        let tournament = self.load_tournament(tournament_id).await?;
        let plugin = self.registry.get(tournament.format)?;
        if !plugin.can_cancel(&tournament) {
            return Err(EngineError::AlreadyCompleted { tournament_id }.into());
        }

        for child in self.store.children_of(tournament.id).await? {
            if child.is_active() {
                self.close(child).await?;
            }
        }
        self.close(tournament).await?;
        info!(tournament_id = %tournament_id, "tournament cancelled");
        Ok(plugin.retain_matches_on_cancel())
    }

    /// Delete a tournament outright. Refused once anything has been scored;
    /// cancelled and completed tournaments keep their history.
    pub async fn on_delete(&self, tournament_id: TournamentId) -> Result<()> {
        if !self.can_delete(tournament_id).await? {
            return Err(EngineError::not_ready(format!(
                "tournament {tournament_id} has recorded results; cancel it instead"
            ))
            .into());
        }
        self.store.delete_tournament(tournament_id).await?;
        info!(tournament_id = %tournament_id, "tournament deleted");
        Ok(())
    }

    pub async fn handle_plugin_request(
        &self,
        tournament_id: TournamentId,
        request: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let tournament = self.load_tournament(tournament_id).await?;
        let table = self.load_table().await?;
        let plugin = self.registry.get(tournament.format)?;
        plugin
            .handle_plugin_request(&self.ctx(&table), &tournament, request)
            .await
    }

    async fn close(&self, tournament: Tournament) -> Result<()> {
        let mut closed = tournament;
        closed.status = TournamentStatus::Completed;
        closed.completed_at = Some(crate::utils::current_timestamp());
        self.store.update_tournament(&closed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RecordedEvent, RecordingEventSink};
    use crate::store::InMemoryStore;
    use crate::types::{FormatConfig, FormatKind};

    fn players(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn engine(store: Arc<InMemoryStore>) -> TournamentEngine {
        TournamentEngine::new(store, EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_caller_supplied_parent_linkage() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store);
        let mut spec = NewTournament::new("rogue", FormatKind::RoundRobin, players(&["a", "b"]));
        spec.parent_id = Some(crate::utils::generate_tournament_id());
        assert!(engine.create_tournament(spec).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_tournament_is_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store);
        let missing = crate::utils::generate_tournament_id();
        assert!(engine.is_complete(missing).await.is_err());
        assert!(engine.get_schedule(missing).await.is_err());
    }

    #[tokio::test]
    async fn test_update_match_emits_completion_event() {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(RecordingEventSink::new());
        let engine = TournamentEngine::new(store.clone(), EngineConfig::default())
            .unwrap()
            .with_events(events.clone());

        let t = engine
            .create_tournament(NewTournament::new(
                "duel",
                FormatKind::RoundRobin,
                players(&["a", "b"]),
            ))
            .await
            .unwrap();
        let matches = store.matches(t.id).await.unwrap();
        let update = engine
            .update_match(t.id, MatchTarget::Match(matches[0].id), ScoreInput::sets(3, 0))
            .await
            .unwrap();

        assert!(update.state_change.tournament_completed);
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, RecordedEvent::TournamentCompleted(id) if *id == t.id)));
    }

    #[tokio::test]
    async fn test_child_completion_cascades_to_the_parent() {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(RecordingEventSink::new());
        let engine = TournamentEngine::new(store.clone(), EngineConfig::default())
            .unwrap()
            .with_events(events.clone());

        let t = engine
            .create_tournament(
                NewTournament::new(
                    "divisions",
                    FormatKind::MultiGroup,
                    players(&["a", "b", "c", "d"]),
                )
                .with_config(FormatConfig::MultiGroup {
                    groups: vec![players(&["a", "b"]), players(&["c", "d"])],
                }),
            )
            .await
            .unwrap();

        for child in store.children_of(t.id).await.unwrap() {
            let matches = store.matches(child.id).await.unwrap();
            engine
                .update_match(child.id, MatchTarget::Match(matches[0].id), ScoreInput::sets(3, 1))
                .await
                .unwrap();
        }

        let parent = store.tournament(t.id).await.unwrap().unwrap();
        assert_eq!(parent.status, TournamentStatus::Completed);
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, RecordedEvent::TournamentCompleted(id) if *id == t.id)));
    }

    #[tokio::test]
    async fn test_cancel_marks_children_closed_and_retains_matches() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store.clone());
        let t = engine
            .create_tournament(
                NewTournament::new(
                    "divisions",
                    FormatKind::MultiGroup,
                    players(&["a", "b", "c", "d"]),
                )
                .with_config(FormatConfig::MultiGroup {
                    groups: vec![players(&["a", "b"]), players(&["c", "d"])],
                }),
            )
            .await
            .unwrap();

        let retain = engine.on_cancel(t.id).await.unwrap();
        assert!(retain);
        for child in store.children_of(t.id).await.unwrap() {
            assert_eq!(child.status, TournamentStatus::Completed);
        }
        assert!(engine.on_cancel(t.id).await.is_err(), "cannot cancel twice");
    }

    #[tokio::test]
    async fn test_delete_refused_once_scored() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store.clone());
        let t = engine
            .create_tournament(NewTournament::new(
                "pool",
                FormatKind::RoundRobin,
                players(&["a", "b", "c"]),
            ))
            .await
            .unwrap();
        assert!(engine.can_delete(t.id).await.unwrap());

        let matches = store.matches(t.id).await.unwrap();
        engine
            .update_match(t.id, MatchTarget::Match(matches[0].id), ScoreInput::sets(3, 0))
            .await
            .unwrap();
        assert!(!engine.can_delete(t.id).await.unwrap());
        assert!(engine.on_delete(t.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades_while_unplayed() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store.clone());
        let t = engine
            .create_tournament(
                NewTournament::new(
                    "divisions",
                    FormatKind::MultiGroup,
                    players(&["a", "b", "c", "d"]),
                )
                .with_config(FormatConfig::MultiGroup {
                    groups: vec![players(&["a", "b"]), players(&["c", "d"])],
                }),
            )
            .await
            .unwrap();
        let children = store.children_of(t.id).await.unwrap();

        engine.on_delete(t.id).await.unwrap();
        assert!(store.tournament(t.id).await.unwrap().is_none());
        for child in children {
            assert!(store.tournament(child.id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_printable_view_renders_standings() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store.clone());
        let t = engine
            .create_tournament(NewTournament::new(
                "pool",
                FormatKind::RoundRobin,
                players(&["a", "b"]),
            ))
            .await
            .unwrap();
        let view = engine.get_printable_view(t.id).await.unwrap();
        assert!(view.contains("pool"));
        assert!(view.contains("a vs b"));
    }
}
