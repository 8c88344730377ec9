//! Event sink for tournament lifecycle notifications
//!
//! Fire-and-forget hooks the embedder can use to notify subscribers
//! (sockets, webhooks) and invalidate rating caches. Sink failures never
//! affect engine correctness.

use crate::types::{PlayerId, TournamentId};
use async_trait::async_trait;
use std::sync::RwLock;

/// Trait for receiving engine lifecycle events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// A tournament transitioned to COMPLETED.
    async fn tournament_completed(&self, tournament_id: TournamentId);

    /// A child of a compound tournament completed.
    async fn child_completed(&self, parent_id: TournamentId, child_id: TournamentId);

    /// Rating ledger rows changed for these players; cached ratings are
    /// stale.
    async fn ratings_invalidated(&self, players: &[PlayerId]);
}

/// Sink that drops all events
#[derive(Debug, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn tournament_completed(&self, _tournament_id: TournamentId) {}

    async fn child_completed(&self, _parent_id: TournamentId, _child_id: TournamentId) {}

    async fn ratings_invalidated(&self, _players: &[PlayerId]) {}
}

/// Recorded event, for assertions in tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    TournamentCompleted(TournamentId),
    ChildCompleted {
        parent_id: TournamentId,
        child_id: TournamentId,
    },
    RatingsInvalidated(Vec<PlayerId>),
}

/// Sink that records every event it receives, for tests
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: RwLock<Vec<RecordedEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count_completed(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, RecordedEvent::TournamentCompleted(_)))
            .count()
    }

    fn record(&self, event: RecordedEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn tournament_completed(&self, tournament_id: TournamentId) {
        self.record(RecordedEvent::TournamentCompleted(tournament_id));
    }

    async fn child_completed(&self, parent_id: TournamentId, child_id: TournamentId) {
        self.record(RecordedEvent::ChildCompleted {
            parent_id,
            child_id,
        });
    }

    async fn ratings_invalidated(&self, players: &[PlayerId]) {
        self.record(RecordedEvent::RatingsInvalidated(players.to_vec()));
    }
}
