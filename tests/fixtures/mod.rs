//! Shared fixtures for the end-to-end engine tests

use matchpoint::engine::TournamentEngine;
use matchpoint::events::RecordingEventSink;
use matchpoint::store::InMemoryStore;
use matchpoint::{EngineConfig, PlayerId};
use std::sync::Arc;

pub struct TestSystem {
    pub store: Arc<InMemoryStore>,
    pub events: Arc<RecordingEventSink>,
    pub engine: TournamentEngine,
}

/// A complete engine over an in-memory store with a recording event sink.
pub fn create_test_system() -> TestSystem {
    let store = Arc::new(InMemoryStore::new());
    let events = Arc::new(RecordingEventSink::new());
    let engine = TournamentEngine::new(store.clone(), EngineConfig::default())
        .expect("default config is valid")
        .with_events(events.clone());
    TestSystem {
        store,
        events,
        engine,
    }
}

pub fn players(names: &[&str]) -> Vec<PlayerId> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Seed a ledger rating for each (player, rating) pair.
pub fn seed_ratings(store: &InMemoryStore, ratings: &[(&str, i32)]) {
    for (player, rating) in ratings {
        store.seed_rating(&player.to_string(), *rating).unwrap();
    }
}
