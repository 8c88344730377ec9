//! In-memory store implementation
//!
//! Backs every test and doubles as a reference implementation of the
//! persistence port's transactional semantics. All maps sit behind one lock
//! per table; critical sections never await.

use crate::error::{EngineError, Result};
use crate::store::{TournamentBundle, TournamentStore};
use crate::types::{
    BracketMatch, BracketMatchId, Match, MatchId, Participant, PlayerId, PointExchangeRule,
    Rating, RatingHistory, SwissState, Tournament, TournamentId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory tournament store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tournaments: RwLock<HashMap<TournamentId, Tournament>>,
    participants: RwLock<HashMap<TournamentId, Vec<Participant>>>,
    matches: RwLock<HashMap<MatchId, Match>>,
    bracket_matches: RwLock<HashMap<BracketMatchId, BracketMatch>>,
    swiss_states: RwLock<HashMap<TournamentId, SwissState>>,
    rating_history: RwLock<Vec<RatingHistory>>,
    point_rules: RwLock<Vec<PointExchangeRule>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a player's ledger with a starting rating, for tests and demos.
    pub fn seed_rating(&self, player_id: &PlayerId, rating: Rating) -> Result<()> {
        let mut history = self.rating_history.write().map_err(lock_poisoned)?;
        history.push(RatingHistory::new(
            player_id.clone(),
            TournamentId::nil(),
            None,
            rating,
            0,
        ));
        Ok(())
    }
}

fn lock_poisoned<T>(_: T) -> EngineError {
    EngineError::StorageError {
        message: "store lock poisoned".to_string(),
    }
}

#[async_trait]
impl TournamentStore for InMemoryStore {
    async fn create_tournament_bundle(&self, bundle: TournamentBundle) -> Result<()> {
        let mut tournaments = self.tournaments.write().map_err(lock_poisoned)?;
        let mut participants = self.participants.write().map_err(lock_poisoned)?;
        let mut matches = self.matches.write().map_err(lock_poisoned)?;
        let mut bracket_matches = self.bracket_matches.write().map_err(lock_poisoned)?;
        let mut swiss_states = self.swiss_states.write().map_err(lock_poisoned)?;

        let id = bundle.tournament.id;
        if tournaments.contains_key(&id) {
            return Err(EngineError::StorageError {
                message: format!("tournament {id} already exists"),
            }
            .into());
        }

        tournaments.insert(id, bundle.tournament);
        participants.insert(id, bundle.participants);
        for m in bundle.matches {
            matches.insert(m.id, m);
        }
        for bm in bundle.bracket_matches {
            bracket_matches.insert(bm.id, bm);
        }
        if let Some(state) = bundle.swiss_state {
            swiss_states.insert(id, state);
        }
        Ok(())
    }

    async fn tournament(&self, id: TournamentId) -> Result<Option<Tournament>> {
        let tournaments = self.tournaments.read().map_err(lock_poisoned)?;
        Ok(tournaments.get(&id).cloned())
    }

    async fn update_tournament(&self, tournament: &Tournament) -> Result<()> {
        let mut tournaments = self.tournaments.write().map_err(lock_poisoned)?;
        tournaments.insert(tournament.id, tournament.clone());
        Ok(())
    }

    async fn children_of(&self, parent_id: TournamentId) -> Result<Vec<Tournament>> {
        let tournaments = self.tournaments.read().map_err(lock_poisoned)?;
        let mut children: Vec<Tournament> = tournaments
            .values()
            .filter(|t| t.parent_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by_key(|t| (t.group_number.is_none(), t.group_number, t.created_at));
        Ok(children)
    }

    async fn delete_tournament(&self, id: TournamentId) -> Result<()> {
        let child_ids: Vec<TournamentId> = self.children_of(id).await?.iter().map(|t| t.id).collect();
        for child_id in child_ids {
            // Nesting is bounded by format depth, so recursion stays shallow
            self.delete_tournament(child_id).await?;
        }

        let mut tournaments = self.tournaments.write().map_err(lock_poisoned)?;
        let mut participants = self.participants.write().map_err(lock_poisoned)?;
        let mut matches = self.matches.write().map_err(lock_poisoned)?;
        let mut bracket_matches = self.bracket_matches.write().map_err(lock_poisoned)?;
        let mut swiss_states = self.swiss_states.write().map_err(lock_poisoned)?;
        let mut history = self.rating_history.write().map_err(lock_poisoned)?;

        tournaments.remove(&id);
        participants.remove(&id);
        matches.retain(|_, m| m.tournament_id != id);
        bracket_matches.retain(|_, bm| bm.tournament_id != id);
        swiss_states.remove(&id);
        history.retain(|row| row.tournament_id != id);
        Ok(())
    }

    async fn participants(&self, tournament_id: TournamentId) -> Result<Vec<Participant>> {
        let participants = self.participants.read().map_err(lock_poisoned)?;
        Ok(participants.get(&tournament_id).cloned().unwrap_or_default())
    }

    async fn update_participant(&self, participant: &Participant) -> Result<()> {
        let mut participants = self.participants.write().map_err(lock_poisoned)?;
        let rows = participants
            .get_mut(&participant.tournament_id)
            .ok_or(EngineError::TournamentNotFound {
                tournament_id: participant.tournament_id,
            })?;
        match rows
            .iter_mut()
            .find(|row| row.player_id == participant.player_id)
        {
            Some(row) => *row = participant.clone(),
            None => rows.push(participant.clone()),
        }
        Ok(())
    }

    async fn matches(&self, tournament_id: TournamentId) -> Result<Vec<Match>> {
        let matches = self.matches.read().map_err(lock_poisoned)?;
        let mut rows: Vec<Match> = matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.sequence);
        Ok(rows)
    }

    async fn match_by_id(&self, id: MatchId) -> Result<Option<Match>> {
        let matches = self.matches.read().map_err(lock_poisoned)?;
        Ok(matches.get(&id).cloned())
    }

    async fn insert_match(&self, m: &Match) -> Result<()> {
        let mut matches = self.matches.write().map_err(lock_poisoned)?;
        matches.insert(m.id, m.clone());
        Ok(())
    }

    async fn update_match(&self, m: &Match) -> Result<()> {
        let mut matches = self.matches.write().map_err(lock_poisoned)?;
        if !matches.contains_key(&m.id) {
            return Err(EngineError::MatchNotFound { match_id: m.id }.into());
        }
        matches.insert(m.id, m.clone());
        Ok(())
    }

    async fn bracket_matches(&self, tournament_id: TournamentId) -> Result<Vec<BracketMatch>> {
        let bracket_matches = self.bracket_matches.read().map_err(lock_poisoned)?;
        let mut rows: Vec<BracketMatch> = bracket_matches
            .values()
            .filter(|bm| bm.tournament_id == tournament_id)
            .cloned()
            .collect();
        rows.sort_by_key(|bm| (std::cmp::Reverse(bm.round), bm.position));
        Ok(rows)
    }

    async fn bracket_match(&self, id: BracketMatchId) -> Result<Option<BracketMatch>> {
        let bracket_matches = self.bracket_matches.read().map_err(lock_poisoned)?;
        Ok(bracket_matches.get(&id).cloned())
    }

    async fn update_bracket_match(&self, bracket_match: &BracketMatch) -> Result<()> {
        let mut bracket_matches = self.bracket_matches.write().map_err(lock_poisoned)?;
        if !bracket_matches.contains_key(&bracket_match.id) {
            return Err(EngineError::BracketSlotNotFound {
                bracket_match_id: bracket_match.id,
            }
            .into());
        }
        bracket_matches.insert(bracket_match.id, bracket_match.clone());
        Ok(())
    }

    async fn swiss_state(&self, tournament_id: TournamentId) -> Result<Option<SwissState>> {
        let swiss_states = self.swiss_states.read().map_err(lock_poisoned)?;
        Ok(swiss_states.get(&tournament_id).cloned())
    }

    async fn update_swiss_state(&self, state: &SwissState) -> Result<()> {
        let mut swiss_states = self.swiss_states.write().map_err(lock_poisoned)?;
        swiss_states.insert(state.tournament_id, state.clone());
        Ok(())
    }

    async fn rating_history(&self, player_id: &PlayerId) -> Result<Vec<RatingHistory>> {
        let history = self.rating_history.read().map_err(lock_poisoned)?;
        Ok(history
            .iter()
            .filter(|row| row.player_id == *player_id)
            .cloned()
            .collect())
    }

    async fn latest_rating(&self, player_id: &PlayerId) -> Result<Option<Rating>> {
        let history = self.rating_history.read().map_err(lock_poisoned)?;
        Ok(history
            .iter()
            .filter(|row| row.player_id == *player_id)
            .last()
            .map(|row| row.rating_after))
    }

    async fn replace_match_rating_history(
        &self,
        match_id: MatchId,
        rows: Vec<RatingHistory>,
    ) -> Result<()> {
        let mut history = self.rating_history.write().map_err(lock_poisoned)?;
        history.retain(|row| row.match_id != Some(match_id));
        history.extend(rows);
        Ok(())
    }

    async fn replace_tournament_rating_history(
        &self,
        tournament_id: TournamentId,
        rows: Vec<RatingHistory>,
    ) -> Result<()> {
        let mut history = self.rating_history.write().map_err(lock_poisoned)?;
        history.retain(|row| !(row.tournament_id == tournament_id && row.match_id.is_none()));
        history.extend(rows);
        Ok(())
    }

    async fn point_rules_effective_at(
        &self,
        when: DateTime<Utc>,
    ) -> Result<Vec<PointExchangeRule>> {
        let rules = self.point_rules.read().map_err(lock_poisoned)?;
        let Some(generation) = rules
            .iter()
            .filter(|rule| rule.effective_from <= when)
            .map(|rule| rule.effective_from)
            .max()
        else {
            return Ok(Vec::new());
        };
        Ok(rules
            .iter()
            .filter(|rule| rule.effective_from == generation)
            .cloned()
            .collect())
    }

    async fn insert_point_rules(&self, rules: Vec<PointExchangeRule>) -> Result<()> {
        let mut stored = self.point_rules.write().map_err(lock_poisoned)?;
        stored.extend(rules);
        Ok(())
    }
}
