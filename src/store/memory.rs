use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDateTime, Utc};

use crate::domain::{
    DateWindow, EntryContext, HistoryEntry, MatchOutcomeInput, NewMatch, RatingRecord,
    RatingSnapshot,
};
use crate::errors::{RatingError, Result};
use crate::rating::{Entity, MatchId, MatchResult, PlayerId, RatingDelta, RatingType};

use super::{HistoryLedger, LedgerStore, MatchStore, RatingStore};

#[derive(Default)]
struct MemoryState {
    ratings: HashMap<(Entity, RatingType), RatingRecord>,
    history: BTreeMap<i64, HistoryEntry>,
    matches: BTreeMap<MatchId, MatchOutcomeInput>,
    next_history_id: i64,
    next_match_id: MatchId,
}

impl MemoryState {
    fn entries_of<'a>(
        &'a self,
        entity: &'a Entity,
        rating_type: RatingType,
    ) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
        self.history
            .values()
            .filter(move |e| e.entity == *entity && e.rating_type == rating_type)
    }

    fn newest_entry<'a>(
        &'a self,
        entity: &'a Entity,
        rating_type: RatingType,
    ) -> Option<&'a HistoryEntry> {
        self.entries_of(entity, rating_type)
            .max_by_key(|e| (e.match_id, e.id))
    }

    fn set_rating(&mut self, entity: Entity, rating_type: RatingType, rating: i32) {
        self.ratings.insert(
            (entity, rating_type),
            RatingRecord {
                entity,
                rating_type,
                rating,
                last_updated: Utc::now().naive_utc(),
            },
        );
    }
}

/// Mutex-guarded store for tests and embedding; every call is one critical section
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| RatingError::TransientStore("memory store lock poisoned".to_string()))
    }
}

fn newest_first(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| b.match_id.cmp(&a.match_id).then(b.id.cmp(&a.id)));
}

impl RatingStore for MemoryStore {
    fn get_rating(&self, entity: &Entity, rating_type: RatingType) -> Result<Option<RatingRecord>> {
        Ok(self.lock()?.ratings.get(&(*entity, rating_type)).cloned())
    }

    fn list_ratings(
        &self,
        rating_type: RatingType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RatingRecord>> {
        let state = self.lock()?;
        let mut records: Vec<RatingRecord> = state
            .ratings
            .values()
            .filter(|r| r.rating_type == rating_type)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.entity.cmp(&b.entity)));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    fn count_ratings(&self, rating_type: RatingType) -> Result<usize> {
        let state = self.lock()?;
        Ok(state
            .ratings
            .values()
            .filter(|r| r.rating_type == rating_type)
            .count())
    }
}

impl HistoryLedger for MemoryStore {
    fn entries_for_match(&self, match_id: MatchId) -> Result<Vec<HistoryEntry>> {
        let state = self.lock()?;
        let mut entries: Vec<HistoryEntry> = state
            .history
            .values()
            .filter(|e| e.match_id == match_id)
            .cloned()
            .collect();
        newest_first(&mut entries);
        Ok(entries)
    }

    fn snapshot_before(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        match_id: MatchId,
    ) -> Result<RatingSnapshot> {
        let state = self.lock()?;
        Ok(snapshot_in(&state, entity, rating_type, match_id))
    }

    fn latest_entry_at(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        cutoff: NaiveDateTime,
    ) -> Result<Option<HistoryEntry>> {
        let state = self.lock()?;
        Ok(state
            .entries_of(entity, rating_type)
            .filter(|e| e.played_at <= cutoff)
            .max_by_key(|e| (e.played_at, e.match_id, e.id))
            .cloned())
    }

    fn history_page(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryEntry>> {
        let state = self.lock()?;
        let mut entries: Vec<HistoryEntry> = state.entries_of(entity, rating_type).cloned().collect();
        newest_first(&mut entries);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    fn count_history(&self, entity: &Entity, rating_type: RatingType) -> Result<usize> {
        Ok(self.lock()?.entries_of(entity, rating_type).count())
    }

    fn result_counts(&self, entity: &Entity, rating_type: RatingType) -> Result<(usize, usize)> {
        let state = self.lock()?;
        let (total, wins) = state
            .entries_of(entity, rating_type)
            .fold((0, 0), |(total, wins), e| {
                (total + 1, wins + usize::from(e.result == MatchResult::Win))
            });
        Ok((total, wins))
    }

    fn entries_in_window(
        &self,
        rating_type: RatingType,
        window: &DateWindow,
    ) -> Result<Vec<HistoryEntry>> {
        let state = self.lock()?;
        let mut entries: Vec<HistoryEntry> = state
            .history
            .values()
            .filter(|e| e.rating_type == rating_type && window.contains(e.played_at))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.played_at, e.match_id, e.id));
        Ok(entries)
    }
}

fn snapshot_in(
    state: &MemoryState,
    entity: &Entity,
    rating_type: RatingType,
    match_id: MatchId,
) -> RatingSnapshot {
    let prior: Vec<&HistoryEntry> = state
        .entries_of(entity, rating_type)
        .filter(|e| e.match_id < match_id)
        .collect();

    RatingSnapshot {
        prior_rating: prior
            .iter()
            .max_by_key(|e| (e.match_id, e.id))
            .map(|e| e.rating_after),
        prior_entries: prior.len(),
    }
}

impl LedgerStore for MemoryStore {
    fn apply_update(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        context: &EntryContext,
        default_rating: i32,
        compute: &dyn Fn(RatingSnapshot) -> RatingDelta,
    ) -> Result<HistoryEntry> {
        rating_type.ensure_applies_to(entity)?;
        let mut state = self.lock()?;

        if state
            .entries_of(entity, rating_type)
            .any(|e| e.match_id == context.match_id)
        {
            return Err(RatingError::TransientStore(format!(
                "{} already has a {} entry for match {}",
                entity, rating_type, context.match_id
            )));
        }

        let snapshot = snapshot_in(&state, entity, rating_type, context.match_id);
        let delta = compute(snapshot);
        let rating_before = snapshot.prior_rating.unwrap_or(default_rating);

        state.next_history_id += 1;
        let entry = HistoryEntry {
            id: state.next_history_id,
            match_id: context.match_id,
            entity: *entity,
            rating_type,
            rating_before,
            rating_after: delta.new_rating,
            rating_change: delta.change,
            result: context.result,
            penalty_result: context.penalty_result,
            goal_bonus: context.goal_bonus,
            played_at: context.played_at,
            created_at: Utc::now().naive_utc(),
        };
        state.history.insert(entry.id, entry.clone());

        let newest = state
            .newest_entry(entity, rating_type)
            .map(|e| e.rating_after)
            .unwrap_or(delta.new_rating);
        state.set_rating(*entity, rating_type, newest);

        Ok(entry)
    }

    fn revert_entry(&self, entry: &HistoryEntry) -> Result<bool> {
        let mut state = self.lock()?;
        if state.history.remove(&entry.id).is_none() {
            return Ok(false);
        }

        let restored = state
            .newest_entry(&entry.entity, entry.rating_type)
            .filter(|newest| newest.match_id > entry.match_id)
            .map(|newest| newest.rating_after)
            .unwrap_or(entry.rating_before);
        state.set_rating(entry.entity, entry.rating_type, restored);
        Ok(true)
    }

    fn clear_ratings(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.ratings.clear();
        state.history.clear();
        Ok(())
    }
}

impl MatchStore for MemoryStore {
    fn get_match(&self, match_id: MatchId) -> Result<Option<MatchOutcomeInput>> {
        Ok(self.lock()?.matches.get(&match_id).cloned())
    }

    fn insert_match(&self, new_match: &NewMatch) -> Result<MatchId> {
        let normalized = new_match.clone().normalized()?;
        let mut state = self.lock()?;
        state.next_match_id += 1;
        let id = state.next_match_id;
        state.matches.insert(id, normalized.into_input(id));
        Ok(id)
    }

    fn update_match(&self, match_id: MatchId, new_match: &NewMatch) -> Result<()> {
        let normalized = new_match.clone().normalized()?;
        let mut state = self.lock()?;
        match state.matches.get_mut(&match_id) {
            Some(existing) => {
                *existing = normalized.into_input(match_id);
                Ok(())
            }
            None => Err(RatingError::match_not_found(match_id)),
        }
    }

    fn delete_match(&self, match_id: MatchId) -> Result<()> {
        match self.lock()?.matches.remove(&match_id) {
            Some(_) => Ok(()),
            None => Err(RatingError::match_not_found(match_id)),
        }
    }

    fn match_ids_after(&self, after: MatchId) -> Result<Vec<MatchId>> {
        let state = self.lock()?;
        Ok(state
            .matches
            .range((after.saturating_add(1))..)
            .map(|(id, _)| *id)
            .collect())
    }

    fn matches_involving_after(&self, players: &[PlayerId], after: MatchId) -> Result<Vec<MatchId>> {
        let state = self.lock()?;
        Ok(state
            .matches
            .range((after.saturating_add(1))..)
            .filter(|(_, m)| m.players().any(|p| players.contains(&p)))
            .map(|(id, _)| *id)
            .collect())
    }
}
