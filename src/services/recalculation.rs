use log::{error, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::{MatchOutcomeInput, NewMatch};
use crate::errors::{RatingError, Result};
use crate::rating::{Entity, MatchId, PlayerId, RatingType};
use crate::store::{LedgerStore, MatchStore};

use super::processing::{MatchProcessor, MatchReport};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevertReport {
    pub match_id: MatchId,
    pub reverted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayFailure {
    pub match_id: MatchId,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecalculationReport {
    pub recalculated: usize,
    pub failed: Vec<ReplayFailure>,
}

impl RecalculationReport {
    fn fail(&mut self, match_id: MatchId, err: &RatingError) {
        error!("Replay of match {} failed: {}", match_id, err);
        self.failed.push(ReplayFailure {
            match_id,
            message: err.to_string(),
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateReport {
    pub match_id: MatchId,
    pub processed: Option<MatchReport>,
    /// Set when the match was stored but could not be rated
    pub processing_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditReport {
    pub match_id: MatchId,
    pub reverted: RevertReport,
    pub processed: Option<MatchReport>,
    /// Set when the edited match could not be rated; later matches are still replayed
    pub processing_error: Option<String>,
    pub recalculation: RecalculationReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteReport {
    pub match_id: MatchId,
    pub reverted: RevertReport,
    pub recalculation: RecalculationReport,
}

fn participants(input: &MatchOutcomeInput) -> BTreeSet<PlayerId> {
    input.players().collect()
}

/// Reverts matches and replays later ones in ascending id order.
/// Every public entry point holds the replay lock for its whole run.
pub struct RecalculationCoordinator {
    matches: Arc<dyn MatchStore>,
    ledger: Arc<dyn LedgerStore>,
    processor: Arc<MatchProcessor>,
    replay_lock: Mutex<()>,
}

impl RecalculationCoordinator {
    pub fn new(
        matches: Arc<dyn MatchStore>,
        ledger: Arc<dyn LedgerStore>,
        processor: Arc<MatchProcessor>,
    ) -> Self {
        Self {
            matches,
            ledger,
            processor,
            replay_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.replay_lock
            .lock()
            .map_err(|_| RatingError::TransientStore("replay lock poisoned".to_string()))
    }

    /// Rates a stored match without racing a replay
    pub fn process(&self, match_id: MatchId) -> Result<MatchReport> {
        let _guard = self.lock()?;
        self.processor.process_match(match_id)
    }

    pub fn revert(&self, match_id: MatchId) -> Result<RevertReport> {
        let _guard = self.lock()?;
        self.revert_unlocked(match_id)
    }

    pub fn recalculate_subsequent(
        &self,
        entities: &[Entity],
        rating_type: RatingType,
        after: MatchId,
    ) -> Result<RecalculationReport> {
        let _guard = self.lock()?;
        let players: BTreeSet<PlayerId> = entities.iter().flat_map(|e| e.members()).collect();
        self.recalculate_unlocked(&players, rating_type, after)
    }

    /// Stores the match, then rates it. A rating failure leaves the match stored.
    pub fn on_match_created(&self, new_match: &NewMatch) -> Result<CreateReport> {
        let _guard = self.lock()?;
        let match_id = self.matches.insert_match(new_match)?;
        info!("Stored match {}", match_id);

        let (processed, processing_error) = match self.processor.process_match(match_id) {
            Ok(report) => (Some(report), None),
            Err(e) => {
                error!("Match {} stored but not rated: {}", match_id, e);
                (None, Some(e.to_string()))
            }
        };

        Ok(CreateReport {
            match_id,
            processed,
            processing_error,
        })
    }

    pub fn on_match_edited(&self, match_id: MatchId, edit: &NewMatch) -> Result<EditReport> {
        let _guard = self.lock()?;

        let old = self
            .matches
            .get_match(match_id)?
            .ok_or_else(|| RatingError::match_not_found(match_id))?;
        let edit = edit.clone().normalized()?;

        let mut affected = participants(&old);
        affected.extend(edit.team_a.iter().chain(&edit.team_b).copied());

        let reverted = self.revert_unlocked(match_id)?;
        if let Err(e) = self.matches.update_match(match_id, &edit) {
            warn!("Edit of match {} failed, restoring its ratings: {}", match_id, e);
            self.restore(&old);
            return Err(e);
        }

        let (processed, processing_error) = match self.processor.process_match(match_id) {
            Ok(report) => (Some(report), None),
            Err(e) => {
                error!("Edited match {} not rated: {}", match_id, e);
                (None, Some(e.to_string()))
            }
        };
        let recalculation = self.recalculate_unlocked(&affected, RatingType::Global, match_id)?;

        info!(
            "Edited match {}: {} later matches replayed, {} failed",
            match_id,
            recalculation.recalculated,
            recalculation.failed.len()
        );
        Ok(EditReport {
            match_id,
            reverted,
            processed,
            processing_error,
            recalculation,
        })
    }

    pub fn on_match_deleted(&self, match_id: MatchId) -> Result<DeleteReport> {
        let _guard = self.lock()?;

        let old = self
            .matches
            .get_match(match_id)?
            .ok_or_else(|| RatingError::match_not_found(match_id))?;
        let affected = participants(&old);

        let reverted = self.revert_unlocked(match_id)?;
        if let Err(e) = self.matches.delete_match(match_id) {
            warn!("Delete of match {} failed, restoring its ratings: {}", match_id, e);
            self.restore(&old);
            return Err(e);
        }
        let recalculation = self.recalculate_unlocked(&affected, RatingType::Global, match_id)?;

        info!(
            "Deleted match {}: {} later matches replayed, {} failed",
            match_id,
            recalculation.recalculated,
            recalculation.failed.len()
        );
        Ok(DeleteReport {
            match_id,
            reverted,
            recalculation,
        })
    }

    /// Drops every rating and replays all stored matches from scratch
    pub fn rebuild_all(&self) -> Result<RecalculationReport> {
        let _guard = self.lock()?;

        self.ledger.clear_ratings()?;
        let ids = self.matches.all_match_ids()?;
        info!("Rebuilding ratings from {} matches", ids.len());

        let mut report = RecalculationReport::default();
        for match_id in ids {
            match self.processor.process_match(match_id).and_then(complete) {
                Ok(()) => report.recalculated += 1,
                Err(e) => report.fail(match_id, &e),
            }
        }

        info!(
            "Rebuild finished: {} matches rated, {} failed",
            report.recalculated,
            report.failed.len()
        );
        Ok(report)
    }

    fn revert_unlocked(&self, match_id: MatchId) -> Result<RevertReport> {
        let entries = self.ledger.entries_for_match(match_id)?;
        let mut report = RevertReport {
            match_id,
            ..Default::default()
        };

        for entry in &entries {
            match self.ledger.revert_entry(entry) {
                Ok(_) => report.reverted += 1,
                Err(e) => {
                    warn!(
                        "Failed to revert {} entry {} of match {}: {}",
                        entry.rating_type, entry.id, match_id, e
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Rates a match again after a failed store write left it reverted
    fn restore(&self, old: &MatchOutcomeInput) {
        if let Err(e) = self.processor.process_input(old).and_then(complete) {
            error!("Could not restore ratings of match {}: {}", old.id, e);
        }
    }

    /// Replays every later match that shares a player with the affected
    /// set, in all rating types. Players met along the way join the set,
    /// since their ratings move too. `rating_type` only labels the run.
    fn recalculate_unlocked(
        &self,
        players: &BTreeSet<PlayerId>,
        rating_type: RatingType,
        after: MatchId,
    ) -> Result<RecalculationReport> {
        let mut report = RecalculationReport::default();

        let seed: Vec<PlayerId> = players.iter().copied().collect();
        if self.matches.matches_involving_after(&seed, after)?.is_empty() {
            return Ok(report);
        }

        let mut affected: HashSet<PlayerId> = players.iter().copied().collect();
        for match_id in self.matches.match_ids_after(after)? {
            let input = match self.matches.get_match(match_id) {
                Ok(Some(input)) => input,
                Ok(None) => continue,
                Err(e) => {
                    report.fail(match_id, &e);
                    continue;
                }
            };
            if !input.involves_any(&affected) {
                continue;
            }
            affected.extend(input.players());

            match self.replay(&input) {
                Ok(()) => report.recalculated += 1,
                Err(e) => report.fail(match_id, &e),
            }
        }

        info!(
            "Recalculated {} {} matches after {} ({} failed)",
            report.recalculated,
            rating_type,
            after,
            report.failed.len()
        );
        Ok(report)
    }

    fn replay(&self, input: &MatchOutcomeInput) -> Result<()> {
        let reverted = self.revert_unlocked(input.id)?;
        if reverted.failed > 0 {
            return Err(RatingError::TransientStore(format!(
                "{} entries could not be reverted",
                reverted.failed
            )));
        }
        self.processor.process_input(input).and_then(complete)
    }
}

fn complete(report: MatchReport) -> Result<()> {
    if report.is_complete() {
        Ok(())
    } else {
        Err(RatingError::TransientStore(format!(
            "{} entity updates failed",
            report.failures.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::EloSettings;
    use crate::rating::{MatchKind, Team};
    use crate::store::{HistoryLedger, MemoryStore, RatingStore};
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn setup() -> (Arc<MemoryStore>, RecalculationCoordinator) {
        let store = Arc::new(MemoryStore::new());
        let processor = Arc::new(MatchProcessor::new(
            store.clone(),
            store.clone(),
            EloSettings::default(),
        ));
        let coordinator = RecalculationCoordinator::new(store.clone(), store.clone(), processor);
        (store, coordinator)
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn singles(a: PlayerId, b: PlayerId, goals: (i32, i32), d: u32) -> NewMatch {
        NewMatch {
            team_a: vec![a],
            team_b: vec![b],
            team_a_goals: goals.0,
            team_b_goals: goals.1,
            kind: MatchKind::OneVsOne,
            went_to_penalties: false,
            penalty_winner: None,
            played_at: day(d),
            created_by: None,
        }
    }

    fn doubles(a: [PlayerId; 2], b: [PlayerId; 2], goals: (i32, i32), d: u32) -> NewMatch {
        NewMatch {
            team_a: a.to_vec(),
            team_b: b.to_vec(),
            team_a_goals: goals.0,
            team_b_goals: goals.1,
            kind: MatchKind::TwoVsTwo,
            went_to_penalties: goals.0 == goals.1,
            penalty_winner: (goals.0 == goals.1).then_some(Team::B),
            played_at: day(d),
            created_by: None,
        }
    }

    /// Every rating record with its ledger rows, keyed for comparison
    fn snapshot(store: &MemoryStore) -> Vec<(String, i32)> {
        let mut rows = Vec::new();
        for rating_type in [
            RatingType::Global,
            RatingType::OneVsOne,
            RatingType::TwoVsTwo,
            RatingType::Pair,
        ] {
            for record in store.list_ratings(rating_type, usize::MAX, 0).unwrap() {
                let entries = store
                    .history_page(&record.entity, rating_type, usize::MAX, 0)
                    .unwrap();
                // a record whose only match was reverted reads as the default
                if entries.is_empty() {
                    assert_eq!(record.rating, 1200);
                    continue;
                }
                rows.push((format!("{}:{}", record.entity.key(), rating_type), record.rating));
                for entry in entries {
                    rows.push((
                        format!("{}:{}:{}:before", record.entity.key(), rating_type, entry.match_id),
                        entry.rating_before,
                    ));
                    rows.push((
                        format!("{}:{}:{}:change", record.entity.key(), rating_type, entry.match_id),
                        entry.rating_change,
                    ));
                }
            }
        }
        rows.sort();
        rows
    }

    fn seed(coordinator: &RecalculationCoordinator) -> Vec<MatchId> {
        [
            singles(1, 2, (3, 0), 1),
            doubles([1, 3], [2, 4], (2, 1), 2),
            singles(3, 4, (1, 1), 3),
            singles(2, 5, (0, 4), 4),
            doubles([5, 6], [1, 4], (2, 2), 5),
            singles(6, 7, (2, 1), 6),
        ]
        .iter()
        .map(|m| coordinator.on_match_created(m).unwrap().match_id)
        .collect()
    }

    #[test]
    fn test_revert_then_process_is_idempotent() {
        let (store, coordinator) = setup();
        let ids = seed(&coordinator);
        let before = snapshot(&store);

        let reverted = coordinator.revert(ids[5]).unwrap();
        assert_eq!(reverted.reverted, 4);
        assert_eq!(reverted.failed, 0);
        coordinator.process(ids[5]).unwrap();

        assert_eq!(snapshot(&store), before);
    }

    #[test]
    fn test_revert_without_entries_is_noop() {
        let (_, coordinator) = setup();
        let report = coordinator.revert(404).unwrap();
        assert_eq!(report.reverted, 0);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_edit_matches_rebuild_from_scratch() {
        let (store, coordinator) = setup();
        let ids = seed(&coordinator);

        // flip the first result and bring in player 8
        let report = coordinator
            .on_match_edited(ids[0], &singles(8, 2, (0, 3), 1))
            .unwrap();
        assert!(report.recalculation.failed.is_empty());
        assert!(report.recalculation.recalculated > 0);
        let edited = snapshot(&store);

        coordinator.rebuild_all().unwrap();
        assert_eq!(snapshot(&store), edited);
        assert!(store
            .get_rating(&Entity::Player(8), RatingType::Global)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_delete_matches_rebuild_from_scratch() {
        let (store, coordinator) = setup();
        let ids = seed(&coordinator);

        let report = coordinator.on_match_deleted(ids[1]).unwrap();
        assert_eq!(report.reverted.reverted, 10);
        assert!(store.entries_for_match(ids[1]).unwrap().is_empty());
        assert!(store.get_match(ids[1]).unwrap().is_none());
        let deleted = snapshot(&store);

        coordinator.rebuild_all().unwrap();
        assert_eq!(snapshot(&store), deleted);
    }

    #[test]
    fn test_edit_of_missing_match_is_not_found() {
        let (_, coordinator) = setup();
        let err = coordinator
            .on_match_edited(3, &singles(1, 2, (1, 0), 1))
            .unwrap_err();
        assert!(matches!(err, RatingError::NotFound(_)));
    }

    #[test]
    fn test_invalid_edit_leaves_ratings_untouched() {
        let (store, coordinator) = setup();
        let ids = seed(&coordinator);
        let before = snapshot(&store);

        let err = coordinator
            .on_match_edited(ids[2], &singles(3, 3, (1, 0), 3))
            .unwrap_err();
        assert!(matches!(err, RatingError::InvalidMatchShape(_)));
        assert_eq!(snapshot(&store), before);
    }

    #[test]
    fn test_recalculate_skips_unrelated_matches() {
        let (_, coordinator) = setup();
        let ids = seed(&coordinator);

        // player 7 only appears in the last match
        let report = coordinator
            .recalculate_subsequent(&[Entity::Player(7)], RatingType::Global, ids[0])
            .unwrap();
        assert_eq!(report.recalculated, 1);

        let report = coordinator
            .recalculate_subsequent(&[Entity::Player(7)], RatingType::Global, ids[5])
            .unwrap();
        assert_eq!(report.recalculated, 0);
    }

    #[test]
    fn test_recalculate_follows_players_met_later() {
        let (_, coordinator) = setup();
        let ids = seed(&coordinator);

        // 5 meets 6 in match 5, 6 meets 7 in match 6
        let report = coordinator
            .recalculate_subsequent(&[Entity::Player(5)], RatingType::Global, ids[2])
            .unwrap();
        assert_eq!(report.recalculated, 3);

        // the doubles match counts even when the run is labelled 1v1
        let report = coordinator
            .recalculate_subsequent(&[Entity::pair(5, 6).unwrap()], RatingType::OneVsOne, ids[3])
            .unwrap();
        assert_eq!(report.recalculated, 2);
    }

    #[test]
    fn test_singles_correction_replays_later_doubles() {
        let (store, coordinator) = setup();
        let first = coordinator
            .on_match_created(&singles(1, 2, (3, 0), 1))
            .unwrap()
            .match_id;
        let second = coordinator
            .on_match_created(&doubles([1, 3], [4, 5], (2, 1), 2))
            .unwrap()
            .match_id;

        coordinator.revert(first).unwrap();
        store.update_match(first, &singles(1, 2, (0, 3), 1)).unwrap();
        coordinator.process(first).unwrap();
        let report = coordinator
            .recalculate_subsequent(&[Entity::Player(1)], RatingType::OneVsOne, first)
            .unwrap();
        assert_eq!(report.recalculated, 1);

        let global_entry = |match_id: MatchId| {
            store
                .entries_for_match(match_id)
                .unwrap()
                .into_iter()
                .find(|e| e.entity == Entity::Player(1) && e.rating_type == RatingType::Global)
                .unwrap()
        };
        assert_eq!(global_entry(first).rating_after, 1180);
        assert_eq!(global_entry(second).rating_before, 1180);
    }

    /// Match store that fails on demand
    struct FaultyMatches {
        inner: Arc<MemoryStore>,
        /// The read that brings this down to zero fails; zero means never
        reads_until_failure: AtomicUsize,
        fail_deletes: AtomicBool,
    }

    impl FaultyMatches {
        fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                reads_until_failure: AtomicUsize::new(0),
                fail_deletes: AtomicBool::new(false),
            }
        }

        fn unavailable() -> RatingError {
            RatingError::TransientStore("match store unavailable".to_string())
        }
    }

    impl MatchStore for FaultyMatches {
        fn get_match(&self, match_id: MatchId) -> Result<Option<MatchOutcomeInput>> {
            let remaining = self
                .reads_until_failure
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if remaining == Ok(1) {
                return Err(Self::unavailable());
            }
            self.inner.get_match(match_id)
        }

        fn insert_match(&self, new_match: &NewMatch) -> Result<MatchId> {
            self.inner.insert_match(new_match)
        }

        fn update_match(&self, match_id: MatchId, new_match: &NewMatch) -> Result<()> {
            self.inner.update_match(match_id, new_match)
        }

        fn delete_match(&self, match_id: MatchId) -> Result<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(Self::unavailable());
            }
            self.inner.delete_match(match_id)
        }

        fn match_ids_after(&self, after: MatchId) -> Result<Vec<MatchId>> {
            self.inner.match_ids_after(after)
        }

        fn matches_involving_after(
            &self,
            players: &[PlayerId],
            after: MatchId,
        ) -> Result<Vec<MatchId>> {
            self.inner.matches_involving_after(players, after)
        }
    }

    fn faulty_setup() -> (Arc<MemoryStore>, Arc<FaultyMatches>, RecalculationCoordinator) {
        let store = Arc::new(MemoryStore::new());
        let faulty = Arc::new(FaultyMatches::new(store.clone()));
        let processor = Arc::new(MatchProcessor::new(
            faulty.clone(),
            store.clone(),
            EloSettings::default(),
        ));
        let coordinator = RecalculationCoordinator::new(faulty.clone(), store.clone(), processor);
        (store, faulty, coordinator)
    }

    #[test]
    fn test_edit_still_replays_when_edited_match_cannot_be_rated() {
        let (store, faulty, coordinator) = faulty_setup();
        let ids = seed(&coordinator);

        // the edit reads the old match first, processing reads it second
        faulty.reads_until_failure.store(2, Ordering::SeqCst);
        let report = coordinator
            .on_match_edited(ids[0], &singles(1, 2, (0, 3), 1))
            .unwrap();

        assert!(report.processed.is_none());
        assert!(report.processing_error.is_some());
        assert_eq!(report.recalculation.recalculated, 5);
        assert!(report.recalculation.failed.is_empty());
        assert!(store.entries_for_match(ids[0]).unwrap().is_empty());

        // player 2 goes into the doubles match with no rated history
        let entry = store
            .entries_for_match(ids[1])
            .unwrap()
            .into_iter()
            .find(|e| e.entity == Entity::Player(2) && e.rating_type == RatingType::Global)
            .unwrap();
        assert_eq!(entry.rating_before, 1200);
    }

    #[test]
    fn test_failed_delete_restores_ratings() {
        let (store, faulty, coordinator) = faulty_setup();
        let ids = seed(&coordinator);
        let before = snapshot(&store);

        faulty.fail_deletes.store(true, Ordering::SeqCst);
        let err = coordinator.on_match_deleted(ids[1]).unwrap_err();
        assert!(matches!(err, RatingError::TransientStore(_)));

        assert!(store.get_match(ids[1]).unwrap().is_some());
        assert_eq!(store.entries_for_match(ids[1]).unwrap().len(), 10);
        assert_eq!(snapshot(&store), before);
    }

    #[test]
    fn test_reprocessing_does_not_duplicate_entries() {
        let (store, coordinator) = setup();
        let id = coordinator.on_match_created(&singles(1, 2, (1, 0), 1)).unwrap().match_id;

        let report = coordinator.processor.process_match(id).unwrap();
        assert_eq!(report.failures.len(), 4);
        assert!(store.get_match(id).unwrap().is_some());
    }
}
