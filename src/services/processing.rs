use log::{debug, info, warn};
use std::sync::Arc;

use crate::config::settings::EloSettings;
use crate::domain::{EntryContext, HistoryEntry, MatchOutcomeInput, RatingSnapshot};
use crate::errors::{RatingError, Result};
use crate::rating::{
    evaluate, expected_score, k_factor, new_rating, team_rating, Entity, MatchId, MatchKind,
    MatchOutcome, RatingType, RatingValue, Team,
};
use crate::store::{LedgerStore, MatchStore};

/// One (entity, rating type) update that did not go through
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFailure {
    pub entity: Entity,
    pub rating_type: RatingType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    pub match_id: MatchId,
    pub entries: Vec<HistoryEntry>,
    pub failures: Vec<EntityFailure>,
}

impl MatchReport {
    fn new(match_id: MatchId) -> Self {
        Self {
            match_id,
            entries: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, entity: Entity, rating_type: RatingType, outcome: Result<HistoryEntry>) {
        match outcome {
            Ok(entry) => self.entries.push(entry),
            Err(e) => {
                warn!(
                    "Failed to update {} rating of {} for match {}: {}",
                    rating_type, entity, self.match_id, e
                );
                self.failures.push(EntityFailure {
                    entity,
                    rating_type,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Inputs for one entity's update that do not depend on its own rating
struct SideUpdate {
    expected: f64,
    actual: f64,
    bonus: i32,
    context: EntryContext,
}

/// Applies one match to every rating type it touches
pub struct MatchProcessor {
    matches: Arc<dyn MatchStore>,
    ledger: Arc<dyn LedgerStore>,
    settings: EloSettings,
}

impl MatchProcessor {
    pub fn new(
        matches: Arc<dyn MatchStore>,
        ledger: Arc<dyn LedgerStore>,
        settings: EloSettings,
    ) -> Self {
        Self {
            matches,
            ledger,
            settings,
        }
    }

    pub fn settings(&self) -> &EloSettings {
        &self.settings
    }

    pub fn process_match(&self, match_id: MatchId) -> Result<MatchReport> {
        let input = self
            .matches
            .get_match(match_id)?
            .ok_or_else(|| RatingError::match_not_found(match_id))?;
        self.process_input(&input)
    }

    /// Global pass, then the kind pass, then the pair pass for doubles.
    /// Entity failures are collected in the report instead of aborting.
    pub fn process_input(&self, input: &MatchOutcomeInput) -> Result<MatchReport> {
        input.ensure_shape()?;

        let outcome = evaluate(input, &self.settings);
        let mut report = MatchReport::new(input.id);

        self.individual_pass(input, &outcome, RatingType::Global, &mut report);
        self.individual_pass(input, &outcome, RatingType::for_kind(input.kind), &mut report);

        if input.kind == MatchKind::TwoVsTwo && input.team_a.len() == 2 && input.team_b.len() == 2
        {
            self.pair_pass(input, &outcome, &mut report);
        }

        info!(
            "Processed match {}: {} entries, {} failures",
            input.id,
            report.entries.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn individual_pass(
        &self,
        input: &MatchOutcomeInput,
        outcome: &MatchOutcome,
        rating_type: RatingType,
        report: &mut MatchReport,
    ) {
        let aggregates = self
            .team_aggregate(input, &input.team_a, rating_type)
            .and_then(|a| Ok((a, self.team_aggregate(input, &input.team_b, rating_type)?)));

        let (team_a_rating, team_b_rating) = match aggregates {
            Ok(ratings) => ratings,
            Err(e) => {
                for player in input.players() {
                    report.record(
                        Entity::Player(player),
                        rating_type,
                        Err(RatingError::TransientStore(format!(
                            "team ratings unavailable: {}",
                            e
                        ))),
                    );
                }
                return;
            }
        };
        debug!(
            "Match {} {} aggregates: A={} B={}",
            input.id, rating_type, team_a_rating, team_b_rating
        );

        for (team, players) in [(Team::A, &input.team_a), (Team::B, &input.team_b)] {
            let (own, opponent) = match team {
                Team::A => (team_a_rating, team_b_rating),
                Team::B => (team_b_rating, team_a_rating),
            };
            for player in players {
                let entity = Entity::Player(*player);
                let side = self.side_update(input, outcome, team, own, opponent);
                report.record(entity, rating_type, self.apply(&entity, rating_type, side));
            }
        }
    }

    fn pair_pass(&self, input: &MatchOutcomeInput, outcome: &MatchOutcome, report: &mut MatchReport) {
        let pairs = Entity::pair(input.team_a[0], input.team_a[1])
            .and_then(|a| Ok((a, Entity::pair(input.team_b[0], input.team_b[1])?)));
        let (pair_a, pair_b) = match pairs {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!("Skipping pair ratings for match {}: {}", input.id, e);
                return;
            }
        };

        let ratings = self
            .pair_rating(&pair_a, input.id)
            .and_then(|a| Ok((a, self.pair_rating(&pair_b, input.id)?)));
        let (rating_a, rating_b) = match ratings {
            Ok(ratings) => ratings,
            Err(e) => {
                for pair in [pair_a, pair_b] {
                    report.record(
                        pair,
                        RatingType::Pair,
                        Err(RatingError::TransientStore(format!(
                            "pair ratings unavailable: {}",
                            e
                        ))),
                    );
                }
                return;
            }
        };

        for (team, pair, own, opponent) in [
            (Team::A, pair_a, rating_a, rating_b),
            (Team::B, pair_b, rating_b, rating_a),
        ] {
            let side = self.side_update(input, outcome, team, own, opponent);
            report.record(pair, RatingType::Pair, self.apply(&pair, RatingType::Pair, side));
        }
    }

    /// Rounded mean of the members' ratings going into this match
    fn team_aggregate(
        &self,
        input: &MatchOutcomeInput,
        players: &[i64],
        rating_type: RatingType,
    ) -> Result<RatingValue> {
        let ratings = players
            .iter()
            .map(|p| {
                self.ledger
                    .snapshot_before(&Entity::Player(*p), rating_type, input.id)
                    .map(|s| s.prior_rating)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(team_rating(&ratings, &self.settings))
    }

    fn pair_rating(&self, pair: &Entity, match_id: MatchId) -> Result<RatingValue> {
        let snapshot = self.ledger.snapshot_before(pair, RatingType::Pair, match_id)?;
        Ok(snapshot.prior_rating.unwrap_or(self.settings.default_rating))
    }

    fn side_update(
        &self,
        input: &MatchOutcomeInput,
        outcome: &MatchOutcome,
        team: Team,
        own: RatingValue,
        opponent: RatingValue,
    ) -> SideUpdate {
        SideUpdate {
            expected: expected_score(own, opponent),
            actual: outcome.score_for(team),
            bonus: outcome.bonus_for(team),
            context: EntryContext {
                match_id: input.id,
                played_at: input.played_at,
                result: outcome.result_for(team),
                penalty_result: outcome.penalty_result_for(team),
                goal_bonus: outcome.bonus_for(team),
            },
        }
    }

    fn apply(&self, entity: &Entity, rating_type: RatingType, side: SideUpdate) -> Result<HistoryEntry> {
        let settings = &self.settings;
        let compute = |snapshot: RatingSnapshot| {
            let current = snapshot.prior_rating.unwrap_or(settings.default_rating);
            let k = k_factor(snapshot.prior_entries, current, settings);
            new_rating(current, side.expected, side.actual, k, side.bonus, settings)
        };

        self.ledger.apply_update(
            entity,
            rating_type,
            &side.context,
            settings.default_rating,
            &compute,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewMatch;
    use crate::rating::{MatchResult, PenaltyResult, PlayerId};
    use crate::store::{HistoryLedger, MemoryStore, RatingStore};
    use chrono::NaiveDate;

    fn setup() -> (Arc<MemoryStore>, MatchProcessor) {
        let store = Arc::new(MemoryStore::new());
        let processor = MatchProcessor::new(store.clone(), store.clone(), EloSettings::default());
        (store, processor)
    }

    fn new_match(
        team_a: Vec<PlayerId>,
        team_b: Vec<PlayerId>,
        goals: (i32, i32),
        penalty_winner: Option<Team>,
    ) -> NewMatch {
        let kind = if team_a.len() == 2 {
            MatchKind::TwoVsTwo
        } else {
            MatchKind::OneVsOne
        };
        NewMatch {
            team_a,
            team_b,
            team_a_goals: goals.0,
            team_b_goals: goals.1,
            kind,
            went_to_penalties: penalty_winner.is_some(),
            penalty_winner,
            played_at: NaiveDate::from_ymd_opt(2024, 4, 10)
                .unwrap()
                .and_hms_opt(19, 0, 0)
                .unwrap(),
            created_by: None,
        }
    }

    fn entry_for(report: &MatchReport, entity: Entity, rating_type: RatingType) -> &HistoryEntry {
        report
            .entries
            .iter()
            .find(|e| e.entity == entity && e.rating_type == rating_type)
            .unwrap()
    }

    #[test]
    fn test_goal_bonus_scenario() {
        let (store, processor) = setup();
        let id = store
            .insert_match(&new_match(vec![1, 2], vec![3, 4], (5, 1), None))
            .unwrap();

        let report = processor.process_match(id).unwrap();
        assert!(report.is_complete());

        // 4 players x (global, 2v2) + 2 pairs
        assert_eq!(report.entries.len(), 10);
        let winner = entry_for(&report, Entity::Player(1), RatingType::Global);
        assert_eq!(winner.rating_change, 25);
        assert_eq!(winner.goal_bonus, 5);
        assert_eq!(winner.result, MatchResult::Win);
        let loser = entry_for(&report, Entity::Player(3), RatingType::TwoVsTwo);
        assert_eq!(loser.rating_change, -20);
        assert_eq!(loser.rating_after, 1180);

        let pair = entry_for(&report, Entity::pair(2, 1).unwrap(), RatingType::Pair);
        assert_eq!(pair.rating_after, 1225);
    }

    #[test]
    fn test_penalty_scenario() {
        let (store, processor) = setup();
        let id = store
            .insert_match(&new_match(vec![1], vec![2], (2, 2), Some(Team::A)))
            .unwrap();

        let report = processor.process_match(id).unwrap();
        assert_eq!(report.entries.len(), 4);

        let winner = entry_for(&report, Entity::Player(1), RatingType::OneVsOne);
        assert_eq!(winner.rating_change, 8);
        assert_eq!(winner.result, MatchResult::Win);
        assert_eq!(winner.penalty_result, PenaltyResult::Won);
        assert_eq!(winner.display_result(), "win (pen)");

        let loser = entry_for(&report, Entity::Player(2), RatingType::OneVsOne);
        assert_eq!(loser.rating_change, -8);
        assert_eq!(loser.penalty_result, PenaltyResult::Lost);
    }

    #[test]
    fn test_new_player_uses_high_k_factor() {
        let (store, processor) = setup();
        let id = store
            .insert_match(&new_match(vec![1], vec![2], (1, 0), None))
            .unwrap();

        let report = processor.process_match(id).unwrap();
        let winner = entry_for(&report, Entity::Player(1), RatingType::Global);
        // K = 40 at equal ratings: 40 * 0.5
        assert_eq!(winner.rating_change, 20);
        assert_eq!(winner.rating_before, 1200);
    }

    #[test]
    fn test_draw_between_equal_players_changes_nothing() {
        let (store, processor) = setup();
        let id = store
            .insert_match(&new_match(vec![1], vec![2], (1, 1), None))
            .unwrap();

        let report = processor.process_match(id).unwrap();
        assert!(report.entries.iter().all(|e| e.rating_change == 0));
        assert!(report.entries.iter().all(|e| e.result == MatchResult::Draw));
    }

    #[test]
    fn test_missing_match_is_not_found() {
        let (_, processor) = setup();
        assert!(matches!(
            processor.process_match(99),
            Err(RatingError::NotFound(_))
        ));
    }

    #[test]
    fn test_wrong_team_size_writes_nothing() {
        let (store, processor) = setup();
        let mut input = new_match(vec![1], vec![2], (1, 0), None).into_input(7);
        input.kind = MatchKind::TwoVsTwo;

        let err = processor.process_input(&input).unwrap_err();
        assert!(matches!(err, RatingError::InvalidMatchShape(_)));
        assert_eq!(store.count_ratings(RatingType::Global).unwrap(), 0);
    }

    #[test]
    fn test_processing_twice_records_failures_instead_of_duplicates() {
        let (store, processor) = setup();
        let id = store
            .insert_match(&new_match(vec![1], vec![2], (3, 0), None))
            .unwrap();

        processor.process_match(id).unwrap();
        let again = processor.process_match(id).unwrap();
        assert!(again.entries.is_empty());
        assert_eq!(again.failures.len(), 4);
        assert_eq!(store.entries_for_match(id).unwrap().len(), 4);
    }

    #[test]
    fn test_floor_holds_and_change_matches_applied_delta() {
        let (store, processor) = setup();
        let mut last = None;
        for _ in 0..60 {
            let id = store
                .insert_match(&new_match(vec![1], vec![2], (0, 9), None))
                .unwrap();
            last = Some(processor.process_match(id).unwrap());
        }

        let report = last.unwrap();
        let loser = entry_for(&report, Entity::Player(1), RatingType::Global);
        assert!(loser.rating_after >= 100);
        assert_eq!(loser.rating_after - loser.rating_before, loser.rating_change);
        let record = store.get_rating(&Entity::Player(1), RatingType::Global).unwrap().unwrap();
        assert!(record.rating >= 100);
    }
}
