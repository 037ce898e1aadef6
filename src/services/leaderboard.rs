use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::{DateWindow, HistoryEntry, Page, PageRequest};
use crate::errors::Result;
use crate::rating::{Entity, RatingType, RatingValue};
use crate::store::LedgerStore;

use super::smart_score::{SmartScoreEngine, SmartScoreRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub entity: Entity,
    pub rating: RatingValue,
    pub matches_played: usize,
    /// Percentage of wins, shoot-out wins included
    pub winrate: f64,
}

/// Read side: current leaderboard, smart leaderboard and history pages
pub struct LeaderboardService {
    ledger: Arc<dyn LedgerStore>,
    smart: Arc<SmartScoreEngine>,
}

impl LeaderboardService {
    pub fn new(ledger: Arc<dyn LedgerStore>, smart: Arc<SmartScoreEngine>) -> Self {
        Self { ledger, smart }
    }

    pub fn leaderboard(
        &self,
        rating_type: RatingType,
        request: PageRequest,
    ) -> Result<Page<LeaderboardRow>> {
        let total = self.ledger.count_ratings(rating_type)?;
        let records = self
            .ledger
            .list_ratings(rating_type, request.limit(), request.offset())?;

        let rows = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let (matches_played, wins) =
                    self.ledger.result_counts(&record.entity, rating_type)?;
                Ok(LeaderboardRow {
                    rank: request.offset() + i + 1,
                    entity: record.entity,
                    rating: record.rating,
                    matches_played,
                    winrate: winrate(wins, matches_played),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Leaderboard {}: {} of {} rows", rating_type, rows.len(), total);
        Ok(request.wrap(rows, total))
    }

    pub fn smart_leaderboard(
        &self,
        rating_type: RatingType,
        window: &DateWindow,
        request: PageRequest,
    ) -> Result<Page<SmartScoreRow>> {
        let ranked = self.smart.rank(rating_type, window)?;
        Ok(request.wrap(request.slice(&ranked), ranked.len()))
    }

    /// Newest match first. Unknown entities and mismatched types give an empty page.
    pub fn history(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        request: PageRequest,
    ) -> Result<Page<HistoryEntry>> {
        match self.history_page(entity, rating_type, request) {
            Err(e) if e.is_empty_answer() => {
                warn!("History of {} ({}) unavailable: {}", entity, rating_type, e);
                Ok(Page::empty(request.page, request.page_size))
            }
            other => other,
        }
    }

    fn history_page(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        request: PageRequest,
    ) -> Result<Page<HistoryEntry>> {
        rating_type.ensure_applies_to(entity)?;
        let total = self.ledger.count_history(entity, rating_type)?;
        if total == 0 {
            return Ok(Page::empty(request.page, request.page_size));
        }

        let items = self
            .ledger
            .history_page(entity, rating_type, request.limit(), request.offset())?;
        Ok(request.wrap(items, total))
    }
}

fn winrate(wins: usize, matches: usize) -> f64 {
    if matches == 0 {
        return 0.0;
    }
    (wins as f64 / matches as f64 * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{EloSettings, SmartScoreSettings};
    use crate::domain::NewMatch;
    use crate::rating::{MatchKind, PlayerId, Team};
    use crate::services::history::HistoricalRatingReconstructor;
    use crate::services::processing::MatchProcessor;
    use crate::store::{MatchStore, MemoryStore};
    use chrono::NaiveDate;

    fn setup() -> (Arc<MemoryStore>, MatchProcessor, LeaderboardService) {
        let store = Arc::new(MemoryStore::new());
        let processor = MatchProcessor::new(store.clone(), store.clone(), EloSettings::default());
        let reconstructor = Arc::new(HistoricalRatingReconstructor::new(store.clone(), 1200));
        let smart = Arc::new(SmartScoreEngine::new(
            store.clone(),
            reconstructor,
            SmartScoreSettings::default(),
        ));
        let service = LeaderboardService::new(store.clone(), smart);
        (store, processor, service)
    }

    fn play(
        store: &MemoryStore,
        processor: &MatchProcessor,
        a: PlayerId,
        b: PlayerId,
        goals: (i32, i32),
        penalty_winner: Option<Team>,
    ) {
        let id = store
            .insert_match(&NewMatch {
                team_a: vec![a],
                team_b: vec![b],
                team_a_goals: goals.0,
                team_b_goals: goals.1,
                kind: MatchKind::OneVsOne,
                went_to_penalties: penalty_winner.is_some(),
                penalty_winner,
                played_at: NaiveDate::from_ymd_opt(2024, 8, 1)
                    .unwrap()
                    .and_hms_opt(18, 0, 0)
                    .unwrap(),
                created_by: None,
            })
            .unwrap();
        processor.process_match(id).unwrap();
    }

    #[test]
    fn test_leaderboard_orders_and_counts_penalty_wins() {
        let (store, processor, service) = setup();
        play(&store, &processor, 1, 2, (3, 1), None);
        play(&store, &processor, 1, 3, (2, 2), Some(Team::A));
        play(&store, &processor, 2, 3, (0, 1), None);

        let page = service
            .leaderboard(RatingType::Global, PageRequest::new(1, 10))
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].entity, Entity::Player(1));
        assert_eq!(page.items[0].rank, 1);
        assert_eq!(page.items[0].matches_played, 2);
        assert_eq!(page.items[0].winrate, 100.0);

        let third = &page.items[2];
        assert_eq!(third.entity, Entity::Player(2));
        assert_eq!(third.winrate, 0.0);

        let second_page = service
            .leaderboard(RatingType::Global, PageRequest::new(2, 2))
            .unwrap();
        assert_eq!(second_page.items.len(), 1);
        assert_eq!(second_page.items[0].rank, 3);
    }

    #[test]
    fn test_winrate_rounds_to_two_decimals() {
        assert_eq!(winrate(1, 3), 33.33);
        assert_eq!(winrate(2, 3), 66.67);
        assert_eq!(winrate(0, 0), 0.0);
    }

    #[test]
    fn test_history_is_newest_first_with_labels() {
        let (store, processor, service) = setup();
        play(&store, &processor, 1, 2, (1, 0), None);
        play(&store, &processor, 2, 1, (4, 4), Some(Team::A));

        let page = service
            .history(&Entity::Player(1), RatingType::OneVsOne, PageRequest::new(1, 50))
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items[0].match_id > page.items[1].match_id);
        assert_eq!(page.items[0].display_result(), "loss (pen)");
        assert_eq!(page.items[1].display_result(), "win");
    }

    #[test]
    fn test_history_of_unknown_entity_is_empty() {
        let (_, _, service) = setup();
        let page = service
            .history(&Entity::Player(77), RatingType::Global, PageRequest::new(1, 20))
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);

        let page = service
            .history(&Entity::Player(77), RatingType::Pair, PageRequest::new(1, 20))
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_smart_leaderboard_pages_ranked_rows() {
        let (store, processor, service) = setup();
        play(&store, &processor, 1, 2, (3, 0), None);
        play(&store, &processor, 3, 4, (3, 0), None);

        let window = DateWindow::parse("2024-08-01", "2024-08-01").unwrap();
        let page = service
            .smart_leaderboard(RatingType::Global, &window, PageRequest::new(1, 3))
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 3);
        assert!(page.items[0].smart_score >= page.items[1].smart_score);
    }
}
