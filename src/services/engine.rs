use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::domain::{DateWindow, HistoryEntry, NewMatch, Page, PageRequest};
use crate::errors::Result;
use crate::rating::{Entity, MatchId, RatingType, RatingValue};
use crate::store::{LedgerStore, MatchStore};

use super::history::HistoricalRatingReconstructor;
use super::leaderboard::{LeaderboardRow, LeaderboardService};
use super::processing::{MatchProcessor, MatchReport};
use super::recalculation::{
    CreateReport, DeleteReport, EditReport, RecalculationCoordinator, RecalculationReport,
    RevertReport,
};
use super::smart_score::{SmartScoreEngine, SmartScoreRow};

/// Everything the binary and the HTTP layer call, wired over one set of stores
pub struct RatingEngine {
    config: AppConfig,
    coordinator: RecalculationCoordinator,
    reconstructor: Arc<HistoricalRatingReconstructor>,
    leaderboard: LeaderboardService,
}

impl RatingEngine {
    /// Wires every service over a store that holds both matches and ratings
    pub fn new<S>(store: Arc<S>, config: AppConfig) -> Self
    where
        S: MatchStore + LedgerStore + 'static,
    {
        Self::with_stores(store.clone(), store, config)
    }

    pub fn with_stores(
        matches: Arc<dyn MatchStore>,
        ledger: Arc<dyn LedgerStore>,
        config: AppConfig,
    ) -> Self {
        let processor = Arc::new(MatchProcessor::new(
            matches.clone(),
            ledger.clone(),
            config.elo.clone(),
        ));
        let coordinator = RecalculationCoordinator::new(matches, ledger.clone(), processor);
        let reconstructor = Arc::new(HistoricalRatingReconstructor::new(
            ledger.clone(),
            config.elo.default_rating,
        ));
        let smart = Arc::new(SmartScoreEngine::new(
            ledger.clone(),
            reconstructor.clone(),
            config.smart.clone(),
        ));
        let leaderboard = LeaderboardService::new(ledger, smart);

        Self {
            config,
            coordinator,
            reconstructor,
            leaderboard,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn process_match(&self, match_id: MatchId) -> Result<MatchReport> {
        self.coordinator.process(match_id)
    }

    pub fn revert_match(&self, match_id: MatchId) -> Result<RevertReport> {
        self.coordinator.revert(match_id)
    }

    pub fn recalculate_subsequent(
        &self,
        entities: &[Entity],
        rating_type: RatingType,
        after: MatchId,
    ) -> Result<RecalculationReport> {
        self.coordinator
            .recalculate_subsequent(entities, rating_type, after)
    }

    pub fn on_match_created(&self, new_match: &NewMatch) -> Result<CreateReport> {
        self.coordinator.on_match_created(new_match)
    }

    pub fn on_match_edited(&self, match_id: MatchId, edit: &NewMatch) -> Result<EditReport> {
        self.coordinator.on_match_edited(match_id, edit)
    }

    pub fn on_match_deleted(&self, match_id: MatchId) -> Result<DeleteReport> {
        self.coordinator.on_match_deleted(match_id)
    }

    pub fn rebuild_all(&self) -> Result<RecalculationReport> {
        self.coordinator.rebuild_all()
    }

    pub fn rating_at(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        cutoff: NaiveDateTime,
    ) -> Result<RatingValue> {
        self.reconstructor.rating_at(entity, rating_type, cutoff)
    }

    pub fn leaderboard(
        &self,
        rating_type: RatingType,
        request: PageRequest,
    ) -> Result<Page<LeaderboardRow>> {
        self.leaderboard.leaderboard(rating_type, request)
    }

    pub fn smart_leaderboard(
        &self,
        rating_type: RatingType,
        window: &DateWindow,
        request: PageRequest,
    ) -> Result<Page<SmartScoreRow>> {
        self.leaderboard
            .smart_leaderboard(rating_type, window, request)
    }

    pub fn history(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        request: PageRequest,
    ) -> Result<Page<HistoryEntry>> {
        self.leaderboard.history(entity, rating_type, request)
    }
}
