use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::settings::SmartScoreSettings;
use crate::domain::{DateWindow, HistoryEntry};
use crate::errors::Result;
use crate::rating::{Entity, RatingType, RatingValue};
use crate::store::LedgerStore;

use super::history::HistoricalRatingReconstructor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmartScoreRow {
    pub entity: Entity,
    pub matches_count: usize,
    pub winrate: f64,
    pub consistency: f64,
    pub activity_score: f64,
    pub historical_rating: RatingValue,
    pub smart_score: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Composite ranking over one date window
pub struct SmartScoreEngine {
    ledger: Arc<dyn LedgerStore>,
    reconstructor: Arc<HistoricalRatingReconstructor>,
    settings: SmartScoreSettings,
}

impl SmartScoreEngine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        reconstructor: Arc<HistoricalRatingReconstructor>,
        settings: SmartScoreSettings,
    ) -> Self {
        Self {
            ledger,
            reconstructor,
            settings,
        }
    }

    /// Entities with at least one match in the window, best score first
    pub fn rank(&self, rating_type: RatingType, window: &DateWindow) -> Result<Vec<SmartScoreRow>> {
        let entries = self.ledger.entries_in_window(rating_type, window)?;

        let mut by_entity: BTreeMap<Entity, Vec<&HistoryEntry>> = BTreeMap::new();
        for entry in &entries {
            by_entity.entry(entry.entity).or_default().push(entry);
        }
        debug!(
            "Smart score for {}: {} entries over {} entities",
            rating_type,
            entries.len(),
            by_entity.len()
        );

        let mut rows = by_entity
            .into_iter()
            .map(|(entity, entries)| self.score(entity, rating_type, window, &entries))
            .collect::<Result<Vec<_>>>()?;

        // BTreeMap order makes the sort stable by entity for equal scores
        rows.sort_by(|a, b| b.smart_score.total_cmp(&a.smart_score));
        Ok(rows)
    }

    fn score(
        &self,
        entity: Entity,
        rating_type: RatingType,
        window: &DateWindow,
        entries: &[&HistoryEntry],
    ) -> Result<SmartScoreRow> {
        let matches_count = entries.len();
        let historical_rating = self
            .reconstructor
            .rating_at(&entity, rating_type, window.end)?;

        let winrate = self.winrate(entries);
        let consistency = self.consistency(entries);
        let activity_score = self.activity(matches_count, entity.is_pair());

        let s = &self.settings;
        let smart_score = f64::from(historical_rating) * s.rating_weight
            + consistency * s.consistency_weight
            + winrate * s.winrate_weight
            + activity_score * s.activity_weight;

        Ok(SmartScoreRow {
            entity,
            matches_count,
            winrate: round2(winrate),
            consistency: round2(consistency),
            activity_score: round2(activity_score),
            historical_rating,
            smart_score: round2(smart_score),
        })
    }

    /// Share of outright wins; shoot-out wins do not count here
    fn winrate(&self, entries: &[&HistoryEntry]) -> f64 {
        if entries.is_empty() {
            return 0.0;
        }
        let wins = entries.iter().filter(|e| e.is_outright_win()).count();
        wins as f64 / entries.len() as f64 * 100.0
    }

    fn consistency(&self, entries: &[&HistoryEntry]) -> f64 {
        let changes: Vec<f64> = entries
            .iter()
            .filter(|e| e.rating_change != 0)
            .map(|e| f64::from(e.rating_change))
            .collect();

        if changes.len() < 2 {
            return self.settings.consistency_default;
        }

        (100.0 - 2.0 * std_dev(&changes))
            .clamp(self.settings.consistency_min, self.settings.consistency_max)
    }

    fn activity(&self, matches_count: usize, is_pair: bool) -> f64 {
        let cap = if is_pair {
            self.settings.pair_activity_cap
        } else {
            self.settings.player_activity_cap
        };
        (100.0 * matches_count as f64 / cap.max(1) as f64).min(100.0)
    }
}
