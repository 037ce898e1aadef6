use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::errors::Result;
use crate::rating::{Entity, RatingType, RatingValue};
use crate::store::LedgerStore;

/// Answers "what was this rating on a given date" from the ledger
pub struct HistoricalRatingReconstructor {
    ledger: Arc<dyn LedgerStore>,
    default_rating: RatingValue,
}

impl HistoricalRatingReconstructor {
    pub fn new(ledger: Arc<dyn LedgerStore>, default_rating: RatingValue) -> Self {
        Self {
            ledger,
            default_rating,
        }
    }

    pub fn rating_at(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        cutoff: NaiveDateTime,
    ) -> Result<RatingValue> {
        rating_type.ensure_applies_to(entity)?;
        Ok(self
            .ledger
            .latest_entry_at(entity, rating_type, cutoff)?
            .map(|entry| entry.rating_after)
            .unwrap_or(self.default_rating))
    }
}
