//! Repository seams the engine is built against.
//!
//! `SqliteStore` backs the binary; `MemoryStore` backs unit tests. Both
//! implement every trait here so one `Arc` can be shared across services.

pub mod memory;
pub mod sqlite;

use chrono::NaiveDateTime;

use crate::domain::{
    DateWindow, EntryContext, HistoryEntry, MatchOutcomeInput, NewMatch, RatingRecord,
    RatingSnapshot,
};
use crate::errors::Result;
use crate::rating::{Entity, MatchId, PlayerId, RatingDelta, RatingType};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Current rating per (entity, rating type)
pub trait RatingStore: Send + Sync {
    fn get_rating(&self, entity: &Entity, rating_type: RatingType) -> Result<Option<RatingRecord>>;

    /// Records of one type, highest rating first, ties by entity
    fn list_ratings(
        &self,
        rating_type: RatingType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RatingRecord>>;

    fn count_ratings(&self, rating_type: RatingType) -> Result<usize>;
}

/// Append-only log of rating changes
pub trait HistoryLedger: Send + Sync {
    /// Entries written for one match, newest first
    fn entries_for_match(&self, match_id: MatchId) -> Result<Vec<HistoryEntry>>;

    /// Rating and entry count from matches strictly before `match_id`
    fn snapshot_before(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        match_id: MatchId,
    ) -> Result<RatingSnapshot>;

    /// Newest entry (by match date, then match id) played at or before `cutoff`
    fn latest_entry_at(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        cutoff: NaiveDateTime,
    ) -> Result<Option<HistoryEntry>>;

    /// Entries for one entity, newest match first
    fn history_page(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryEntry>>;

    fn count_history(&self, entity: &Entity, rating_type: RatingType) -> Result<usize>;

    /// Total entries and entries classified as wins
    fn result_counts(&self, entity: &Entity, rating_type: RatingType) -> Result<(usize, usize)>;

    /// All entries of a type played inside the window, oldest first
    fn entries_in_window(
        &self,
        rating_type: RatingType,
        window: &DateWindow,
    ) -> Result<Vec<HistoryEntry>>;
}

/// Operations that touch both the rating record and the ledger atomically
pub trait LedgerStore: RatingStore + HistoryLedger {
    /// Reads the snapshot before `context.match_id`, lets `compute` pick the
    /// new rating, then writes the entry and refreshes the record in one
    /// transaction. Updates of the same (entity, type) never interleave.
    /// A second entry for the same (match, entity, type) is rejected.
    fn apply_update(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        context: &EntryContext,
        default_rating: i32,
        compute: &dyn Fn(RatingSnapshot) -> RatingDelta,
    ) -> Result<HistoryEntry>;

    /// Deletes the entry and restores the record. When the entry was the
    /// entity's newest, the record goes back to its `rating_before`;
    /// otherwise it keeps tracking the newest remaining entry.
    /// Returns false when the entry was already gone.
    fn revert_entry(&self, entry: &HistoryEntry) -> Result<bool>;

    /// Drops every rating record and ledger entry
    fn clear_ratings(&self) -> Result<()>;
}

/// The match source the engine reads from and the workflows write to
pub trait MatchStore: Send + Sync {
    fn get_match(&self, match_id: MatchId) -> Result<Option<MatchOutcomeInput>>;

    fn insert_match(&self, new_match: &NewMatch) -> Result<MatchId>;

    fn update_match(&self, match_id: MatchId, new_match: &NewMatch) -> Result<()>;

    fn delete_match(&self, match_id: MatchId) -> Result<()>;

    /// Ids of matches after `after`, ascending
    fn match_ids_after(&self, after: MatchId) -> Result<Vec<MatchId>>;

    fn all_match_ids(&self) -> Result<Vec<MatchId>> {
        self.match_ids_after(MatchId::MIN)
    }

    /// Ids of matches after `after` with any of `players`, ascending
    fn matches_involving_after(&self, players: &[PlayerId], after: MatchId) -> Result<Vec<MatchId>>;
}
