use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::{RatingError, Result};
use crate::rating::{
    Entity, MatchId, MatchKind, MatchResult, PenaltyResult, PlayerId, RatingType, RatingValue,
    Team,
};

/// Read-only snapshot of a stored match, as handed to the rating engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcomeInput {
    pub id: MatchId,
    pub team_a_goals: i32,
    pub team_b_goals: i32,
    pub kind: MatchKind,
    pub went_to_penalties: bool,
    pub penalty_winner: Option<Team>,
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub played_at: NaiveDateTime,
    pub created_by: Option<PlayerId>,
}

impl MatchOutcomeInput {
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.team_a.iter().chain(self.team_b.iter()).copied()
    }

    pub fn team_of(&self, player_id: PlayerId) -> Option<Team> {
        if self.team_a.contains(&player_id) {
            Some(Team::A)
        } else if self.team_b.contains(&player_id) {
            Some(Team::B)
        } else {
            None
        }
    }

    pub fn involves_any(&self, players: &HashSet<PlayerId>) -> bool {
        self.players().any(|p| players.contains(&p))
    }

    /// Team sizes must match the kind before any rating is touched
    pub fn ensure_shape(&self) -> Result<()> {
        let size = self.kind.team_size();
        if self.team_a.len() != size || self.team_b.len() != size {
            return Err(RatingError::InvalidMatchShape(format!(
                "match {} is {} but has {} vs {} players",
                self.id,
                self.kind.as_str(),
                self.team_a.len(),
                self.team_b.len()
            )));
        }
        Ok(())
    }
}

/// Match data as submitted for creation or edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMatch {
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub team_a_goals: i32,
    pub team_b_goals: i32,
    pub kind: MatchKind,
    pub went_to_penalties: bool,
    pub penalty_winner: Option<Team>,
    pub played_at: NaiveDateTime,
    pub created_by: Option<PlayerId>,
}

impl NewMatch {
    /// Validates team composition and normalizes the penalty fields
    pub fn normalized(mut self) -> Result<Self> {
        self.validate_teams()?;

        if self.team_a_goals < 0 || self.team_b_goals < 0 {
            return Err(RatingError::InvalidMatchShape(
                "goals must be non-negative".to_string(),
            ));
        }

        if self.team_a_goals != self.team_b_goals {
            self.went_to_penalties = false;
            self.penalty_winner = None;
        } else if !self.went_to_penalties {
            self.penalty_winner = None;
        } else if self.penalty_winner.is_none() {
            return Err(RatingError::InvalidMatchShape(
                "a shoot-out needs a penalty winner".to_string(),
            ));
        }

        Ok(self)
    }

    fn validate_teams(&self) -> Result<()> {
        if self.team_a.is_empty() || self.team_b.is_empty() {
            return Err(RatingError::InvalidMatchShape(
                "both teams need at least one player".to_string(),
            ));
        }

        let size = self.kind.team_size();
        if self.team_a.len() != size || self.team_b.len() != size {
            return Err(RatingError::InvalidMatchShape(format!(
                "{} matches need exactly {} player(s) per team",
                self.kind.as_str(),
                size
            )));
        }

        let mut seen = HashSet::new();
        if !self.team_a.iter().chain(&self.team_b).all(|p| seen.insert(*p)) {
            return Err(RatingError::InvalidMatchShape(
                "a player cannot appear twice in a match".to_string(),
            ));
        }

        Ok(())
    }

    pub fn into_input(self, id: MatchId) -> MatchOutcomeInput {
        MatchOutcomeInput {
            id,
            team_a_goals: self.team_a_goals,
            team_b_goals: self.team_b_goals,
            kind: self.kind,
            went_to_penalties: self.went_to_penalties,
            penalty_winner: self.penalty_winner,
            team_a: self.team_a,
            team_b: self.team_b,
            played_at: self.played_at,
            created_by: self.created_by,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRecord {
    pub entity: Entity,
    pub rating_type: RatingType,
    pub rating: RatingValue,
    pub last_updated: NaiveDateTime,
}

/// One immutable rating change in the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub match_id: MatchId,
    pub entity: Entity,
    pub rating_type: RatingType,
    pub rating_before: RatingValue,
    pub rating_after: RatingValue,
    pub rating_change: RatingValue,
    pub result: MatchResult,
    pub penalty_result: PenaltyResult,
    pub goal_bonus: i32,
    pub played_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl HistoryEntry {
    pub fn is_outright_win(&self) -> bool {
        self.result == MatchResult::Win && self.penalty_result == PenaltyResult::NotApplicable
    }

    /// Label shown to users, marking shoot-out results
    pub fn display_result(&self) -> String {
        match self.penalty_result {
            PenaltyResult::NotApplicable => self.result.as_str().to_string(),
            _ => format!("{} (pen)", self.result.as_str()),
        }
    }
}

/// What the store knows about an entity right before a given match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingSnapshot {
    /// Rating after the entity's latest earlier match, if any
    pub prior_rating: Option<RatingValue>,
    /// Ledger entries from earlier matches
    pub prior_entries: usize,
}

/// Per-entry data that does not depend on the rating read
#[derive(Debug, Clone, PartialEq)]
pub struct EntryContext {
    pub match_id: MatchId,
    pub played_at: NaiveDateTime,
    pub result: MatchResult,
    pub penalty_result: PenaltyResult,
    pub goal_bonus: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn empty(page: usize, page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            page_size,
        }
    }
}

/// 1-based page number and size turned into limit/offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }

    pub fn limit(&self) -> usize {
        self.page_size
    }

    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset())
            .take(self.limit())
            .cloned()
            .collect()
    }

    pub fn wrap<T>(&self, items: Vec<T>, total: usize) -> Page<T> {
        Page {
            items,
            total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn new_match(team_a: Vec<PlayerId>, team_b: Vec<PlayerId>, kind: MatchKind) -> NewMatch {
        NewMatch {
            team_a,
            team_b,
            team_a_goals: 2,
            team_b_goals: 2,
            kind,
            went_to_penalties: true,
            penalty_winner: Some(Team::B),
            played_at: noon(),
            created_by: Some(1),
        }
    }

    #[test]
    fn test_normalization_clears_penalties_when_goals_differ() {
        let mut m = new_match(vec![1], vec![2], MatchKind::OneVsOne);
        m.team_a_goals = 3;
        let m = m.normalized().unwrap();
        assert!(!m.went_to_penalties);
        assert_eq!(m.penalty_winner, None);
    }

    #[test]
    fn test_normalization_requires_penalty_winner() {
        let mut m = new_match(vec![1], vec![2], MatchKind::OneVsOne);
        m.penalty_winner = None;
        assert!(matches!(m.normalized(), Err(RatingError::InvalidMatchShape(_))));
    }

    #[test]
    fn test_team_size_must_match_kind() {
        let m = new_match(vec![1, 3], vec![2], MatchKind::TwoVsTwo);
        assert!(m.normalized().is_err());
        let m = new_match(vec![1, 3], vec![2, 4], MatchKind::OneVsOne);
        assert!(m.normalized().is_err());
    }

    #[test]
    fn test_player_cannot_be_on_both_teams() {
        let m = new_match(vec![1, 2], vec![2, 4], MatchKind::TwoVsTwo);
        assert!(m.normalized().is_err());
    }

    #[test]
    fn test_page_request_offsets() {
        let req = PageRequest::new(0, 10);
        assert_eq!(req.page, 1);
        assert_eq!(req.offset(), 0);
        let req = PageRequest::new(3, 10);
        assert_eq!(req.offset(), 20);
        assert_eq!(req.slice(&(0..25).collect::<Vec<_>>()), vec![20, 21, 22, 23, 24]);
    }
}
