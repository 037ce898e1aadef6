use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{parse_date, HistoryEntry, NewMatch, Page};
use crate::errors::{RatingError, Result};
use crate::rating::{Entity, MatchKind, PlayerId, Team};
use crate::services::leaderboard::LeaderboardRow;
use crate::services::recalculation::{
    CreateReport, DeleteReport, EditReport, RecalculationReport,
};
use crate::services::smart_score::SmartScoreRow;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> PaginatedResponse<T> {
    pub fn from_page<S>(page: Page<S>, convert: impl Fn(S) -> T) -> Self {
        Self {
            items: page.items.into_iter().map(convert).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardItem {
    pub rank: usize,
    pub player_id: PlayerId,
    pub partner_id: Option<PlayerId>,
    pub rating: i32,
    pub matches_played: usize,
    pub winrate: f64,
}

impl From<LeaderboardRow> for LeaderboardItem {
    fn from(row: LeaderboardRow) -> Self {
        Self {
            rank: row.rank,
            player_id: row.entity.player_id(),
            partner_id: row.entity.partner_id(),
            rating: row.rating,
            matches_played: row.matches_played,
            winrate: row.winrate,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartLeaderboardItem {
    pub rank: usize,
    pub player_id: PlayerId,
    pub partner_id: Option<PlayerId>,
    pub matches_count: usize,
    pub winrate: f64,
    pub consistency: f64,
    pub activity_score: f64,
    pub historical_rating: i32,
    pub smart_score: f64,
}

impl SmartLeaderboardItem {
    pub fn new(rank: usize, row: SmartScoreRow) -> Self {
        Self {
            rank,
            player_id: row.entity.player_id(),
            partner_id: row.entity.partner_id(),
            matches_count: row.matches_count,
            winrate: row.winrate,
            consistency: row.consistency,
            activity_score: row.activity_score,
            historical_rating: row.historical_rating,
            smart_score: row.smart_score,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub match_id: i64,
    pub rating_before: i32,
    pub rating_after: i32,
    pub rating_change: i32,
    pub result: String,
    pub penalty_result: i32,
    pub goal_bonus: i32,
    pub played_at: String,
}

impl From<HistoryEntry> for HistoryItem {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            match_id: entry.match_id,
            rating_before: entry.rating_before,
            rating_after: entry.rating_after,
            rating_change: entry.rating_change,
            result: entry.display_result(),
            penalty_result: entry.penalty_result.as_i32(),
            goal_bonus: entry.goal_bonus,
            played_at: entry.played_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub team_a_goals: i32,
    pub team_b_goals: i32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub went_to_penalties: bool,
    pub penalty_winner: Option<String>,
    pub played_at: Option<String>,
    pub created_by: Option<PlayerId>,
}

impl MatchRequest {
    pub fn into_new_match(self) -> Result<NewMatch> {
        let kind: MatchKind = self.kind.parse()?;
        let penalty_winner = self
            .penalty_winner
            .as_deref()
            .map(str::parse::<Team>)
            .transpose()?;
        let played_at: NaiveDateTime = match self.played_at.as_deref() {
            Some(value) => parse_date(value, false)?,
            None => Utc::now().naive_utc(),
        };

        NewMatch {
            team_a: self.team_a,
            team_b: self.team_b,
            team_a_goals: self.team_a_goals,
            team_b_goals: self.team_b_goals,
            kind,
            went_to_penalties: self.went_to_penalties,
            penalty_winner,
            played_at,
            created_by: self.created_by,
        }
        .normalized()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMatch {
    pub match_id: i64,
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationSummary {
    pub recalculated: usize,
    pub failed: Vec<FailedMatch>,
}

impl From<RecalculationReport> for RecalculationSummary {
    fn from(report: RecalculationReport) -> Self {
        Self {
            recalculated: report.recalculated,
            failed: report
                .failed
                .into_iter()
                .map(|f| FailedMatch {
                    match_id: f.match_id,
                    message: f.message,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchWriteResponse {
    pub match_id: i64,
    pub entries_written: usize,
    pub entries_reverted: usize,
    pub processing_error: Option<String>,
    pub recalculation: Option<RecalculationSummary>,
}

impl From<CreateReport> for MatchWriteResponse {
    fn from(report: CreateReport) -> Self {
        Self {
            match_id: report.match_id,
            entries_written: report.processed.map_or(0, |p| p.entries.len()),
            entries_reverted: 0,
            processing_error: report.processing_error,
            recalculation: None,
        }
    }
}

impl From<EditReport> for MatchWriteResponse {
    fn from(report: EditReport) -> Self {
        Self {
            match_id: report.match_id,
            entries_written: report.processed.map_or(0, |p| p.entries.len()),
            entries_reverted: report.reverted.reverted,
            processing_error: report.processing_error,
            recalculation: Some(report.recalculation.into()),
        }
    }
}

impl From<DeleteReport> for MatchWriteResponse {
    fn from(report: DeleteReport) -> Self {
        Self {
            match_id: report.match_id,
            entries_written: 0,
            entries_reverted: report.reverted.reverted,
            processing_error: None,
            recalculation: Some(report.recalculation.into()),
        }
    }
}

/// Entity addressed by a history route
pub fn history_entity(player_id: PlayerId, partner_id: Option<PlayerId>) -> Result<Entity> {
    Entity::from_columns(player_id, partner_id).map_err(|e| match e {
        RatingError::InvalidMatchShape(msg) => RatingError::NotFound(msg),
        other => other,
    })
}
