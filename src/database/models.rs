use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct DbRating {
    pub entity_key: String,
    pub rating_type: String,
    pub player_id: i64,
    pub partner_id: Option<i64>,
    pub rating: i32,
    pub last_updated: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct DbHistoryEntry {
    pub id: i64,
    pub match_id: i64,
    pub entity_key: String,
    pub rating_type: String,
    pub player_id: i64,
    pub partner_id: Option<i64>,
    pub rating_before: i32,
    pub rating_after: i32,
    pub rating_change: i32,
    pub result: String,
    pub penalty_result: i32,
    pub goal_bonus: i32,
    pub played_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct DbMatch {
    pub id: i64,
    pub team_a_goals: i32,
    pub team_b_goals: i32,
    pub kind: String,
    pub went_to_penalties: bool,
    pub penalty_winner: Option<String>,
    pub played_at: NaiveDateTime,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct DbMatchPlayer {
    pub match_id: i64,
    pub player_id: i64,
    pub team: String,
    pub position: i32,
}
