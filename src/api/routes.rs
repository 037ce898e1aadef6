use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use crate::api::handlers::{
    admin::admin_rebuild,
    history::{get_pair_history, get_player_history},
    leaderboard::{get_leaderboard, get_smart_leaderboard},
    matches::{create_match, delete_match, update_match},
    AppState,
};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/leaderboard/smart", get(get_smart_leaderboard))
        .route("/api/history/player/:id", get(get_player_history))
        .route("/api/history/pair/:first/:second", get(get_pair_history))
        .route("/api/matches", post(create_match))
        .route("/api/matches/:id", put(update_match).delete(delete_match))
        .route("/api/admin/rebuild", post(admin_rebuild))
        .with_state(state)
}
