use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use crate::api::models::{MatchRequest, MatchWriteResponse};
use crate::rating::MatchId;
use super::{error_response, run_blocking, AppState};

pub async fn create_match(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MatchRequest>,
) -> impl IntoResponse {
    let new_match = match request.into_new_match() {
        Ok(m) => m,
        Err(e) => return error_response(e),
    };

    let engine = state.engine.clone();
    match run_blocking(move || engine.on_match_created(&new_match)).await {
        Ok(report) => (StatusCode::CREATED, Json(MatchWriteResponse::from(report))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn update_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<MatchId>,
    Json(request): Json<MatchRequest>,
) -> impl IntoResponse {
    let edit = match request.into_new_match() {
        Ok(m) => m,
        Err(e) => return error_response(e),
    };

    let engine = state.engine.clone();
    match run_blocking(move || engine.on_match_edited(match_id, &edit)).await {
        Ok(report) => Json(MatchWriteResponse::from(report)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<MatchId>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    match run_blocking(move || engine.on_match_deleted(match_id)).await {
        Ok(report) => Json(MatchWriteResponse::from(report)).into_response(),
        Err(e) => error_response(e),
    }
}
