use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use crate::api::models::{history_entity, HistoryItem, PaginatedResponse};
use crate::api::parsers::pagination::page_request;
use crate::domain::{HistoryEntry, Page};
use crate::rating::{PlayerId, RatingType};
use super::{error_response, parse_rating_type, AppState, PageParams};

pub async fn get_player_history(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<PlayerId>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let rating_type = match parse_rating_type(params.rating_type.as_deref()) {
        Ok(t) => t,
        Err(response) => return response,
    };
    history_response(&state, player_id, None, rating_type, &params)
}

pub async fn get_pair_history(
    State(state): State<Arc<AppState>>,
    Path((first, second)): Path<(PlayerId, PlayerId)>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    history_response(&state, first, Some(second), RatingType::Pair, &params)
}

fn history_response(
    state: &AppState,
    player_id: PlayerId,
    partner_id: Option<PlayerId>,
    rating_type: RatingType,
    params: &PageParams,
) -> Response {
    let request = page_request(params.page, params.page_size, &state.config.server);
    let page = history_entity(player_id, partner_id)
        .and_then(|entity| state.engine.history(&entity, rating_type, request));

    match page {
        Ok(page) => Json(PaginatedResponse::from_page(page, HistoryItem::from)).into_response(),
        Err(e) if e.is_empty_answer() => {
            let empty = Page::<HistoryEntry>::empty(request.page, request.page_size);
            Json(PaginatedResponse::from_page(empty, HistoryItem::from)).into_response()
        }
        Err(e) => error_response(e),
    }
}
