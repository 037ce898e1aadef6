use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use crate::api::models::{LeaderboardItem, PaginatedResponse, SmartLeaderboardItem};
use crate::api::parsers::pagination::page_request;
use crate::domain::DateWindow;
use super::{error_response, parse_rating_type, AppState, PageParams, SmartParams};

pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let rating_type = match parse_rating_type(params.rating_type.as_deref()) {
        Ok(t) => t,
        Err(response) => return response,
    };
    let request = page_request(params.page, params.page_size, &state.config.server);

    match state.engine.leaderboard(rating_type, request) {
        Ok(page) => Json(PaginatedResponse::from_page(page, LeaderboardItem::from)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_smart_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SmartParams>,
) -> impl IntoResponse {
    let rating_type = match parse_rating_type(params.rating_type.as_deref()) {
        Ok(t) => t,
        Err(response) => return response,
    };

    let (Some(start), Some(end)) = (params.start_date.as_deref(), params.end_date.as_deref()) else {
        return (StatusCode::BAD_REQUEST, "start_date and end_date are required").into_response();
    };
    let window = match DateWindow::parse(start, end) {
        Ok(window) => window,
        Err(e) => return error_response(e),
    };
    let request = page_request(params.page, params.page_size, &state.config.server);

    match state.engine.smart_leaderboard(rating_type, &window, request) {
        Ok(page) => {
            let offset = request.offset();
            let items = page
                .items
                .into_iter()
                .enumerate()
                .map(|(i, row)| SmartLeaderboardItem::new(offset + i + 1, row))
                .collect();
            Json(PaginatedResponse {
                items,
                total: page.total,
                page: page.page,
                page_size: page.page_size,
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}
