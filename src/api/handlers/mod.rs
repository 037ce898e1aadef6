use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::errors::RatingError;
use crate::rating::RatingType;
use crate::services::RatingEngine;

pub mod admin;
pub mod history;
pub mod leaderboard;
pub mod matches;

pub struct AppState {
    pub engine: Arc<RatingEngine>,
    pub config: AppConfig,
}

#[derive(Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub rating_type: Option<String>,
}

#[derive(Deserialize)]
pub struct SmartParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub rating_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Missing means global
fn parse_rating_type(value: Option<&str>) -> Result<RatingType, Response> {
    value
        .unwrap_or("global")
        .parse()
        .map_err(error_response)
}

/// Engine writes hold the replay lock and block on the store
async fn run_blocking<T, F>(work: F) -> Result<T, RatingError>
where
    F: FnOnce() -> Result<T, RatingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RatingError::TransientStore(format!("rating task failed: {}", e)))?
}

fn error_response(err: RatingError) -> Response {
    let status = match &err {
        RatingError::NotFound(_) => StatusCode::NOT_FOUND,
        RatingError::InvalidRatingType(_)
        | RatingError::InvalidMatchShape(_)
        | RatingError::InvalidDate(_) => StatusCode::BAD_REQUEST,
        RatingError::TransientStore(_) => {
            log::error!("Request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string()).into_response()
}
