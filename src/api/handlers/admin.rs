use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::AppState;

pub async fn admin_rebuild(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let engine = state.engine.clone();

    tokio::task::spawn_blocking(move || {
        log::info!("Admin triggered rebuild started");
        match engine.rebuild_all() {
            Ok(report) if report.failed.is_empty() => log::info!(
                "Admin triggered rebuild completed: {} matches rated",
                report.recalculated
            ),
            Ok(report) => log::warn!(
                "Admin triggered rebuild completed with {} failed matches",
                report.failed.len()
            ),
            Err(e) => log::error!("Rebuild failed: {:?}", e),
        }
    });

    (StatusCode::ACCEPTED, "Rebuild triggered").into_response()
}
