//! Axum Handlers for the REST API
//!
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::{
    models::{CourseOutline, HealthResponse},
    state::AppState,
};

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Outline of the lesson this instance serves.
#[utoipa::path(
    get,
    path = "/api/course",
    responses(
        (status = 200, description = "Course title, modules and steps", body = CourseOutline)
    )
)]
pub async fn get_course(State(state): State<Arc<AppState>>) -> Json<CourseOutline> {
    Json(CourseOutline::from(state.lesson.as_ref()))
}
