// src/handlers/dashboard.rs

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::attempt::{AnalyticsResponse, AttemptFilter},
    state::AppState,
};

/// Lists marked attempts, newest first.
pub async fn list_attempts(
    State(state): State<AppState>,
    Query(filter): Query<AttemptFilter>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.db.list_attempts(&filter).await?))
}

/// Average score per class set and per question.
pub async fn analytics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let by_class_set = state.db.class_set_averages().await?;
    let by_question = state.db.question_averages().await?;

    Ok(Json(AnalyticsResponse {
        by_class_set,
        by_question,
    }))
}
