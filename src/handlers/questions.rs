// src/handlers/questions.rs

//! Student-facing question browsing.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    handlers::assets::blob_or_placeholder,
    models::question::{AssetKind, PublicQuestion, Question, QuestionFilter},
    state::AppState,
};

/// Lists the class sets a student can pick from.
pub async fn list_class_sets(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.config.class_sets.clone())
}

/// Lists assignment labels with their question counts.
pub async fn list_assignments(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.db.list_assignments().await?))
}

/// Lists questions without mark schemes.
pub async fn list_questions(
    State(state): State<AppState>,
    Query(filter): Query<QuestionFilter>,
) -> Result<impl IntoResponse, AppError> {
    let questions = state.db.list_questions(&filter).await?;
    let public: Vec<PublicQuestion> = questions.iter().map(PublicQuestion::from).collect();
    Ok(Json(public))
}

/// Loads a question the user selected, or tells the UI to reset its selection.
pub(crate) async fn selected_question(state: &AppState, id: i64) -> Result<Question, AppError> {
    state.db.get_question(id).await?.ok_or_else(|| {
        AppError::StaleSelection(format!("Question {} is no longer available", id))
    })
}

pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = selected_question(&state, id).await?;
    Ok(Json(PublicQuestion::from(&question)))
}

/// Serves the question scan, or a placeholder if it cannot be loaded.
pub async fn question_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let question = selected_question(&state, id).await?;
    let kind = AssetKind::Question;
    Ok(blob_or_placeholder(state.blobs.as_ref(), question.asset_path(kind), kind.label()).await)
}
