// src/handlers/attempts.rs

//! Student submissions: marking, replay and viewing.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    ai::{ImageInput, MarkingRequest},
    error::AppError,
    handlers::{assets::blob_or_placeholder, questions::selected_question},
    models::{
        attempt::{Attempt, AttemptResponse, NewAttempt, SubmitAttemptRequest},
        question::{AssetKind, Question, is_blank, non_empty},
    },
    state::AppState,
    storage::{BlobStore, delete_quietly, drawing_path},
    utils::imaging::{decode_data_url, flatten_drawing},
};

/// Loads a stored image for the marking prompt. A missing object is logged
/// and skipped.
async fn load_image(blobs: &dyn BlobStore, path: Option<&str>) -> Result<Option<ImageInput>, AppError> {
    let Some(path) = path else {
        return Ok(None);
    };
    match blobs.get(path).await? {
        Some(blob) => Ok(Some(ImageInput {
            bytes: blob.bytes,
            content_type: blob.content_type,
        })),
        None => {
            tracing::warn!("Blob {} is missing; marking without it", path);
            Ok(None)
        }
    }
}

async fn marking_material(state: &AppState, question: &Question) -> Result<MarkingRequest, AppError> {
    let blobs = state.blobs.as_ref();
    let question_image = load_image(blobs, question.asset_path(AssetKind::Question)).await?;
    let mark_scheme_image = load_image(blobs, question.asset_path(AssetKind::MarkScheme)).await?;

    if question_image.is_none() && is_blank(question.question_text.as_deref()) {
        return Err(AppError::MissingAsset(format!(
            "The image for question {} is missing. Ask your teacher to re-upload it.",
            question.id
        )));
    }

    Ok(MarkingRequest {
        question_text: question.question_text.clone(),
        question_image,
        mark_scheme_text: question.mark_scheme_text.clone(),
        mark_scheme_image,
        max_marks: question.max_marks,
        ..Default::default()
    })
}

/// Returns the stored result for a repeated submission id. The id is bound to
/// the question it was first marked against.
fn replay(existing: &Attempt, payload: &SubmitAttemptRequest) -> Result<Response, AppError> {
    if existing.question_id != payload.question_id {
        return Err(AppError::Conflict(format!(
            "Submission {} was already used for another question",
            existing.submission_id
        )));
    }
    Ok(Json(AttemptResponse::from_attempt(existing, true)).into_response())
}

/// Marks a student's answer once per submission id.
///
/// A repeated submission id returns the stored result without another model
/// call; a duplicate that arrives while the first is still being marked gets
/// `409 Conflict`.
pub async fn submit_attempt(
    State(state): State<AppState>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;
    if !state.config.is_known_class_set(&payload.class_set) {
        return Err(AppError::BadRequest(format!(
            "Unknown class set '{}'",
            payload.class_set
        )));
    }

    let submission_id = payload.submission_id.unwrap_or_else(Uuid::new_v4);

    if let Some(existing) = state.db.find_attempt_by_submission(submission_id).await? {
        tracing::info!("Replaying stored result for submission {}", submission_id);
        return replay(&existing, &payload);
    }

    let Some(_guard) = state.in_flight.try_claim(submission_id) else {
        return Err(AppError::Conflict(
            "This answer is already being marked. Please wait for the result.".to_string(),
        ));
    };

    // Another request may have finished between the lookup and the claim.
    if let Some(existing) = state.db.find_attempt_by_submission(submission_id).await? {
        return replay(&existing, &payload);
    }

    let drawing = match payload.drawing.as_ref().and_then(|d| d.data_url()) {
        Some(data_url) => {
            let bytes = decode_data_url(data_url)?;
            let flattened = tokio::task::spawn_blocking(move || flatten_drawing(&bytes))
                .await
                .map_err(|e| AppError::InternalServerError(format!("Drawing task failed: {}", e)))??;
            (!flattened.blank).then_some(flattened.png)
        }
        None => None,
    };
    let answer_text = non_empty(payload.answer_text.clone());

    if answer_text.is_none() && drawing.is_none() {
        return Err(AppError::BadRequest(
            "Write an answer or draw on the canvas before submitting.".to_string(),
        ));
    }

    let question = selected_question(&state, payload.question_id).await?;

    let mut request = marking_material(&state, &question).await?;
    request.answer_text = answer_text.clone();
    request.drawing = drawing.as_ref().map(|png| ImageInput {
        bytes: png.clone(),
        content_type: "image/png".to_string(),
    });

    let result = state.examiner.mark_attempt(&request).await.map_err(|e| {
        tracing::error!("Marking failed for submission {}: {:?}", submission_id, e);
        e
    })?;

    let stored_drawing = match drawing {
        Some(png) => {
            let path = drawing_path(submission_id);
            state.blobs.put(&path, png, "image/png").await?;
            Some(path)
        }
        None => None,
    };

    let new = NewAttempt {
        submission_id,
        question_id: question.id,
        student_name: payload.student_name(),
        class_set: payload.class_set.trim().to_string(),
        answer_text,
        drawing_path: stored_drawing.clone(),
        marks_awarded: result.marks_awarded,
        max_marks: result.max_marks,
        feedback_summary: result.summary,
        feedback_points: result.feedback_points,
        model: state.examiner.model_name().to_string(),
    };

    let (attempt, created) = match state.db.insert_attempt(new).await {
        Ok(inserted) => inserted,
        Err(e) => {
            if let Some(path) = &stored_drawing {
                delete_quietly(state.blobs.as_ref(), path).await;
            }
            return Err(e);
        }
    };

    if !created {
        return replay(&attempt, &payload);
    }

    tracing::info!(
        "Marked submission {} on question {}: {}/{}",
        submission_id,
        question.id,
        attempt.marks_awarded,
        attempt.max_marks
    );

    Ok((StatusCode::CREATED, Json(AttemptResponse::from_attempt(&attempt, false))).into_response())
}

async fn stored_attempt(
    state: &AppState,
    submission_id: Uuid,
) -> Result<Attempt, AppError> {
    state
        .db
        .find_attempt_by_submission(submission_id)
        .await?
        .ok_or_else(|| AppError::StaleSelection("That submission could not be found".to_string()))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    Path(submission_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = stored_attempt(&state, submission_id).await?;
    Ok(Json(AttemptResponse::from_attempt(&attempt, false)))
}

/// Serves the stored drawing, or a placeholder.
pub async fn attempt_drawing(
    State(state): State<AppState>,
    Path(submission_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let attempt = stored_attempt(&state, submission_id).await?;
    Ok(blob_or_placeholder(state.blobs.as_ref(), attempt.drawing_path.as_deref(), "Drawing").await)
}
