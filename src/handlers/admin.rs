// src/handlers/admin.rs

//! Teacher question management: browse, create, generate, upload scans,
//! edit, re-upload assets and delete.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    ai::GenerationPrompt,
    error::AppError,
    handlers::{
        assets::{asset_status, blob_or_placeholder},
        questions::selected_question,
    },
    models::question::{
        AssetKind, CreateQuestionRequest, Difficulty, GenerateQuestionRequest, NewQuestion, Question,
        QuestionFilter, QuestionSource, ScanMetadata, TeacherQuestion, UpdateQuestionRequest,
        non_empty,
    },
    state::AppState,
    storage::{BlobStore, delete_quietly, question_asset_path},
    utils::{
        imaging::{ScanImage, sniff_scan},
        render::render_markdown,
    },
};

/// Builds the teacher view of a question, checking that its images exist.
async fn teacher_question(state: &AppState, question: Question) -> TeacherQuestion {
    let question_image =
        asset_status(state.blobs.as_ref(), question.asset_path(AssetKind::Question)).await;
    let mark_scheme_image =
        asset_status(state.blobs.as_ref(), question.asset_path(AssetKind::MarkScheme)).await;

    TeacherQuestion {
        question_html: question.question_text.as_deref().map(render_markdown),
        mark_scheme_html: question.mark_scheme_text.as_deref().map(render_markdown),
        question_image,
        mark_scheme_image,
        question,
    }
}

/// Lists full question records, including mark schemes.
pub async fn list_questions(
    State(state): State<AppState>,
    Query(filter): Query<QuestionFilter>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.db.list_questions(&filter).await?))
}

/// Full record plus rendered text and asset health.
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = selected_question(&state, id).await?;
    Ok(Json(teacher_question(&state, question).await))
}

/// Creates a question typed in by the teacher.
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let new = NewQuestion {
        source: QuestionSource::Manual,
        title: payload.title.trim().to_string(),
        assignment: non_empty(payload.assignment),
        subject: payload.subject,
        topic: payload.topic,
        difficulty: payload.difficulty,
        max_marks: payload.max_marks,
        question_text: non_empty(Some(payload.question_text)),
        mark_scheme_text: non_empty(payload.mark_scheme_text),
        question_image_path: None,
        mark_scheme_image_path: None,
    };
    new.check_content()?;

    let question = state.db.insert_question(new).await?;
    tracing::info!("Created manual question {}", question.id);

    Ok((StatusCode::CREATED, Json(question)))
}

/// Asks the model for a question on a topic and stores it.
pub async fn generate_question(
    State(state): State<AppState>,
    Json(payload): Json<GenerateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let prompt = GenerationPrompt {
        subject: payload.subject.clone(),
        topic: payload.topic.clone(),
        difficulty: payload.difficulty,
        max_marks: payload.max_marks,
    };
    let generated = state.examiner.generate_question(&prompt).await?;

    let new = NewQuestion {
        source: QuestionSource::Ai,
        title: generated.title,
        assignment: non_empty(payload.assignment),
        subject: payload.subject,
        topic: payload.topic,
        difficulty: payload.difficulty,
        max_marks: generated.max_marks,
        question_text: Some(generated.question_text),
        mark_scheme_text: Some(generated.mark_scheme),
        question_image_path: None,
        mark_scheme_image_path: None,
    };
    new.check_content()?;

    let question = state.db.insert_question(new).await?;
    tracing::info!(
        "Generated question {} on '{}' with {}",
        question.id,
        question.topic,
        state.examiner.model_name()
    );

    Ok((StatusCode::CREATED, Json(teacher_question(&state, question).await)))
}

struct ScanForm {
    meta: ScanMetadata,
    question_image: Option<Vec<u8>>,
    mark_scheme_image: Option<Vec<u8>>,
}

async fn read_scan_form(mut multipart: Multipart) -> Result<ScanForm, AppError> {
    let mut form = ScanForm {
        meta: ScanMetadata::default(),
        question_image: None,
        mark_scheme_image: None,
    };

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "question_image" => form.question_image = Some(field.bytes().await?.to_vec()),
            "mark_scheme_image" => form.mark_scheme_image = Some(field.bytes().await?.to_vec()),
            "title" => form.meta.title = field.text().await?.trim().to_string(),
            "assignment" => form.meta.assignment = non_empty(Some(field.text().await?)),
            "subject" => form.meta.subject = field.text().await?.trim().to_string(),
            "topic" => form.meta.topic = field.text().await?.trim().to_string(),
            "difficulty" => form.meta.difficulty = Some(field.text().await?.trim().parse()?),
            "max_marks" => {
                form.meta.max_marks = field.text().await?.trim().parse().map_err(|_| {
                    AppError::BadRequest("max_marks must be a whole number".to_string())
                })?
            }
            "mark_scheme_text" => form.meta.mark_scheme_text = non_empty(Some(field.text().await?)),
            other => tracing::debug!("Ignoring unexpected form field '{}'", other),
        }
    }

    Ok(form)
}

fn required_scan(bytes: Option<Vec<u8>>, label: &str) -> Result<ScanImage, AppError> {
    match bytes {
        Some(bytes) if !bytes.is_empty() => sniff_scan(bytes),
        _ => Err(AppError::BadRequest(format!("{} is required", label))),
    }
}

/// Uploads a question scan and its mark-scheme scan, then records the question.
///
/// Either both blobs and the row are written, or the blobs are removed again.
pub async fn upload_scan(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_scan_form(multipart).await?;
    form.meta.validate()?;

    let question_scan = required_scan(form.question_image, AssetKind::Question.label())?;
    let mark_scheme_scan = required_scan(form.mark_scheme_image, AssetKind::MarkScheme.label())?;

    let folder = Uuid::new_v4();
    let question_path = question_asset_path(folder, AssetKind::Question, question_scan.extension);
    let mark_scheme_path =
        question_asset_path(folder, AssetKind::MarkScheme, mark_scheme_scan.extension);

    let blobs = state.blobs.as_ref();
    blobs
        .put(&question_path, question_scan.bytes, question_scan.content_type)
        .await?;
    if let Err(e) = blobs
        .put(
            &mark_scheme_path,
            mark_scheme_scan.bytes,
            mark_scheme_scan.content_type,
        )
        .await
    {
        delete_quietly(blobs, &question_path).await;
        return Err(e);
    }

    let meta = form.meta;
    let new = NewQuestion {
        source: QuestionSource::Scan,
        title: meta.title,
        assignment: meta.assignment,
        subject: meta.subject,
        topic: meta.topic,
        difficulty: meta.difficulty.unwrap_or(Difficulty::Medium),
        max_marks: meta.max_marks,
        question_text: None,
        mark_scheme_text: meta.mark_scheme_text,
        question_image_path: Some(question_path.clone()),
        mark_scheme_image_path: Some(mark_scheme_path.clone()),
    };

    let inserted = match new.check_content() {
        Ok(()) => state.db.insert_question(new).await,
        Err(e) => Err(e),
    };
    let question = match inserted {
        Ok(question) => question,
        Err(e) => {
            delete_quietly(blobs, &question_path).await;
            delete_quietly(blobs, &mark_scheme_path).await;
            return Err(e);
        }
    };

    tracing::info!("Uploaded scanned question {} ({})", question.id, question_path);
    Ok((StatusCode::CREATED, Json(teacher_question(&state, question).await)))
}

/// Edits question fields.
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if payload.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let existing = selected_question(&state, id).await?;
    if existing.source.is_text()
        && payload
            .question_text
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
    {
        return Err(AppError::BadRequest(
            "A text question needs question text".to_string(),
        ));
    }

    let question = state
        .db
        .update_question(id, &payload)
        .await?
        .ok_or_else(|| AppError::StaleSelection(format!("Question {} is no longer available", id)))?;

    Ok(Json(teacher_question(&state, question).await))
}

async fn read_single_file(mut multipart: Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") || field.file_name().is_some() {
            let bytes = field.bytes().await?;
            if !bytes.is_empty() {
                return Ok(bytes.to_vec());
            }
        }
    }
    Err(AppError::BadRequest("An image file is required".to_string()))
}

/// Replaces (or adds) the question or mark-scheme image of a question.
/// Used to recover from a missing asset.
pub async fn replace_asset(
    State(state): State<AppState>,
    Path((id, kind)): Path<(i64, String)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let kind = AssetKind::from_segment(&kind)
        .ok_or_else(|| AppError::NotFound(format!("Unknown asset kind '{}'", kind)))?;

    let existing = selected_question(&state, id).await?;
    let scan = sniff_scan(read_single_file(multipart).await?)?;

    let path = question_asset_path(Uuid::new_v4(), kind, scan.extension);
    let blobs: &dyn BlobStore = state.blobs.as_ref();
    blobs.put(&path, scan.bytes, scan.content_type).await?;

    let question = match state.db.set_asset_path(id, kind, &path).await {
        Ok(Some(question)) => question,
        Ok(None) => {
            delete_quietly(blobs, &path).await;
            return Err(AppError::StaleSelection(format!(
                "Question {} is no longer available",
                id
            )));
        }
        Err(e) => {
            delete_quietly(blobs, &path).await;
            return Err(e);
        }
    };

    if let Some(old) = existing.asset_path(kind) {
        if old != path {
            delete_quietly(blobs, old).await;
        }
    }

    tracing::info!("Replaced {} of question {}", kind.label(), id);
    Ok(Json(teacher_question(&state, question).await))
}

/// Serves the mark-scheme scan (teachers only), or a placeholder.
pub async fn mark_scheme_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let question = selected_question(&state, id).await?;
    let kind = AssetKind::MarkScheme;
    Ok(blob_or_placeholder(state.blobs.as_ref(), question.asset_path(kind), kind.label()).await)
}

/// Deletes a question and its images. Questions with attempts are kept.
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = state
        .db
        .get_question(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    if !state.db.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    for kind in [AssetKind::Question, AssetKind::MarkScheme] {
        if let Some(path) = question.asset_path(kind) {
            delete_quietly(state.blobs.as_ref(), path).await;
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
