// src/ai/mod.rs

//! Language-model calls: writing questions and marking attempts.

pub mod openai;
pub mod parse;
pub mod prompt;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{attempt::MarkResult, question::Difficulty},
};

pub use openai::OpenAiExaminer;

/// An image handed to the model, already encoded.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct GenerationPrompt {
    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub max_marks: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuestion {
    pub title: String,
    pub question_text: String,
    pub mark_scheme: String,
    pub max_marks: i32,
}

/// Everything the examiner sees for one submission.
#[derive(Debug, Clone, Default)]
pub struct MarkingRequest {
    pub question_text: Option<String>,
    pub question_image: Option<ImageInput>,
    pub mark_scheme_text: Option<String>,
    pub mark_scheme_image: Option<ImageInput>,
    pub max_marks: i32,
    pub answer_text: Option<String>,
    /// Flattened canvas PNG.
    pub drawing: Option<ImageInput>,
}

#[async_trait]
pub trait Examiner: Send + Sync {
    /// Name recorded on each attempt.
    fn model_name(&self) -> &str;

    async fn generate_question(
        &self,
        prompt: &GenerationPrompt,
    ) -> Result<GeneratedQuestion, AppError>;

    /// Exactly one model call per invocation; callers guard against repeats.
    async fn mark_attempt(&self, request: &MarkingRequest) -> Result<MarkResult, AppError>;
}

/// Used when no API key is configured.
pub struct DisabledExaminer;

#[async_trait]
impl Examiner for DisabledExaminer {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate_question(
        &self,
        _prompt: &GenerationPrompt,
    ) -> Result<GeneratedQuestion, AppError> {
        Err(AppError::Unavailable(
            "AI question generation is not configured".to_string(),
        ))
    }

    async fn mark_attempt(&self, _request: &MarkingRequest) -> Result<MarkResult, AppError> {
        Err(AppError::Unavailable("AI marking is not configured".to_string()))
    }
}
