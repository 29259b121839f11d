// src/models/question.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Where a question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSource {
    /// Generated by the language model.
    Ai,
    /// Uploaded as a pair of scanned images.
    Scan,
    /// Typed in by a teacher.
    Manual,
}

impl QuestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionSource::Ai => "ai",
            QuestionSource::Scan => "scan",
            QuestionSource::Manual => "manual",
        }
    }

    /// Text-backed questions must always carry `question_text`.
    pub fn is_text(&self) -> bool {
        !matches!(self, QuestionSource::Scan)
    }
}

impl FromStr for QuestionSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(QuestionSource::Ai),
            "scan" => Ok(QuestionSource::Scan),
            "manual" => Ok(QuestionSource::Manual),
            other => Err(AppError::InternalServerError(format!(
                "unknown question source '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for QuestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(AppError::BadRequest(format!(
                "difficulty must be easy, medium or hard (got '{}')",
                other
            ))),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two images attached to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Question,
    MarkScheme,
}

impl AssetKind {
    /// Matches the `{kind}` path segment of the re-upload route.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "question" => Some(AssetKind::Question),
            "mark-scheme" => Some(AssetKind::MarkScheme),
            _ => None,
        }
    }

    /// File stem used inside the question's storage folder.
    pub fn file_stem(&self) -> &'static str {
        match self {
            AssetKind::Question => "question",
            AssetKind::MarkScheme => "mark_scheme",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::Question => "Question image",
            AssetKind::MarkScheme => "Mark scheme image",
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub source: QuestionSource,

    /// Short label shown in the question picker, e.g. "Q1: Forces".
    pub title: String,

    /// Optional assignment the question belongs to.
    pub assignment: Option<String>,

    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub max_marks: i32,

    /// Markdown with `$...$` / `$$...$$` LaTeX.
    pub question_text: Option<String>,
    pub mark_scheme_text: Option<String>,

    /// Object-store paths.
    pub question_image_path: Option<String>,
    pub mark_scheme_image_path: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn asset_path(&self, kind: AssetKind) -> Option<&str> {
        match kind {
            AssetKind::Question => self.question_image_path.as_deref(),
            AssetKind::MarkScheme => self.mark_scheme_image_path.as_deref(),
        }
    }
}

/// Raw row as stored; enums are kept as TEXT columns.
#[derive(Debug, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub source: String,
    pub title: String,
    pub assignment: Option<String>,
    pub subject: String,
    pub topic: String,
    pub difficulty: String,
    pub max_marks: i32,
    pub question_text: Option<String>,
    pub mark_scheme_text: Option<String>,
    pub question_image_path: Option<String>,
    pub mark_scheme_image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            source: row.source.parse()?,
            title: row.title,
            assignment: row.assignment,
            subject: row.subject,
            topic: row.topic,
            difficulty: row
                .difficulty
                .parse()
                .map_err(|e: AppError| AppError::InternalServerError(e.to_string()))?,
            max_marks: row.max_marks,
            question_text: row.question_text,
            mark_scheme_text: row.mark_scheme_text,
            question_image_path: row.question_image_path,
            mark_scheme_image_path: row.mark_scheme_image_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Everything needed to insert a question; ids and timestamps come from the store.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub source: QuestionSource,
    pub title: String,
    pub assignment: Option<String>,
    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub max_marks: i32,
    pub question_text: Option<String>,
    pub mark_scheme_text: Option<String>,
    pub question_image_path: Option<String>,
    pub mark_scheme_image_path: Option<String>,
}

impl NewQuestion {
    /// Checks the per-source content invariant before anything is written.
    pub fn check_content(&self) -> Result<(), AppError> {
        if self.source.is_text() && is_blank(self.question_text.as_deref()) {
            return Err(AppError::BadRequest(
                "A text question needs question text".to_string(),
            ));
        }
        if self.source == QuestionSource::Scan && self.question_image_path.is_none() {
            return Err(AppError::BadRequest(
                "A scanned question needs a question image".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Normalizes an optional label: trims and turns empty strings into `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// DTO for a teacher typing in a question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(max = 120))]
    pub assignment: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub subject: String,
    #[validate(length(min = 1, max = 120))]
    pub topic: String,
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 50))]
    pub max_marks: i32,
    #[validate(length(min = 1, max = 10000))]
    pub question_text: String,
    #[validate(length(max = 10000))]
    pub mark_scheme_text: Option<String>,
}

/// DTO for asking the model to write a question.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuestionRequest {
    #[validate(length(min = 1, max = 60))]
    pub subject: String,
    #[validate(length(min = 1, max = 120))]
    pub topic: String,
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 50))]
    pub max_marks: i32,
    #[validate(length(max = 120))]
    pub assignment: Option<String>,
}

/// Metadata fields of a scanned question, collected from the multipart form.
#[derive(Debug, Default, Validate)]
pub struct ScanMetadata {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(max = 120))]
    pub assignment: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub subject: String,
    #[validate(length(min = 1, max = 120))]
    pub topic: String,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 50))]
    pub max_marks: i32,
    #[validate(length(max = 10000))]
    pub mark_scheme_text: Option<String>,
}

/// DTO for updating a question. Fields are optional.
/// An empty `assignment` or `mark_scheme_text` clears the field.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 120))]
    pub assignment: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 50))]
    pub max_marks: Option<i32>,
    #[validate(length(max = 10000))]
    pub question_text: Option<String>,
    #[validate(length(max = 10000))]
    pub mark_scheme_text: Option<String>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.assignment.is_none()
            && self.subject.is_none()
            && self.topic.is_none()
            && self.difficulty.is_none()
            && self.max_marks.is_none()
            && self.question_text.is_none()
            && self.mark_scheme_text.is_none()
    }
}

/// Filters shared by the student and teacher question lists.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QuestionFilter {
    pub assignment: Option<String>,
    pub subject: Option<String>,
    /// Case-insensitive substring match.
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub source: Option<QuestionSource>,
    /// Case-insensitive search over title and question text.
    pub q: Option<String>,
}

impl QuestionFilter {
    pub fn matches(&self, question: &Question) -> bool {
        fn contains(haystack: &str, needle: &str) -> bool {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }

        if let Some(assignment) = &self.assignment {
            if question.assignment.as_deref() != Some(assignment.as_str()) {
                return false;
            }
        }
        if let Some(subject) = &self.subject {
            if &question.subject != subject {
                return false;
            }
        }
        if let Some(topic) = &self.topic {
            if !contains(&question.topic, topic) {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if question.difficulty != difficulty {
                return false;
            }
        }
        if let Some(source) = self.source {
            if question.source != source {
                return false;
            }
        }
        if let Some(q) = &self.q {
            let in_text = question
                .question_text
                .as_deref()
                .map(|t| contains(t, q))
                .unwrap_or(false);
            if !contains(&question.title, q) && !in_text {
                return false;
            }
        }
        true
    }
}

/// Assignment label with the number of questions in it.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct AssignmentSummary {
    pub assignment: String,
    pub question_count: i64,
}

/// DTO for sending a question to students (no mark scheme).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub source: QuestionSource,
    pub title: String,
    pub assignment: Option<String>,
    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub max_marks: i32,
    pub question_html: Option<String>,
    pub image_url: Option<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            source: q.source,
            title: q.title.clone(),
            assignment: q.assignment.clone(),
            subject: q.subject.clone(),
            topic: q.topic.clone(),
            difficulty: q.difficulty,
            max_marks: q.max_marks,
            question_html: q
                .question_text
                .as_deref()
                .map(crate::utils::render::render_markdown),
            image_url: q
                .question_image_path
                .as_ref()
                .map(|_| format!("/api/questions/{}/image", q.id)),
        }
    }
}

/// Whether a referenced blob can currently be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    /// The question does not reference an image of this kind.
    None,
    Present,
    Missing,
}

/// DTO for the teacher view: the full record, rendered text and asset health.
#[derive(Debug, Serialize)]
pub struct TeacherQuestion {
    #[serde(flatten)]
    pub question: Question,
    pub question_html: Option<String>,
    pub mark_scheme_html: Option<String>,
    pub question_image: AssetStatus,
    pub mark_scheme_image: AssetStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Question {
        Question {
            id: 1,
            source: QuestionSource::Ai,
            title: "Q1: Forces".into(),
            assignment: Some("Week 3".into()),
            subject: "Physics".into(),
            topic: "Newton's laws".into(),
            difficulty: Difficulty::Medium,
            max_marks: 3,
            question_text: Some("A 5kg box is pushed with a 20N force.".into()),
            mark_scheme_text: Some("a = 3.2".into()),
            question_image_path: None,
            mark_scheme_image_path: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn filter_matches_topic_case_insensitively() {
        let filter = QuestionFilter {
            topic: Some("newton".into()),
            ..Default::default()
        };
        assert!(filter.matches(&sample()));
    }

    #[test]
    fn filter_rejects_other_assignment() {
        let filter = QuestionFilter {
            assignment: Some("Week 4".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&sample()));
    }

    #[test]
    fn filter_searches_question_text() {
        let filter = QuestionFilter {
            q: Some("20N".into()),
            ..Default::default()
        };
        assert!(filter.matches(&sample()));
    }

    #[test]
    fn public_question_hides_mark_scheme_and_renders_text() {
        let public = PublicQuestion::from(&sample());
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("mark_scheme_text").is_none());
        assert!(public.question_html.unwrap().contains("<p>"));
        assert!(public.image_url.is_none());
    }

    #[test]
    fn scan_question_without_image_is_rejected() {
        let new = NewQuestion {
            source: QuestionSource::Scan,
            title: "Scan".into(),
            assignment: None,
            subject: "Physics".into(),
            topic: "Waves".into(),
            difficulty: Difficulty::Easy,
            max_marks: 2,
            question_text: None,
            mark_scheme_text: None,
            question_image_path: None,
            mark_scheme_image_path: None,
        };
        assert!(new.check_content().is_err());
    }

    #[test]
    fn asset_kind_parses_route_segments() {
        assert_eq!(AssetKind::from_segment("mark-scheme"), Some(AssetKind::MarkScheme));
        assert_eq!(AssetKind::from_segment("answers"), None);
    }
}
