// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

/// Represents the 'attempts' table in the database.
/// Written once when a submission has been marked; never updated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attempt {
    pub id: i64,

    /// Idempotency key: one submission id maps to exactly one marking result.
    pub submission_id: Uuid,

    pub question_id: i64,
    pub student_name: String,
    pub class_set: String,
    pub answer_text: Option<String>,

    /// Object-store path of the flattened canvas PNG.
    pub drawing_path: Option<String>,

    pub marks_awarded: i32,
    pub max_marks: i32,
    pub feedback_summary: String,
    pub feedback_points: Json<Vec<String>>,

    /// Model that produced the feedback.
    pub model: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub submission_id: Uuid,
    pub question_id: i64,
    pub student_name: String,
    pub class_set: String,
    pub answer_text: Option<String>,
    pub drawing_path: Option<String>,
    pub marks_awarded: i32,
    pub max_marks: i32,
    pub feedback_summary: String,
    pub feedback_points: Vec<String>,
    pub model: String,
}

/// Canvas payload as produced by the stylus canvas widget.
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasInput {
    /// `data:image/png;base64,...`
    pub data_url: Option<String>,
    #[serde(default)]
    pub is_empty: bool,
}

impl CanvasInput {
    pub fn data_url(&self) -> Option<&str> {
        if self.is_empty {
            return None;
        }
        self.data_url.as_deref().filter(|d| !d.is_empty())
    }
}

/// DTO for a student submission.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    /// Supplied by the client so a resubmission never triggers a second marking call.
    pub submission_id: Option<Uuid>,
    pub question_id: i64,
    #[validate(length(min = 1, max = 50, message = "First name is required."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name is required."))]
    pub last_name: String,
    #[validate(length(min = 1, max = 50))]
    pub class_set: String,
    #[validate(length(max = 5000))]
    pub answer_text: Option<String>,
    pub drawing: Option<CanvasInput>,
}

impl SubmitAttemptRequest {
    pub fn student_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Result of a marking call, after clamping to the question's marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkResult {
    pub marks_awarded: i32,
    pub max_marks: i32,
    pub summary: String,
    pub feedback_points: Vec<String>,
}

/// DTO returned to the student after marking.
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub submission_id: Uuid,
    pub question_id: i64,
    pub marks_awarded: i32,
    pub max_marks: i32,
    pub summary: String,
    pub feedback_points: Vec<String>,
    pub drawing_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// True when the stored result was returned for a repeated submission.
    pub replayed: bool,
}

impl AttemptResponse {
    pub fn from_attempt(attempt: &Attempt, replayed: bool) -> Self {
        AttemptResponse {
            submission_id: attempt.submission_id,
            question_id: attempt.question_id,
            marks_awarded: attempt.marks_awarded,
            max_marks: attempt.max_marks,
            summary: attempt.feedback_summary.clone(),
            feedback_points: attempt.feedback_points.0.clone(),
            drawing_url: attempt
                .drawing_path
                .as_ref()
                .map(|_| format!("/api/attempts/{}/drawing", attempt.submission_id)),
            created_at: attempt.created_at,
            replayed,
        }
    }
}

/// Filters for the teacher's attempt list.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AttemptFilter {
    pub class_set: Option<String>,
    pub question_id: Option<i64>,
    pub limit: Option<i64>,
}

/// Aggregated performance of one class set.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct ClassSetAverage {
    pub class_set: String,
    pub attempts: i64,
    pub average_marks: f64,
    pub average_percent: f64,
}

/// Aggregated performance on one question.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct QuestionAverage {
    pub question_id: i64,
    pub title: String,
    pub attempts: i64,
    pub average_marks: f64,
    pub average_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub by_class_set: Vec<ClassSetAverage>,
    pub by_question: Vec<QuestionAverage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_canvas_yields_no_data_url() {
        let canvas = CanvasInput {
            data_url: Some("data:image/png;base64,AAAA".into()),
            is_empty: true,
        };
        assert!(canvas.data_url().is_none());
    }

    #[test]
    fn student_name_joins_trimmed_parts() {
        let req: SubmitAttemptRequest = serde_json::from_value(serde_json::json!({
            "question_id": 1,
            "first_name": " Ada ",
            "last_name": "Lovelace",
            "class_set": "11Y/Ph1"
        }))
        .unwrap();
        assert_eq!(req.student_name(), "Ada Lovelace");
        assert!(req.submission_id.is_none());
    }
}
