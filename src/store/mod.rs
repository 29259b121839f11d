// src/store/mod.rs

//! Relational data access.
//!
//! Handlers talk to the traits below; `PgStore` backs them with Postgres and
//! `MemoryStore` keeps everything in process for development and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptFilter, ClassSetAverage, NewAttempt, QuestionAverage},
        question::{
            AssetKind, AssignmentSummary, NewQuestion, Question, QuestionFilter,
            UpdateQuestionRequest,
        },
        user::User,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Default and maximum page sizes for the teacher's attempt list.
pub const DEFAULT_ATTEMPT_LIMIT: i64 = 200;
pub const MAX_ATTEMPT_LIMIT: i64 = 1000;

pub(crate) fn attempt_limit(filter: &AttemptFilter) -> i64 {
    filter
        .limit
        .unwrap_or(DEFAULT_ATTEMPT_LIMIT)
        .clamp(1, MAX_ATTEMPT_LIMIT)
}

#[async_trait]
pub trait QuestionBank: Send + Sync {
    async fn insert_question(&self, question: NewQuestion) -> Result<Question, AppError>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError>;

    /// Newest first.
    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, AppError>;

    /// Applies the present fields. `None` when the question does not exist.
    async fn update_question(
        &self,
        id: i64,
        patch: &UpdateQuestionRequest,
    ) -> Result<Option<Question>, AppError>;

    /// Points a question at a (re-)uploaded image.
    async fn set_asset_path(
        &self,
        id: i64,
        kind: AssetKind,
        path: &str,
    ) -> Result<Option<Question>, AppError>;

    /// `Ok(false)` when nothing was deleted. Refuses questions with attempts.
    async fn delete_question(&self, id: i64) -> Result<bool, AppError>;

    async fn list_assignments(&self) -> Result<Vec<AssignmentSummary>, AppError>;

    async fn count_questions(&self) -> Result<i64, AppError>;
}

#[async_trait]
pub trait AttemptLog: Send + Sync {
    /// Inserts a marked attempt. If the submission id already exists the
    /// stored attempt is returned unchanged with `false`.
    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<(Attempt, bool), AppError>;

    async fn find_attempt_by_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Option<Attempt>, AppError>;

    /// Newest first.
    async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<Attempt>, AppError>;

    async fn class_set_averages(&self) -> Result<Vec<ClassSetAverage>, AppError>;

    async fn question_averages(&self) -> Result<Vec<QuestionAverage>, AppError>;
}

#[async_trait]
pub trait Accounts: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError>;
}

/// Everything the handlers need from the relational store.
pub trait Database: QuestionBank + AttemptLog + Accounts {}

impl<T: QuestionBank + AttemptLog + Accounts> Database for T {}

pub(crate) fn percent(marks: f64, max: f64) -> f64 {
    if max <= 0.0 { 0.0 } else { marks / max * 100.0 }
}
