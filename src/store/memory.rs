// src/store/memory.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptFilter, ClassSetAverage, NewAttempt, QuestionAverage},
        question::{
            AssetKind, AssignmentSummary, NewQuestion, Question, QuestionFilter,
            UpdateQuestionRequest, non_empty,
        },
        user::User,
    },
};

use super::{Accounts, AttemptLog, QuestionBank, attempt_limit, percent};

#[derive(Default)]
struct Tables {
    questions: BTreeMap<i64, Question>,
    attempts: BTreeMap<i64, Attempt>,
    users: BTreeMap<i64, User>,
    next_question_id: i64,
    next_attempt_id: i64,
    next_user_id: i64,
}

/// In-process store with the same semantics as the Postgres schema,
/// including the unique submission id and the attempt foreign key.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[async_trait]
impl QuestionBank for MemoryStore {
    async fn insert_question(&self, q: NewQuestion) -> Result<Question, AppError> {
        q.check_content()?;
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let question = Question {
            id: next_id(&mut tables.next_question_id),
            source: q.source,
            title: q.title,
            assignment: q.assignment,
            subject: q.subject,
            topic: q.topic,
            difficulty: q.difficulty,
            max_marks: q.max_marks,
            question_text: q.question_text,
            mark_scheme_text: q.mark_scheme_text,
            question_image_path: q.question_image_path,
            mark_scheme_image_path: q.mark_scheme_image_path,
            created_at: now,
            updated_at: now,
        };
        tables.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .values()
            .rev()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect())
    }

    async fn update_question(
        &self,
        id: i64,
        patch: &UpdateQuestionRequest,
    ) -> Result<Option<Question>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(question) = tables.questions.get_mut(&id) else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(question.clone()));
        }

        if let Some(title) = &patch.title {
            question.title = title.clone();
        }
        if let Some(assignment) = &patch.assignment {
            question.assignment = non_empty(Some(assignment.clone()));
        }
        if let Some(subject) = &patch.subject {
            question.subject = subject.clone();
        }
        if let Some(topic) = &patch.topic {
            question.topic = topic.clone();
        }
        if let Some(difficulty) = patch.difficulty {
            question.difficulty = difficulty;
        }
        if let Some(max_marks) = patch.max_marks {
            question.max_marks = max_marks;
        }
        if let Some(question_text) = &patch.question_text {
            question.question_text = non_empty(Some(question_text.clone()));
        }
        if let Some(mark_scheme_text) = &patch.mark_scheme_text {
            question.mark_scheme_text = non_empty(Some(mark_scheme_text.clone()));
        }
        question.updated_at = Utc::now();

        Ok(Some(question.clone()))
    }

    async fn set_asset_path(
        &self,
        id: i64,
        kind: AssetKind,
        path: &str,
    ) -> Result<Option<Question>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(question) = tables.questions.get_mut(&id) else {
            return Ok(None);
        };
        match kind {
            AssetKind::Question => question.question_image_path = Some(path.to_string()),
            AssetKind::MarkScheme => question.mark_scheme_image_path = Some(path.to_string()),
        }
        question.updated_at = Utc::now();
        Ok(Some(question.clone()))
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.attempts.values().any(|a| a.question_id == id) {
            return Err(AppError::Conflict(
                "Question already has student attempts and cannot be deleted".to_string(),
            ));
        }
        Ok(tables.questions.remove(&id).is_some())
    }

    async fn list_assignments(&self) -> Result<Vec<AssignmentSummary>, AppError> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for assignment in tables.questions.values().filter_map(|q| q.assignment.clone()) {
            *counts.entry(assignment).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(assignment, question_count)| AssignmentSummary {
                assignment,
                question_count,
            })
            .collect())
    }

    async fn count_questions(&self) -> Result<i64, AppError> {
        Ok(self.tables.read().await.questions.len() as i64)
    }
}

#[async_trait]
impl AttemptLog for MemoryStore {
    async fn insert_attempt(&self, a: NewAttempt) -> Result<(Attempt, bool), AppError> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .attempts
            .values()
            .find(|existing| existing.submission_id == a.submission_id)
        {
            return Ok((existing.clone(), false));
        }
        if !tables.questions.contains_key(&a.question_id) {
            return Err(AppError::StaleSelection(
                "The selected question no longer exists".to_string(),
            ));
        }

        let attempt = Attempt {
            id: next_id(&mut tables.next_attempt_id),
            submission_id: a.submission_id,
            question_id: a.question_id,
            student_name: a.student_name,
            class_set: a.class_set,
            answer_text: a.answer_text,
            drawing_path: a.drawing_path,
            marks_awarded: a.marks_awarded,
            max_marks: a.max_marks,
            feedback_summary: a.feedback_summary,
            feedback_points: Json(a.feedback_points),
            model: a.model,
            created_at: Utc::now(),
        };
        tables.attempts.insert(attempt.id, attempt.clone());
        Ok((attempt, true))
    }

    async fn find_attempt_by_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Option<Attempt>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .values()
            .find(|a| a.submission_id == submission_id)
            .cloned())
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<Attempt>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .values()
            .rev()
            .filter(|a| {
                filter
                    .class_set
                    .as_ref()
                    .is_none_or(|class_set| &a.class_set == class_set)
                    && filter.question_id.is_none_or(|id| a.question_id == id)
            })
            .take(attempt_limit(filter) as usize)
            .cloned()
            .collect())
    }

    async fn class_set_averages(&self) -> Result<Vec<ClassSetAverage>, AppError> {
        let tables = self.tables.read().await;
        let mut groups: BTreeMap<String, Vec<&Attempt>> = BTreeMap::new();
        for attempt in tables.attempts.values() {
            groups.entry(attempt.class_set.clone()).or_default().push(attempt);
        }
        Ok(groups
            .into_iter()
            .map(|(class_set, attempts)| {
                let (average_marks, average_percent) = averages(&attempts);
                ClassSetAverage {
                    class_set,
                    attempts: attempts.len() as i64,
                    average_marks,
                    average_percent,
                }
            })
            .collect())
    }

    async fn question_averages(&self) -> Result<Vec<QuestionAverage>, AppError> {
        let tables = self.tables.read().await;
        let mut groups: BTreeMap<i64, Vec<&Attempt>> = BTreeMap::new();
        for attempt in tables.attempts.values() {
            groups.entry(attempt.question_id).or_default().push(attempt);
        }
        Ok(groups
            .into_iter()
            .filter_map(|(question_id, attempts)| {
                let title = tables.questions.get(&question_id)?.title.clone();
                let (average_marks, average_percent) = averages(&attempts);
                Some(QuestionAverage {
                    question_id,
                    title,
                    attempts: attempts.len() as i64,
                    average_marks,
                    average_percent,
                })
            })
            .collect())
    }
}

fn averages(attempts: &[&Attempt]) -> (f64, f64) {
    if attempts.is_empty() {
        return (0.0, 0.0);
    }
    let n = attempts.len() as f64;
    let marks: f64 = attempts.iter().map(|a| f64::from(a.marks_awarded)).sum();
    let percents: f64 = attempts
        .iter()
        .map(|a| percent(f64::from(a.marks_awarded), f64::from(a.max_marks)))
        .sum();
    (marks / n, percents / n)
}

#[async_trait]
impl Accounts for MemoryStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }
        let user = User {
            id: next_id(&mut tables.next_user_id),
            username: username.to_string(),
            password: password_hash.to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}
