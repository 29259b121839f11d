// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptFilter, ClassSetAverage, NewAttempt, QuestionAverage},
        question::{
            AssetKind, AssignmentSummary, NewQuestion, Question, QuestionFilter, QuestionRow,
            UpdateQuestionRequest, non_empty,
        },
        user::User,
    },
};

use super::{Accounts, AttemptLog, QuestionBank, attempt_limit};

const QUESTION_COLUMNS: &str = "id, source, title, assignment, subject, topic, difficulty, \
     max_marks, question_text, mark_scheme_text, question_image_path, mark_scheme_image_path, \
     created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, submission_id, question_id, student_name, class_set, \
     answer_text, drawing_path, marks_awarded, max_marks, feedback_summary, feedback_points, \
     model, created_at";

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23503")
        .unwrap_or(false)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

#[async_trait]
impl QuestionBank for PgStore {
    async fn insert_question(&self, q: NewQuestion) -> Result<Question, AppError> {
        let sql = format!(
            r#"
            INSERT INTO questions
            (source, title, assignment, subject, topic, difficulty, max_marks,
             question_text, mark_scheme_text, question_image_path, mark_scheme_image_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );

        let row: QuestionRow = sqlx::query_as(&sql)
            .bind(q.source.as_str())
            .bind(&q.title)
            .bind(&q.assignment)
            .bind(&q.subject)
            .bind(&q.topic)
            .bind(q.difficulty.as_str())
            .bind(q.max_marks)
            .bind(&q.question_text)
            .bind(&q.mark_scheme_text)
            .bind(&q.question_image_path)
            .bind(&q.mark_scheme_image_path)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create question: {:?}", e);
                AppError::from(e)
            })?;

        row.try_into()
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let sql = format!("SELECT {} FROM questions WHERE id = $1", QUESTION_COLUMNS);
        sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Question::try_from)
            .transpose()
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM questions WHERE TRUE", QUESTION_COLUMNS));

        if let Some(assignment) = &filter.assignment {
            builder.push(" AND assignment = ").push_bind(assignment.clone());
        }
        if let Some(subject) = &filter.subject {
            builder.push(" AND subject = ").push_bind(subject.clone());
        }
        if let Some(topic) = &filter.topic {
            builder
                .push(" AND topic ILIKE ")
                .push_bind(format!("%{}%", escape_like(topic)));
        }
        if let Some(difficulty) = filter.difficulty {
            builder.push(" AND difficulty = ").push_bind(difficulty.as_str());
        }
        if let Some(source) = filter.source {
            builder.push(" AND source = ").push_bind(source.as_str());
        }
        if let Some(q) = &filter.q {
            let pattern = format!("%{}%", escape_like(q));
            builder
                .push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR question_text ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        let rows: Vec<QuestionRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list questions: {:?}", e);
                AppError::from(e)
            })?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn update_question(
        &self,
        id: i64,
        patch: &UpdateQuestionRequest,
    ) -> Result<Option<Question>, AppError> {
        if patch.is_empty() {
            return self.get_question(id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
        let mut separated = builder.separated(", ");

        if let Some(title) = &patch.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title.clone());
        }
        if let Some(assignment) = &patch.assignment {
            separated.push("assignment = ");
            separated.push_bind_unseparated(non_empty(Some(assignment.clone())));
        }
        if let Some(subject) = &patch.subject {
            separated.push("subject = ");
            separated.push_bind_unseparated(subject.clone());
        }
        if let Some(topic) = &patch.topic {
            separated.push("topic = ");
            separated.push_bind_unseparated(topic.clone());
        }
        if let Some(difficulty) = patch.difficulty {
            separated.push("difficulty = ");
            separated.push_bind_unseparated(difficulty.as_str());
        }
        if let Some(max_marks) = patch.max_marks {
            separated.push("max_marks = ");
            separated.push_bind_unseparated(max_marks);
        }
        if let Some(question_text) = &patch.question_text {
            separated.push("question_text = ");
            separated.push_bind_unseparated(non_empty(Some(question_text.clone())));
        }
        if let Some(mark_scheme_text) = &patch.mark_scheme_text {
            separated.push("mark_scheme_text = ");
            separated.push_bind_unseparated(non_empty(Some(mark_scheme_text.clone())));
        }
        separated.push("updated_at = NOW()");

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(format!(" RETURNING {}", QUESTION_COLUMNS));

        builder
            .build_query_as::<QuestionRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update question: {:?}", e);
                AppError::from(e)
            })?
            .map(Question::try_from)
            .transpose()
    }

    async fn set_asset_path(
        &self,
        id: i64,
        kind: AssetKind,
        path: &str,
    ) -> Result<Option<Question>, AppError> {
        let column = match kind {
            AssetKind::Question => "question_image_path",
            AssetKind::MarkScheme => "mark_scheme_image_path",
        };
        let sql = format!(
            "UPDATE questions SET {} = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            column, QUESTION_COLUMNS
        );

        sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(path)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Question::try_from)
            .transpose()
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Conflict(
                        "Question already has student attempts and cannot be deleted".to_string(),
                    )
                } else {
                    tracing::error!("Failed to delete question: {:?}", e);
                    AppError::from(e)
                }
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_assignments(&self) -> Result<Vec<AssignmentSummary>, AppError> {
        let rows = sqlx::query_as::<_, AssignmentSummary>(
            r#"
            SELECT assignment AS "assignment", COUNT(*)::BIGINT AS question_count
            FROM questions
            WHERE assignment IS NOT NULL
            GROUP BY assignment
            ORDER BY assignment
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_questions(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*)::BIGINT FROM questions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl AttemptLog for PgStore {
    async fn insert_attempt(&self, a: NewAttempt) -> Result<(Attempt, bool), AppError> {
        let sql = format!(
            r#"
            INSERT INTO attempts
            (submission_id, question_id, student_name, class_set, answer_text, drawing_path,
             marks_awarded, max_marks, feedback_summary, feedback_points, model)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (submission_id) DO NOTHING
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        );

        let inserted: Option<Attempt> = sqlx::query_as(&sql)
            .bind(a.submission_id)
            .bind(a.question_id)
            .bind(&a.student_name)
            .bind(&a.class_set)
            .bind(&a.answer_text)
            .bind(&a.drawing_path)
            .bind(a.marks_awarded)
            .bind(a.max_marks)
            .bind(&a.feedback_summary)
            .bind(Json(&a.feedback_points))
            .bind(&a.model)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::StaleSelection("The selected question no longer exists".to_string())
                } else {
                    tracing::error!("Failed to insert attempt: {:?}", e);
                    AppError::from(e)
                }
            })?;

        match inserted {
            Some(attempt) => Ok((attempt, true)),
            None => self
                .find_attempt_by_submission(a.submission_id)
                .await?
                .map(|existing| (existing, false))
                .ok_or_else(|| {
                    AppError::InternalServerError(format!(
                        "attempt {} vanished after conflict",
                        a.submission_id
                    ))
                }),
        }
    }

    async fn find_attempt_by_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Option<Attempt>, AppError> {
        let sql = format!(
            "SELECT {} FROM attempts WHERE submission_id = $1",
            ATTEMPT_COLUMNS
        );
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(submission_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attempt)
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<Attempt>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM attempts WHERE TRUE", ATTEMPT_COLUMNS));

        if let Some(class_set) = &filter.class_set {
            builder.push(" AND class_set = ").push_bind(class_set.clone());
        }
        if let Some(question_id) = filter.question_id {
            builder.push(" AND question_id = ").push_bind(question_id);
        }
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(attempt_limit(filter));

        let attempts = builder
            .build_query_as::<Attempt>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list attempts: {:?}", e);
                AppError::from(e)
            })?;

        Ok(attempts)
    }

    async fn class_set_averages(&self) -> Result<Vec<ClassSetAverage>, AppError> {
        let rows = sqlx::query_as::<_, ClassSetAverage>(
            r#"
            SELECT
                class_set,
                COUNT(*)::BIGINT AS attempts,
                COALESCE(AVG(marks_awarded::FLOAT8), 0)::FLOAT8 AS average_marks,
                COALESCE(AVG(marks_awarded::FLOAT8 * 100 / NULLIF(max_marks, 0)), 0)::FLOAT8
                    AS average_percent
            FROM attempts
            GROUP BY class_set
            ORDER BY class_set
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn question_averages(&self) -> Result<Vec<QuestionAverage>, AppError> {
        let rows = sqlx::query_as::<_, QuestionAverage>(
            r#"
            SELECT
                a.question_id,
                q.title,
                COUNT(*)::BIGINT AS attempts,
                COALESCE(AVG(a.marks_awarded::FLOAT8), 0)::FLOAT8 AS average_marks,
                COALESCE(AVG(a.marks_awarded::FLOAT8 * 100 / NULLIF(a.max_marks, 0)), 0)::FLOAT8
                    AS average_percent
            FROM attempts a
            JOIN questions q ON q.id = a.question_id
            GROUP BY a.question_id, q.title
            ORDER BY a.question_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl Accounts for PgStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, role, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Login DB error: {:?}", e);
            AppError::from(e)
        })?;

        Ok(user)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, password, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })
    }
}

/// Escapes `%`, `_` and `\` for use inside an ILIKE pattern.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
