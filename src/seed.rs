// src/seed.rs

//! Startup data: the teacher account and a couple of sample questions.

use crate::{
    config::Config,
    error::AppError,
    models::{
        question::{Difficulty, NewQuestion, QuestionSource},
        user::TEACHER_ROLE,
    },
    store::Database,
    utils::hash::hash_password,
};

/// Creates the configured teacher account if it does not exist yet.
pub async fn seed_teacher(db: &dyn Database, config: &Config) -> Result<(), AppError> {
    let (Some(username), Some(password)) = (&config.teacher_username, &config.teacher_password)
    else {
        tracing::warn!("TEACHER_USERNAME/TEACHER_PASSWORD not set; no teacher account seeded");
        return Ok(());
    };

    if db.find_user_by_username(username).await?.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding teacher user: {}", username);
    let hashed = hash_password(password)?;
    db.create_user(username, &hashed, TEACHER_ROLE).await?;
    tracing::info!("Teacher user created successfully.");
    Ok(())
}

fn sample_questions() -> Vec<NewQuestion> {
    vec![
        NewQuestion {
            source: QuestionSource::Manual,
            title: "Q1: Forces".to_string(),
            assignment: Some("Sample".to_string()),
            subject: "Physics".to_string(),
            topic: "Forces".to_string(),
            difficulty: Difficulty::Easy,
            max_marks: 3,
            question_text: Some(
                "A 5kg box is pushed with a 20N force. Friction is 4N. Calculate the acceleration."
                    .to_string(),
            ),
            mark_scheme_text: Some(
                "1. Resultant force = 16N.\n2. $F = ma$.\n3. $a = 3.2\\ \\text{m/s}^2$.".to_string(),
            ),
            question_image_path: None,
            mark_scheme_image_path: None,
        },
        NewQuestion {
            source: QuestionSource::Manual,
            title: "Q2: Refraction".to_string(),
            assignment: Some("Sample".to_string()),
            subject: "Physics".to_string(),
            topic: "Refraction".to_string(),
            difficulty: Difficulty::Easy,
            max_marks: 2,
            question_text: Some(
                "Draw a ray diagram showing light passing from air into glass.".to_string(),
            ),
            mark_scheme_text: Some("1. Bends toward normal.\n2. Correct labels.".to_string()),
            question_image_path: None,
            mark_scheme_image_path: None,
        },
    ]
}

/// Adds the sample questions when the bank is empty.
pub async fn seed_sample_questions(db: &dyn Database) -> Result<usize, AppError> {
    if db.count_questions().await? > 0 {
        return Ok(0);
    }

    let samples = sample_questions();
    let count = samples.len();
    for question in samples {
        db.insert_question(question).await?;
    }
    tracing::info!("Seeded {} sample questions", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Accounts, MemoryStore, QuestionBank};

    #[tokio::test]
    async fn samples_are_added_once() {
        let store = MemoryStore::new();
        assert_eq!(seed_sample_questions(&store).await.unwrap(), 2);
        assert_eq!(seed_sample_questions(&store).await.unwrap(), 0);
        assert_eq!(store.count_questions().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn teacher_is_seeded_with_hashed_password() {
        let store = MemoryStore::new();
        let mut config = Config::for_tests("secret");
        config.teacher_username = Some("physics".into());
        config.teacher_password = Some("Newton2025".into());

        seed_teacher(&store, &config).await.unwrap();
        seed_teacher(&store, &config).await.unwrap();

        let user = store.find_user_by_username("physics").await.unwrap().unwrap();
        assert_eq!(user.role, TEACHER_ROLE);
        assert_ne!(user.password, "Newton2025");
    }
}
