// tests/common/mod.rs

#![allow(dead_code)]

use std::{
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, Rgba, RgbaImage};
use panphy::{
    ai::{Examiner, GeneratedQuestion, GenerationPrompt, MarkingRequest},
    config::Config,
    error::AppError,
    models::attempt::MarkResult,
    routes,
    seed::seed_teacher,
    state::AppState,
    storage::MemoryBlobStore,
    store::MemoryStore,
};
use serde_json::{Value, json};

pub const TEACHER_USERNAME: &str = "physics";
pub const TEACHER_PASSWORD: &str = "Newton2025";

/// Counts marking calls and can be told to stall or fail.
#[derive(Default)]
pub struct FakeExaminer {
    pub marking_calls: AtomicUsize,
    pub generation_calls: AtomicUsize,
    pub delay_ms: AtomicUsize,
    pub fail_next: AtomicBool,
    pub last_request: std::sync::Mutex<Option<MarkingRequest>>,
}

impl FakeExaminer {
    pub fn marking_calls(&self) -> usize {
        self.marking_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Examiner for FakeExaminer {
    fn model_name(&self) -> &str {
        "fake-examiner"
    }

    async fn generate_question(
        &self,
        prompt: &GenerationPrompt,
    ) -> Result<GeneratedQuestion, AppError> {
        self.generation_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedQuestion {
            title: format!("{} practice", prompt.topic),
            question_text: format!("Explain one idea from **{}**. Use $F = ma$.", prompt.topic),
            mark_scheme: "1. Correct idea.\n2. Correct equation.".to_string(),
            max_marks: prompt.max_marks,
        })
    }

    async fn mark_attempt(&self, request: &MarkingRequest) -> Result<MarkResult, AppError> {
        self.marking_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::Upstream(
                "The marking service timed out. Please try again.".to_string(),
            ));
        }

        Ok(MarkResult {
            marks_awarded: request.max_marks.min(2),
            max_marks: request.max_marks,
            summary: "Good start.".to_string(),
            feedback_points: vec!["Resultant force correct.".to_string()],
        })
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub state: AppState,
    pub examiner: Arc<FakeExaminer>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Logs in as the seeded teacher and returns the bearer token.
    pub async fn teacher_token(&self) -> String {
        let body: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": TEACHER_USERNAME, "password": TEACHER_PASSWORD }))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Creates a manual text question and returns its id.
    pub async fn create_text_question(&self, token: &str, title: &str, max_marks: i32) -> i64 {
        let response = self
            .client
            .post(self.url("/api/admin/questions"))
            .bearer_auth(token)
            .json(&json!({
                "title": title,
                "assignment": "Homework 1",
                "subject": "Physics",
                "topic": "Forces",
                "difficulty": "easy",
                "max_marks": max_marks,
                "question_text": "A 5kg box is pushed with a 20N force. Friction is 4N. Calculate the acceleration.",
                "mark_scheme_text": "1. Resultant force = 16N. 2. F=ma. 3. a=3.2 m/s²."
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }
}

/// Spawns the app on a random port with in-memory stores and a fake examiner.
pub async fn spawn_app() -> TestApp {
    let mut config = Config::for_tests("test_secret_for_integration_tests");
    config.teacher_username = Some(TEACHER_USERNAME.to_string());
    config.teacher_password = Some(TEACHER_PASSWORD.to_string());

    let db = Arc::new(MemoryStore::new());
    seed_teacher(db.as_ref(), &config)
        .await
        .expect("Failed to seed teacher");

    let examiner = Arc::new(FakeExaminer::default());
    let blobs = Arc::new(MemoryBlobStore::new());
    let state = AppState::new(db, blobs.clone(), examiner.clone(), config);

    let app = routes::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        state,
        examiner,
        blobs,
    }
}

/// A small PNG, optionally with a dark stroke across the middle.
pub fn png_bytes(width: u32, height: u32, stroke: bool) -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 0]));
    if stroke {
        for x in 0..width {
            img.put_pixel(x, height / 2, Rgba([0, 0, 0, 255]));
        }
    }
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn png_data_url(stroke: bool) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(40, 20, stroke)))
}
