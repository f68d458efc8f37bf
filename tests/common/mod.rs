// tests/common/mod.rs

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use studyset::ai::{CompletionRequest, LanguageModel, ModelError, QuestionGenerator};
use studyset::config::Config;
use studyset::error::AppError;
use studyset::models::generation::{GeneratedSet, GenerationResult};
use studyset::models::question::{
    CreateQuestionRequest, PositionUpdate, Question, UpdateQuestionRequest,
};
use studyset::models::study_set::StudySet;
use studyset::routes;
use studyset::state::AppState;
use studyset::store::{DynStore, MemoryStore, NewSet, Page, SetChanges, StudyStore};
use uuid::Uuid;

/// A model that plays back queued replies and counts how often it was called.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    last_user_message: Mutex<Option<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn push(&self, reply: Result<String, ModelError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_user_message(&self) -> Option<String> {
        self.last_user_message.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user_message.lock().unwrap() =
            request.messages.last().map(|m| m.content.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyResponse))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Delegates to an inner store, except that saving a generated set fails with a
/// persistence error.
pub struct FailingSaveStore {
    inner: DynStore,
    attempts: AtomicUsize,
}

impl FailingSaveStore {
    pub fn new(inner: DynStore) -> Self {
        Self {
            inner,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StudyStore for FailingSaveStore {
    async fn create_set(&self, new: NewSet) -> Result<StudySet, AppError> {
        self.inner.create_set(new).await
    }

    async fn get_set(&self, id: Uuid) -> Result<Option<StudySet>, AppError> {
        self.inner.get_set(id).await
    }

    async fn list_user_sets(&self, user_id: &str) -> Result<Vec<StudySet>, AppError> {
        self.inner.list_user_sets(user_id).await
    }

    async fn search_public_sets(&self, query: &str) -> Result<Vec<StudySet>, AppError> {
        self.inner.search_public_sets(query).await
    }

    async fn update_set(&self, id: Uuid, changes: SetChanges) -> Result<Option<StudySet>, AppError> {
        self.inner.update_set(id, changes).await
    }

    async fn delete_set(&self, id: Uuid) -> Result<bool, AppError> {
        self.inner.delete_set(id).await
    }

    async fn create_generated_set(
        &self,
        _user_id: &str,
        _result: &GenerationResult,
    ) -> Result<GeneratedSet, AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::InternalServerError(
            "new row for relation \"questions\" violates check constraint".to_string(),
        ))
    }

    async fn list_questions(&self, set_id: Uuid, page: Page) -> Result<Vec<Question>, AppError> {
        self.inner.list_questions(set_id, page).await
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        self.inner.get_question(id).await
    }

    async fn append_question(&self, new: CreateQuestionRequest) -> Result<Question, AppError> {
        self.inner.append_question(new).await
    }

    async fn update_question(
        &self,
        id: Uuid,
        changes: UpdateQuestionRequest,
    ) -> Result<Option<Question>, AppError> {
        self.inner.update_question(id, changes).await
    }

    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError> {
        self.inner.delete_question(id).await
    }

    async fn reorder_questions(
        &self,
        set_id: Uuid,
        moves: &[PositionUpdate],
    ) -> Result<Vec<Question>, AppError> {
        self.inner.reorder_questions(set_id, moves).await
    }
}

pub struct TestApp {
    pub address: String,
    pub model: Arc<ScriptedModel>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Creates a set and returns its id.
    pub async fn create_set(&self, title: &str, visibility: &str, user_id: &str) -> String {
        let resp = self
            .post(
                "/api/set",
                json!({ "title": title, "visibility": visibility, "userId": user_id }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201);
        let body: Value = resp.json().await.unwrap();
        body["set"]["id"].as_str().unwrap().to_string()
    }

    /// Appends a multiple-choice question and returns its id.
    pub async fn add_question(&self, set_id: &str, text: &str) -> String {
        let resp = self
            .post(
                "/api/questions",
                json!({
                    "setId": set_id,
                    "text": text,
                    "type": "multiple_choice",
                    "difficulty": "medium",
                    "choices": ["A", "B", "C", "D"],
                    "answer": "C",
                    "answerIdx": 2,
                    "explanation": "C is right"
                }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201);
        let body: Value = resp.json().await.unwrap();
        body["question"]["id"].as_str().unwrap().to_string()
    }

    /// Questions of a set as `(id, text, position)` in listing order.
    pub async fn list(&self, set_id: &str) -> Vec<(String, String, i64)> {
        let resp = self.get(&format!("/api/questions/{}", set_id)).await;
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        body["questions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|q| {
                (
                    q["id"].as_str().unwrap().to_string(),
                    q["text"].as_str().unwrap().to_string(),
                    q["position"].as_i64().unwrap(),
                )
            })
            .collect()
    }
}

pub fn test_config(generation_timeout: Duration) -> Config {
    Config {
        database_url: None,
        llm_api_key: "test-key".to_string(),
        llm_base_url: url::Url::parse("http://127.0.0.1:9/v1").unwrap(),
        llm_model: "scripted".to_string(),
        llm_temperature: 0.0,
        generation_timeout,
        generate_replenish_secs: 0,
        generate_burst: 0,
        port: 0,
        rust_log: "error".to_string(),
    }
}

/// Spawns the app on a random port with the in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(ScriptedModel::new(), Duration::from_secs(5)).await
}

pub async fn spawn_app_with(model: ScriptedModel, generation_timeout: Duration) -> TestApp {
    let store: DynStore = Arc::new(MemoryStore::new());
    spawn_app_on(store, model, generation_timeout).await
}

pub async fn spawn_app_on(
    store: DynStore,
    model: ScriptedModel,
    generation_timeout: Duration,
) -> TestApp {
    let model = Arc::new(model);
    let generator = QuestionGenerator::new(model.clone(), generation_timeout);

    let state = AppState {
        store,
        generator: Arc::new(generator),
        config: test_config(generation_timeout),
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
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
        model,
        client: reqwest::Client::new(),
    }
}

/// A well-formed model reply with `n` questions.
pub fn mcq_reply(title: &str, n: usize) -> String {
    mcq_payload(title, n).to_string()
}

const DIFFICULTIES: [&str; 3] = ["easy", "medium", "hard"];

pub fn mcq_payload(title: &str, n: usize) -> Value {
    let questions: Vec<Value> = (0..n)
        .map(|i| {
            let correct = i % 4;
            let choices: Vec<String> = (0..4).map(|c| format!("Option {}-{}", i + 1, c)).collect();
            let difficulty = DIFFICULTIES[i % DIFFICULTIES.len()];
            json!({
                "text": format!("Question {} about binary search trees?", i + 1),
                "type": "multiple_choice_questions",
                "difficulty": difficulty,
                "choices": choices,
                "answer": choices[correct],
                "answerIdx": correct,
                "explanation": format!("Option {} is correct.", correct)
            })
        })
        .collect();

    json!({ "title": title, "questions": questions })
}

/// Wraps a payload in the provider's `failed_generation` error envelope.
pub fn failed_generation_body(payload: &Value) -> String {
    json!({
        "error": {
            "message": "Failed to call a function. Please adjust your prompt.",
            "type": "invalid_request_error",
            "code": "tool_use_failed",
            "failed_generation": payload.to_string()
        }
    })
    .to_string()
}
