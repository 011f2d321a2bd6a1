// tests/common/mod.rs

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use mocktest_session::{
    backend::HttpBackend, config::Config, routes, session::registry::SessionRegistry,
    state::AppState,
};
use serde_json::{Value, json};

/// In-process stand-in for the external REST backend.
#[derive(Clone, Default)]
pub struct Stub {
    pub questions: Arc<Mutex<Vec<Value>>>,
    pub history: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    pub submissions: Arc<Mutex<Vec<Value>>>,
    pub fail_questions: Arc<AtomicBool>,
    pub fail_history: Arc<AtomicBool>,
    /// Number of upcoming submissions answered with 500.
    pub fail_submits: Arc<AtomicU32>,
    /// When set, requests must carry this bearer token or get a 403.
    pub valid_token: Arc<Mutex<Option<String>>>,
    pub refresh_calls: Arc<AtomicU32>,
}

pub const FRESH_TOKEN: &str = "fresh-token";
pub const GOOD_REFRESH: &str = "refresh-ok";

impl Stub {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = self.valid_token.lock().unwrap().clone();
        match expected {
            None => true,
            Some(token) => headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == format!("Bearer {}", token)),
        }
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().unwrap().clone()
    }
}

/// Three questions whose correct options are A, B and C.
pub fn sample_questions() -> Vec<Value> {
    ["A", "B", "C"]
        .iter()
        .enumerate()
        .map(|(i, correct)| {
            json!({
                "_id": format!("q{}", i + 1),
                "questionNumber": i + 1,
                "question": format!("Question {}", i + 1),
                "options": ["Charcoal", "Graphite", "Ink", "Pastel"],
                "correctOption": correct,
            })
        })
        .collect()
}

async fn questions(State(stub): State<Stub>) -> impl IntoResponse {
    if stub.fail_questions.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "boom" })));
    }
    let questions = stub.questions.lock().unwrap().clone();
    (StatusCode::OK, Json(Value::Array(questions)))
}

async fn profile(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    if !stub.authorized(&headers) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "forbidden" })));
    }
    if stub.fail_history.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "boom" })));
    }
    let tests = stub
        .history
        .lock()
        .unwrap()
        .get(&user_id)
        .cloned()
        .unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({ "_id": user_id, "fullName": "Test User", "mockTests": tests })),
    )
}

async fn submit(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    if !stub.authorized(&headers) {
        return StatusCode::FORBIDDEN;
    }
    let pending_failures = stub.fail_submits.load(Ordering::SeqCst);
    if pending_failures > 0 {
        stub.fail_submits.store(pending_failures - 1, Ordering::SeqCst);
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    stub.submissions.lock().unwrap().push(payload);
    StatusCode::CREATED
}

async fn refresh(State(stub): State<Stub>, Json(body): Json<Value>) -> impl IntoResponse {
    stub.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if body["refreshToken"] != GOOD_REFRESH {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad refresh token" })));
    }
    *stub.valid_token.lock().unwrap() = Some(FRESH_TOKEN.to_string());
    (StatusCode::OK, Json(json!({ "accessToken": FRESH_TOKEN })))
}

/// Spawns the stub backend on a random port. Returns its base URL.
pub async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/api/mocktest/questions", get(questions))
        .route("/api/mocktest/submit", post(submit))
        .route("/api/users/profile/{id}", get(profile))
        .route("/api/users/refresh-token", post(refresh))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

pub fn test_config(api_base_url: &str) -> Config {
    Config {
        api_base_url: api_base_url.to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        rust_log: "error".to_string(),
        test_duration_secs: 3600,
        cooldown_days: 7,
        request_timeout_secs: 5,
        session_idle_secs: 3600,
        access_token: None,
        refresh_token: None,
    }
}

/// Spawns the session host against a fresh stub. Returns (host address, stub handle).
pub async fn spawn_app() -> (String, Stub) {
    let stub = Stub::default();
    *stub.questions.lock().unwrap() = sample_questions();
    let stub_url = spawn_stub(stub.clone()).await;

    let config = test_config(&stub_url);
    let backend = HttpBackend::new(&config).expect("Failed to build backend client");

    let state = AppState {
        config,
        backend: Arc::new(backend),
        sessions: SessionRegistry::new(),
    };

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{}", port), stub)
}
