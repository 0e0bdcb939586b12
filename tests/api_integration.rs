//! Integration tests for the HTTP API.
//!
//! Each test spins up the real app on a random port, backed by an in-memory
//! database and the real completion client pointed at a mock
//! `/chat/completions` server, then drives it over HTTP with reqwest.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use study_coach::api::{AppState, app_routes};
use study_coach::chat::{ChatConfig, ChatService, SessionLocks};
use study_coach::llm::{LlmConfig, create_provider};
use study_coach::onboarding::QUESTIONS;
use study_coach::schedule::ScheduleService;
use study_coach::store::{Database, LibSqlBackend};

/// How the mock completion server answers.
#[derive(Clone, Copy)]
enum Mode {
    Reply,
    ServerError,
    Malformed,
}

#[derive(Clone)]
struct MockState {
    mode: Mode,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn mock_completions(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let count = {
        let mut requests = state.requests.lock().unwrap();
        requests.push(body);
        requests.len()
    };
    match state.mode {
        Mode::Reply => Json(json!({
            "choices": [{"message": {"role": "assistant", "content": format!("advice #{count}")}}]
        }))
        .into_response(),
        Mode::ServerError => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        Mode::Malformed => Json(json!({"choices": []})).into_response(),
    }
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}")
}

struct TestServer {
    base: String,
    db: Arc<dyn Database>,
    completions: Arc<Mutex<Vec<Value>>>,
    http: reqwest::Client,
}

impl TestServer {
    async fn start(mode: Mode) -> Self {
        let completions = Arc::new(Mutex::new(Vec::new()));
        let mock = Router::new()
            .route("/chat/completions", post(mock_completions))
            .with_state(MockState {
                mode,
                requests: Arc::clone(&completions),
            });
        let mock_base = spawn(mock).await;

        let llm = create_provider(&LlmConfig {
            api_key: secrecy::SecretString::from("sk-test"),
            model: "test-model".to_string(),
            api_base: mock_base,
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap();

        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let locks = Arc::new(SessionLocks::new());
        let chat = ChatService::new(
            Arc::clone(&db),
            Arc::clone(&llm),
            Arc::clone(&locks),
            ChatConfig {
                system_prompt: "You are a study coach.".to_string(),
                history_window: 10,
            },
        );
        let schedule = ScheduleService::new(Arc::clone(&db), llm, "You are a study coach.");
        let app = app_routes(AppState {
            db: Arc::clone(&db),
            chat: Arc::new(chat),
            schedule: Arc::new(schedule),
            locks,
        });

        Self {
            base: spawn(app).await,
            db,
            completions,
            http: reqwest::Client::new(),
        }
    }

    async fn chat(&self, session_id: &str, message: &str) -> String {
        let body: Value = self
            .http
            .post(format!("{}/chat", self.base))
            .json(&json!({"message": message, "session_id": session_id}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["response"].as_str().unwrap().to_string()
    }

    async fn history(&self, session_id: &str) -> Vec<Value> {
        let body: Value = self
            .http
            .get(format!("{}/history/{session_id}", self.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["history"].as_array().unwrap().clone()
    }

    async fn complete_onboarding(&self, session_id: &str) {
        for answer in ["hello", "Aki", "3", "5"] {
            self.chat(session_id, answer).await;
        }
    }
}

#[tokio::test]
async fn onboarding_questions_come_in_order_then_free_form() {
    let server = TestServer::start(Mode::Reply).await;

    let first = server.chat("s1", "hello").await;
    assert_eq!(first, QUESTIONS[0].text);
    let second = server.chat("s1", "Aki").await;
    assert!(second.starts_with("Nice to meet you, Aki!"));
    let third = server.chat("s1", "3").await;
    assert_eq!(third, QUESTIONS[2].text);
    let fourth = server.chat("s1", "5").await;
    assert!(fourth.starts_with("Thanks, Aki!"));
    assert!(server.completions.lock().unwrap().is_empty());

    let reply = server.chat("s1", "How should I revise?").await;
    assert_eq!(reply, "advice #1");

    let session = server.db.get_session("s1").await.unwrap().unwrap();
    assert_eq!(session.username.as_deref(), Some("Aki"));
    assert_eq!(session.study_hours(), Some(3.0));
    assert_eq!(session.phone_hours(), Some(5.0));
}

#[tokio::test]
async fn free_form_request_carries_system_prompt_and_history_in_order() {
    let server = TestServer::start(Mode::Reply).await;
    server.complete_onboarding("s1").await;
    server.chat("s1", "first question").await;
    server.chat("s1", "second question").await;

    let requests = server.completions.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    let messages = requests[1]["messages"].as_array().unwrap();
    assert_eq!(requests[1]["model"], "test-model");
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "You are a study coach.");
    assert_eq!(messages.last().unwrap()["content"], "second question");

    let n = messages.len();
    assert_eq!(messages[n - 3]["content"], "first question");
    assert_eq!(messages[n - 2]["role"], "assistant");
    assert_eq!(messages[n - 2]["content"], "advice #1");
}

#[tokio::test]
async fn history_lists_turns_oldest_first() {
    let server = TestServer::start(Mode::Reply).await;
    server.chat("s1", "hello").await;
    server.chat("s1", "Aki").await;

    let history = server.history("s1").await;
    let contents: Vec<&str> = history
        .iter()
        .map(|t| t["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents[0], "hello");
    assert_eq!(contents[1], QUESTIONS[0].text);
    assert_eq!(contents[2], "Aki");
    assert!(contents[3].starts_with("Nice to meet you, Aki!"));
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[1]["role"], "assistant");
}

#[tokio::test]
async fn delete_last_removes_one_pair_at_a_time() {
    let server = TestServer::start(Mode::Reply).await;
    server.chat("s1", "hello").await;
    server.chat("s1", "Aki").await;
    assert_eq!(server.history("s1").await.len(), 4);

    for expected in [2, 0, 0] {
        let body: Value = server
            .http
            .delete(format!("{}/delete_last/s1", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "deleted");
        assert_eq!(server.history("s1").await.len(), expected);
    }
}

#[tokio::test]
async fn sessions_are_created_once_and_listed() {
    let server = TestServer::start(Mode::Reply).await;
    for title in ["Maths", "Renamed"] {
        let body: Value = server
            .http
            .post(format!("{}/sessions", server.base))
            .json(&json!({"session_id": "s1", "title": title}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["session_id"], "s1");
        assert_eq!(body["title"], "Maths");
    }
    server.chat("s2", "hello").await;

    let sessions: Vec<Value> = server
        .http
        .get(format!("{}/sessions", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().any(|s| s["session_id"] == "s2"));
}

#[tokio::test]
async fn upstream_error_is_reported_without_assistant_turn() {
    let server = TestServer::start(Mode::ServerError).await;
    server.complete_onboarding("s1").await;
    let before = server.history("s1").await.len();

    let reply = server.chat("s1", "help me plan").await;
    assert!(reply.starts_with("API error: 500"));
    assert!(reply.contains("upstream exploded"));

    let history = server.history("s1").await;
    assert_eq!(history.len(), before + 1);
    assert_eq!(history.last().unwrap()["role"], "user");
    assert_eq!(history.last().unwrap()["content"], "help me plan");
}

#[tokio::test]
async fn malformed_reply_is_reported_as_text() {
    let server = TestServer::start(Mode::Malformed).await;
    server.complete_onboarding("s1").await;

    let response = server
        .http
        .post(format!("{}/chat", server.base))
        .json(&json!({"message": "help", "session_id": "s1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(
        body["response"]
            .as_str()
            .unwrap()
            .starts_with("Failed to read AI reply")
    );
}

#[tokio::test]
async fn cursor_never_passes_question_count() {
    let server = TestServer::start(Mode::Reply).await;
    for i in 0..10 {
        server.chat("s1", &format!("message {i}")).await;
    }
    let status: Value = server
        .http
        .get(format!("{}/onboarding/s1", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["question_index"], QUESTIONS.len());
    assert_eq!(status["onboarding_completed"], true);
}

#[tokio::test]
async fn screen_time_then_schedule_plan() {
    let server = TestServer::start(Mode::Reply).await;

    let body: Value = server
        .http
        .post(format!("{}/plan_schedule", server.base))
        .json(&json!({"session_id": "s1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["response"].as_str().unwrap().starts_with("No screen time"));

    let body: Value = server
        .http
        .post(format!("{}/screen_time", server.base))
        .json(&json!({"session_id": "s1", "study_hours": 2.0, "sns_hours": 4.5, "game_hours": 1.0}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "recorded");
    assert!(body["id"].is_string());

    let body: Value = server
        .http
        .post(format!("{}/plan_schedule", server.base))
        .json(&json!({"session_id": "s1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["response"], "advice #1");

    let requests = server.completions.lock().unwrap().clone();
    let prompt = requests[0]["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("4.5 hours on social media"));

    let body: Value = server
        .http
        .get(format!("{}/plans/s1", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let plans = body["plans"].as_array().unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0]["advice"], "advice #1");
    assert_eq!(plans[0]["prompt"], prompt);
}
