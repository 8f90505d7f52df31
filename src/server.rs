//! Quiz HTTP server.
//!
//! Exposes the quiz flow as a small JSON API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/start` | Create a session and serve the first question |
//! | `POST` | `/answer` | Submit an answer, receive feedback and the next step |
//! | `POST` | `/get-location` | Reveal the location once the quiz is passed |
//! | `GET`  | `/health` | Index status and active session count |
//!
//! The embedding index is built (or loaded from cache) to completion before
//! the listener binds, then shared read-only through the router state — no
//! lazy initialization, no lock around `search`. Sessions mutate behind a
//! per-session lock, so at most one answer per session is in flight.
//!
//! # Error Contract
//!
//! Errors are JSON with a machine-readable code and a descriptive message:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Invalid session ID" } }
//! ```
//!
//! Codes: `bad_request` (400), `precondition_failed` (403), and
//! `generation_failed` (502). A question-generation failure mid-quiz ends
//! the session gracefully with an explanatory message instead of a raw
//! error.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend
//! can talk to the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::corpus;
use crate::generate;
use crate::index::{EmbeddingIndex, IndexStats};
use crate::session::{AnswerOutcome, QuizOutcome, QuizSession};
use crate::store::{SessionStore, SharedSession};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    index: Arc<EmbeddingIndex>,
    sessions: Arc<SessionStore>,
}

/// Start the quiz server.
///
/// Loads the corpus and builds (or cache-loads) the embedding index before
/// binding, so the first `/start` request never races the build.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let messages = corpus::load_messages(config)?;
    let index = EmbeddingIndex::build(config, &messages, false).await?;

    let stats = index.statistics(config);
    println!(
        "Index ready: {} chunks, {} vectors, model {}",
        stats.chunk_count, stats.vector_count, stats.model
    );

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        index: Arc::new(index),
        sessions: Arc::new(SessionStore::new()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/start", post(handle_start))
        .route("/answer", post(handle_answer))
        .route("/get-location", post(handle_get_location))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Quiz server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// 403 for operations whose precondition is not met, e.g. asking for the
/// location before passing the quiz.
fn precondition_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::FORBIDDEN,
        code: "precondition_failed".to_string(),
        message: message.into(),
    }
}

/// 502 when question generation fails and there is no session to end yet.
fn generation_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "generation_failed".to_string(),
        message: message.into(),
    }
}

/// Look up a session by its string id, mapping both parse failures and
/// unknown ids to the same client error.
fn find_session(state: &AppState, session_id: &str) -> Result<SharedSession, AppError> {
    let id = Uuid::parse_str(session_id).map_err(|_| bad_request("Invalid session ID"))?;
    state
        .sessions
        .get(&id)
        .ok_or_else(|| bad_request("Invalid session ID"))
}

// ============ POST /start ============

#[derive(Deserialize)]
struct StartRequest {
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    total_questions: Option<u32>,
}

#[derive(Serialize)]
struct StartResponse {
    session_id: Uuid,
    message: String,
    question: String,
    options: Vec<String>,
    current_question: u32,
    total_questions: u32,
    attempts_left: u32,
}

async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, AppError> {
    let user_name = req.user_name.unwrap_or_else(|| "Mi Amor".to_string());
    let total_questions = req
        .total_questions
        .unwrap_or(state.config.quiz.total_questions);
    if total_questions == 0 {
        return Err(bad_request("total_questions must be >= 1"));
    }

    let first = generate::generate(&state.index, &state.config, 1, &[])
        .await
        .map_err(|e| {
            tracing::error!("first question generation failed: {:#}", e);
            generation_failed(
                "Could not generate a question from the archive. Please try again shortly.",
            )
        })?;

    let session = QuizSession::new(
        &user_name,
        total_questions,
        state.config.quiz.max_attempts,
        first.clone(),
    );
    let max_attempts = session.max_attempts;
    let session_id = state.sessions.put(session);

    tracing::info!("session {} started for {}", session_id, user_name);

    let message = format!(
        "Hi {}!\n\nI prepared something special for you. Answer these {} questions \
         about our story and you'll discover something wonderful at the end.\n\n\
         Question 1 of {}:\n\n{}",
        user_name, total_questions, total_questions, first.text
    );

    Ok(Json(StartResponse {
        session_id,
        message,
        question: first.text,
        options: first.options,
        current_question: 1,
        total_questions,
        attempts_left: max_attempts,
    }))
}

// ============ POST /answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    session_id: String,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct AnswerResponse {
    message: String,
    options: Vec<String>,
    current_question: u32,
    total_questions: u32,
    /// Number of correctly answered questions so far.
    correct_answers: u32,
    is_correct: bool,
    completed: bool,
    attempts_left: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    question_skipped: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    hint_given: bool,
}

async fn handle_answer(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let shared = find_session(&state, &req.session_id)?;
    let mut session = shared.lock().await;

    if session.completed() {
        return Err(bad_request("Quiz already completed"));
    }

    let answer = req.message.trim();
    let outcome = session
        .process_answer(answer)
        .map_err(|e| bad_request(e.to_string()))?;

    let total_questions = session.total_questions;
    let max_attempts = session.max_attempts;

    let response = match outcome {
        AnswerOutcome::Correct {
            success_message,
            finished: Some(QuizOutcome::Passed),
        } => {
            tracing::info!(
                "session {} passed with {} correct",
                session.session_id,
                session.correct_count
            );
            AnswerResponse {
                message: format!(
                    "{}\n\nCongratulations! You completed the quiz with {} correct \
                     answers. You know our story so well.\n\nNow discover the special \
                     place I prepared for you...",
                    success_message, session.correct_count
                ),
                options: Vec::new(),
                current_question: session.current_question_number(),
                total_questions,
                correct_answers: session.correct_count,
                is_correct: true,
                completed: true,
                attempts_left: 0,
                question_skipped: false,
                hint_given: false,
            }
        }
        AnswerOutcome::Correct {
            success_message,
            finished: Some(QuizOutcome::Failed),
        } => AnswerResponse {
            message: format!(
                "{}\n\nYou did great, but too many questions had to be skipped this \
                 time. Don't worry — you can always try again.",
                success_message
            ),
            options: Vec::new(),
            current_question: session.current_question_number(),
            total_questions,
            correct_answers: session.correct_count,
            is_correct: true,
            completed: true,
            attempts_left: 0,
            question_skipped: false,
            hint_given: false,
        },
        AnswerOutcome::Correct {
            success_message,
            finished: None,
        } => {
            let generation_number = session.next_generation_number();
            let previous = session.previous_questions();

            match generate::generate(&state.index, &state.config, generation_number, &previous)
                .await
            {
                Ok(next) => {
                    session.push_question(next.clone());
                    let number = session.current_question_number();
                    AnswerResponse {
                        message: format!(
                            "{}\n\nQuestion {} of {}:\n\n{}",
                            success_message, number, total_questions, next.text
                        ),
                        options: next.options,
                        current_question: number,
                        total_questions,
                        correct_answers: session.correct_count,
                        is_correct: true,
                        completed: false,
                        attempts_left: max_attempts,
                        question_skipped: false,
                        hint_given: false,
                    }
                }
                Err(e) => end_session_on_generation_failure(&mut session, true, e),
            }
        }
        AnswerOutcome::Incorrect {
            hint,
            attempts_left,
        } => {
            let options = session
                .current_question()
                .map(|q| q.options.clone())
                .unwrap_or_default();
            AnswerResponse {
                message: format!(
                    "Mmm... that's not it.\n\nHint: {}\n\nYou have {} attempts left!",
                    hint, attempts_left
                ),
                // Options stay visible while the question is retried.
                options,
                current_question: session.current_question_number(),
                total_questions,
                correct_answers: session.correct_count,
                is_correct: false,
                completed: false,
                attempts_left,
                question_skipped: false,
                hint_given: true,
            }
        }
        AnswerOutcome::AttemptsExhausted { quiz_failed: true } => AnswerResponse {
            message: "You've used up all the available attempts.\n\nDon't worry, you can \
                      try again whenever you like."
                .to_string(),
            options: Vec::new(),
            current_question: session.current_question_number(),
            total_questions,
            correct_answers: session.correct_count,
            is_correct: false,
            completed: true,
            attempts_left: 0,
            question_skipped: true,
            hint_given: false,
        },
        AnswerOutcome::AttemptsExhausted { quiz_failed: false } => {
            let generation_number = session.next_generation_number();
            let previous = session.previous_questions();

            match generate::generate(&state.index, &state.config, generation_number, &previous)
                .await
            {
                Ok(replacement) => {
                    session.replace_current(replacement.clone());
                    let number = session.current_question_number();
                    AnswerResponse {
                        message: format!(
                            "Don't worry, let's try a different question.\n\n\
                             Question {} of {}:\n\n{}",
                            number, total_questions, replacement.text
                        ),
                        options: replacement.options,
                        current_question: number,
                        total_questions,
                        correct_answers: session.correct_count,
                        is_correct: false,
                        completed: false,
                        attempts_left: max_attempts,
                        question_skipped: true,
                        hint_given: false,
                    }
                }
                Err(e) => end_session_on_generation_failure(&mut session, false, e),
            }
        }
    };

    Ok(Json(response))
}

/// Close out a session whose next question could not be generated.
///
/// The quiz cannot continue without a question, so the session ends as
/// failed with an apologetic message instead of surfacing a raw error.
fn end_session_on_generation_failure(
    session: &mut QuizSession,
    last_answer_correct: bool,
    error: anyhow::Error,
) -> AnswerResponse {
    tracing::error!(
        "session {}: question generation failed, ending quiz: {:#}",
        session.session_id,
        error
    );
    session.end_with_failure();

    AnswerResponse {
        message: format!(
            "Something went wrong while preparing the next question, so we'll stop \
             here. You got {} answers right — not bad at all. Try again in a little \
             while!",
            session.correct_count
        ),
        options: Vec::new(),
        current_question: session.current_question_number(),
        total_questions: session.total_questions,
        correct_answers: session.correct_count,
        is_correct: last_answer_correct,
        completed: true,
        attempts_left: 0,
        question_skipped: false,
        hint_given: false,
    }
}

// ============ POST /get-location ============

#[derive(Deserialize)]
struct LocationRequest {
    session_id: String,
}

#[derive(Serialize)]
struct LocationResponse {
    latitude: f64,
    longitude: f64,
    address: String,
    message: String,
}

async fn handle_get_location(
    State(state): State<AppState>,
    Json(req): Json<LocationRequest>,
) -> Result<Json<LocationResponse>, AppError> {
    let shared = find_session(&state, &req.session_id)?;
    let session = shared.lock().await;

    match session.outcome {
        Some(QuizOutcome::Passed) => {
            let reveal = &state.config.reveal;
            Ok(Json(LocationResponse {
                latitude: reveal.latitude,
                longitude: reveal.longitude,
                address: reveal.address.clone(),
                message: reveal.message.clone(),
            }))
        }
        _ => Err(precondition_failed("Complete all questions first")),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    index: IndexStats,
    degraded_batches: usize,
    active_sessions: usize,
}

/// Liveness/readiness probe. Reports `degraded` (not an error status) when
/// the index was built with zero-vector placeholder batches.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.index.degraded_batches() > 0 {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        index: state.index.statistics(&state.config),
        degraded_batches: state.index.degraded_batches(),
        active_sessions: state.sessions.len(),
    })
}
