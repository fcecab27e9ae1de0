//! HTTP API gateway for repolens.
//!
//! Exposes `POST /api/ask_repo` for questions and `GET /healthz` for
//! liveness. The gateway is stateless: every request gets a fresh
//! reasoning loop from the shared [`RequestHandler`], and a client that
//! disconnects drops the in-flight loop with its future.
//!
//! Built on Axum.

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use repolens_agent::{HandlerError, LoopOutcome, RequestHandler};
use repolens_config::{AppConfig, GatewayConfig};
use repolens_core::ErrorKind;
use repolens_core::message::ConversationTurn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to start request handler: {0}")]
    Handler(#[from] HandlerError),

    #[error("invalid CORS origin: {0}")]
    InvalidOrigin(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared application state: the request handler and nothing mutable.
pub struct GatewayState {
    pub handler: RequestHandler,
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with CORS, the body limit and HTTP tracing applied.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Result<Router, GatewayError> {
    let cors = cors_layer(&config.allowed_origins)?;
    Ok(Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/ask_repo", post(ask_repo_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http()))
}

/// CORS from the configured origins. An empty list allows no
/// cross-origin access; `*` allows any origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, GatewayError> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    if origins.is_empty() {
        return Ok(layer);
    }
    if origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(AllowOrigin::any()));
    }
    let values = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o.trim_end_matches('/'))
                .map_err(|_| GatewayError::InvalidOrigin(o.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(values)))
}

/// Start the gateway HTTP server.
///
/// Credentials are checked here, before binding: a process without
/// them never serves.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let handler = RequestHandler::from_config(&config)?;
    let app = build_router(Arc::new(GatewayState { handler }), &config.gateway)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| GatewayError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(
        addr = %addr,
        origins = config.gateway.allowed_origins.len(),
        "Gateway listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Service is running",
    })
}

#[derive(Debug, Deserialize)]
pub struct AskRepoRequest {
    pub user_prompt: String,
    pub repo_name: String,
    #[serde(default)]
    pub chat_history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
pub struct AskRepoResponse {
    pub user_prompt: String,
    pub agent_response: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn ask_repo_handler(
    State(state): State<SharedState>,
    payload: Result<Json<AskRepoRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "Rejected malformed request body");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    info!(
        repo = %request.repo_name,
        history_turns = request.chat_history.len(),
        prompt_len = request.user_prompt.len(),
        "ask_repo request"
    );

    match state
        .handler
        .ask_repo(
            &request.repo_name,
            &request.user_prompt,
            &request.chat_history,
        )
        .await
    {
        Ok(outcome) => outcome_response(request.user_prompt, outcome),
        Err(e) if e.is_bad_request() => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            tracing::error!(error = %e, "ask_repo failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Map a finished loop onto the wire. Failures the user can read about
/// stay 200; an unreachable LLM or a rejected GitHub token is an
/// upstream failure.
fn outcome_response(user_prompt: String, outcome: LoopOutcome) -> Response {
    let status = match outcome.error() {
        Some(ErrorKind::LlmUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
        Some(ErrorKind::Unauthorized) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };
    info!(
        status = status.as_u16(),
        iterations = outcome.iterations,
        error = ?outcome.error(),
        incomplete = outcome.incomplete,
        "ask_repo finished"
    );
    if status != StatusCode::OK {
        return error_response(status, outcome.answer);
    }
    Json(AskRepoResponse {
        user_prompt,
        agent_response: outcome.answer,
        incomplete: outcome.incomplete,
    })
    .into_response()
}
