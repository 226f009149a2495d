//! Thin HTTP transport over the session surface.
//!
//! The router maps endpoints one-to-one onto [`SessionOrchestrator`]
//! operations and keeps no orchestration logic of its own.
//!
//! ## Endpoints
//!
//! - `POST /api/chat` — one typed turn
//! - `POST /api/voice` — one spoken turn (base64 WAV in JSON)
//! - `GET /health` — runtime health probe
//! - `GET /api/models` — models the runtime serves
//! - `GET /api/mode` / `POST /api/mode` — interaction mode
//! - `POST /api/history/clear` — reset the conversation
//! - `GET /api/stats` — history observability snapshot
//! - `GET /api/welcome` — persona greeting for a new client

use crate::config::ServerConfig;
use crate::context::HistoryStats;
use crate::error::{AssistantError, Result};
use crate::mode::SessionMode;
use crate::session::SessionOrchestrator;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// ── DTOs ───────────────────────────────────────────────────────

/// One typed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    /// The user's message.
    pub message: String,
}

/// Reply to a typed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    /// Persona-styled reply text.
    pub response: String,
    /// Always `"success"` for a delivered reply.
    pub status: String,
}

/// One spoken turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceTurnRequest {
    /// Base64-encoded WAV audio.
    pub audio: String,
}

/// Reply to a spoken turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceTurnResponse {
    /// Persona-styled reply text.
    pub response: String,
    /// Base64-encoded WAV audio of the reply.
    pub audio: String,
}

/// Health probe result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"healthy"` or `"degraded"`.
    pub status: String,
    /// Human-readable runtime state.
    pub runtime: String,
    /// Operator-facing summary line.
    pub message: String,
}

/// Model listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Model names the runtime serves (empty when unreachable).
    pub models: Vec<String>,
    /// Failure detail when the listing could not be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Explicit mode switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeRequest {
    /// Requested mode: `"voice"` or `"chat"`.
    pub mode: String,
}

/// Current mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeResponse {
    /// The session's interaction mode.
    pub mode: SessionMode,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `"ok"`.
    pub status: String,
}

/// Persona greeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    /// A welcome-pool line.
    pub message: String,
}

/// Error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable failure detail.
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: &AssistantError) -> ApiError {
    let status = match err {
        AssistantError::UserInputEmpty | AssistantError::InvalidModeRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        AssistantError::ModelTimeout(_) => StatusCode::REQUEST_TIMEOUT,
        AssistantError::ModelUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ── Router ─────────────────────────────────────────────────────

/// Build the transport router over an orchestrator.
pub fn router(orchestrator: Arc<SessionOrchestrator>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_turn))
        .route("/api/voice", post(voice_turn))
        .route("/health", get(health))
        .route("/api/models", get(models))
        .route("/api/mode", get(get_mode).post(set_mode))
        .route("/api/history/clear", post(clear_history))
        .route("/api/stats", get(stats))
        .route("/api/welcome", get(welcome))
        .with_state(orchestrator)
}

/// Bind and serve until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(config: &ServerConfig, orchestrator: Arc<SessionOrchestrator>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, router(orchestrator)).await?;
    Ok(())
}

// ── Handlers ───────────────────────────────────────────────────

async fn chat_turn(
    State(orchestrator): State<Arc<SessionOrchestrator>>,
    Json(request): Json<ChatTurnRequest>,
) -> std::result::Result<Json<ChatTurnResponse>, ApiError> {
    let response = orchestrator
        .submit_text_turn(&request.message)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(ChatTurnResponse {
        response,
        status: "success".to_owned(),
    }))
}

async fn voice_turn(
    State(orchestrator): State<Arc<SessionOrchestrator>>,
    Json(request): Json<VoiceTurnRequest>,
) -> std::result::Result<Json<VoiceTurnResponse>, ApiError> {
    let audio = BASE64.decode(&request.audio).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("invalid base64 audio: {e}"),
            }),
        )
    })?;

    let (response, reply_audio) = orchestrator
        .submit_audio_turn(&audio)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(VoiceTurnResponse {
        response,
        audio: BASE64.encode(reply_audio),
    }))
}

async fn health(State(orchestrator): State<Arc<SessionOrchestrator>>) -> Json<HealthResponse> {
    let runtime = orchestrator.health().await;
    let status = if runtime.is_healthy() {
        "healthy"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status: status.to_owned(),
        runtime: runtime.to_string(),
        message: "Aria backend is operational".to_owned(),
    })
}

async fn models(State(orchestrator): State<Arc<SessionOrchestrator>>) -> Json<ModelsResponse> {
    match orchestrator.list_models().await {
        Ok(models) => Json(ModelsResponse {
            models,
            error: None,
        }),
        Err(e) => Json(ModelsResponse {
            models: Vec::new(),
            error: Some(e.to_string()),
        }),
    }
}

async fn get_mode(State(orchestrator): State<Arc<SessionOrchestrator>>) -> Json<ModeResponse> {
    Json(ModeResponse {
        mode: orchestrator.get_mode().await,
    })
}

async fn set_mode(
    State(orchestrator): State<Arc<SessionOrchestrator>>,
    Json(request): Json<ModeRequest>,
) -> std::result::Result<Json<ModeResponse>, ApiError> {
    let target: SessionMode = request.mode.parse().map_err(|e: AssistantError| api_error(&e))?;
    orchestrator.switch_mode(target).await;
    Ok(Json(ModeResponse {
        mode: orchestrator.get_mode().await,
    }))
}

async fn clear_history(
    State(orchestrator): State<Arc<SessionOrchestrator>>,
) -> Json<StatusResponse> {
    orchestrator.clear_history().await;
    Json(StatusResponse {
        status: "ok".to_owned(),
    })
}

async fn stats(State(orchestrator): State<Arc<SessionOrchestrator>>) -> Json<HistoryStats> {
    Json(orchestrator.get_stats().await)
}

async fn welcome(State(orchestrator): State<Arc<SessionOrchestrator>>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: orchestrator.welcome(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::AssistantConfig;
    use crate::context::ChatMessage;
    use crate::llm::{ChatBackend, HealthStatus};
    use crate::persona::PersonaFilter;
    use crate::speech::SpeechPipeline;
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn generate(&self, context: &[ChatMessage]) -> crate::error::Result<String> {
            let last = context.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("echo: {last}"))
        }

        async fn health(&self) -> HealthStatus {
            HealthStatus::Healthy
        }

        async fn list_models(&self) -> crate::error::Result<Vec<String>> {
            Ok(vec!["llama3.2:3b".to_owned()])
        }
    }

    async fn spawn_server() -> String {
        let config = AssistantConfig::default();
        let orchestrator = Arc::new(crate::session::SessionOrchestrator::with_parts(
            &config,
            Arc::new(EchoBackend),
            PersonaFilter::with_seed(23),
            SpeechPipeline::new(config.speech.clone()),
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(orchestrator)).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn chat_endpoint_round_trip() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let response: ChatTurnResponse = client
            .post(format!("{base}/api/chat"))
            .json(&ChatTurnRequest {
                message: "ping".to_owned(),
            })
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response.status, "success");
        assert!(response.response.to_lowercase().contains("ping"));
    }

    #[tokio::test]
    async fn chat_endpoint_rejects_empty() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let status = client
            .post(format!("{base}/api/chat"))
            .json(&ChatTurnRequest {
                message: "  ".to_owned(),
            })
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_endpoint_reports_healthy() {
        let base = spawn_server().await;
        let response: HealthResponse = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn mode_endpoints_round_trip() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let current: ModeResponse = reqwest::get(format!("{base}/api/mode"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(current.mode, SessionMode::Voice);

        let switched: ModeResponse = client
            .post(format!("{base}/api/mode"))
            .json(&ModeRequest {
                mode: "chat".to_owned(),
            })
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(switched.mode, SessionMode::Chat);

        let invalid = client
            .post(format!("{base}/api/mode"))
            .json(&ModeRequest {
                mode: "hologram".to_owned(),
            })
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(invalid, reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stats_and_clear_round_trip() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        client
            .post(format!("{base}/api/chat"))
            .json(&ChatTurnRequest {
                message: "hello world".to_owned(),
            })
            .send()
            .await
            .unwrap();

        let stats: HistoryStats = reqwest::get(format!("{base}/api/stats"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats.count, 1);

        let cleared: StatusResponse = client
            .post(format!("{base}/api/history/clear"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cleared.status, "ok");

        let stats: HistoryStats = reqwest::get(format!("{base}/api/stats"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats.count, 0);
    }

    #[tokio::test]
    async fn models_and_welcome_endpoints() {
        let base = spawn_server().await;

        let models: ModelsResponse = reqwest::get(format!("{base}/api/models"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(models.models, vec!["llama3.2:3b"]);
        assert!(models.error.is_none());

        let welcome: WelcomeResponse = reqwest::get(format!("{base}/api/welcome"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!welcome.message.is_empty());
    }
}
