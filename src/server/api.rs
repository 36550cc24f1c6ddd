use crate::agent::ChatAgent;
use crate::error::ProxyError;
use crate::models::chat::{ ChatRequest, ChatResponse };
use std::path::Path;
use std::sync::Arc;
use axum::{
    routing::{ delete, get, post },
    Json,
    Router,
    extract::{ Path as UrlPath, State, rejection::JsonRejection },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tower_http::cors::{ Any, CorsLayer };
use tower_http::services::{ ServeDir, ServeFile };
use log::{ info, warn };

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    details: Option<String>,
}

impl ApiError {
    fn bad_request(error: &'static str, details: Option<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error, details }
    }

    fn backend(error: &'static str, source: ProxyError) -> Self {
        Self { status: StatusCode::BAD_GATEWAY, error, details: Some(source.to_string()) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: self.error, details: self.details };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct ClearResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    ollama: &'static str,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<ChatAgent>,
}

/// The JSON API, plus the built frontend when `static_dir` is given.
pub fn router(agent: Arc<ChatAgent>, static_dir: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/{conversation_id}", delete(clear_handler))
        .route("/api/health", get(health_handler))
        .route("/api/models", get(models_handler))
        .layer(cors)
        .with_state(AppState { agent });

    match static_dir {
        Some(dir) => {
            let index = Path::new(dir).join("index.html");
            info!("Serving frontend from '{}'", dir);
            app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => app,
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!("Rejected chat request body: {}", rejection);
        ApiError::bad_request("Invalid request body", Some(rejection.body_text()))
    })?;

    match state.agent.chat_turn(req).await {
        Ok(resp) => Ok(Json(resp)),
        Err(ProxyError::EmptyMessage) => Err(ApiError::bad_request("Message is required", None)),
        Err(e) => Err(ApiError::backend("Failed to get response from AI", e)),
    }
}

async fn clear_handler(
    State(state): State<AppState>,
    UrlPath(conversation_id): UrlPath<String>,
) -> Json<ClearResponse> {
    state.agent.clear_conversation(&conversation_id).await;
    Json(ClearResponse { message: "Conversation history cleared" })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend = state.agent.backend_status().await;
    Json(HealthResponse { status: "ok", ollama: backend.as_str() })
}

async fn models_handler(State(state): State<AppState>) -> Result<Json<JsonValue>, ApiError> {
    state.agent
        .list_models().await
        .map(Json)
        .map_err(|e| ApiError::backend("Failed to fetch models", e))
}
