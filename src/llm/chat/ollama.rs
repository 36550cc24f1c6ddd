use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use serde_json::Value;
use async_trait::async_trait;
use std::time::Duration;
use super::ChatClient;
use crate::error::ProxyError;
use crate::llm::{ LlmConfig, DEFAULT_OLLAMA_URL };
use crate::models::chat::ChatMessage;
use log::{ debug, warn };

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, request_timeout: Option<Duration>) -> Result<Self, ProxyError> {
        let url = base_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.into());
        let mut builder = HttpClient::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProxyError> {
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProxyError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ProxyError::BackendStatus { status, body })
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ProxyError> {
        let req = ChatRequest {
            model,
            messages,
            stream: false,
        };
        debug!("POST {} model={} messages={}", self.url("/api/chat"), model, messages.len());

        let resp = self.http.post(self.url("/api/chat")).json(&req).send().await?;
        let data = Self::check_status(resp).await?.json::<ChatResponse>().await?;

        data.message
            .map(|m| m.content)
            .ok_or_else(|| ProxyError::BackendPayload("response has no message".into()))
    }

    async fn list_models(&self) -> Result<Value, ProxyError> {
        let resp = self.http.get(self.url("/api/tags")).send().await?;
        Ok(Self::check_status(resp).await?.json::<Value>().await?)
    }

    async fn is_available(&self) -> bool {
        match self.http.get(self.url("/api/tags")).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("Ollama at {} is unreachable: {}", self.base_url, e);
                false
            }
        }
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{ http::StatusCode, routing::{ get, post }, Json, Router };
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn_backend(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(url: String) -> OllamaClient {
        OllamaClient::new(Some(url), None).unwrap()
    }

    #[tokio::test]
    async fn chat_sends_history_and_reads_message_content() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "llama3.2");
                assert_eq!(body["stream"], false);
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "hello");
                Json(json!({ "message": { "role": "assistant", "content": "hi there" }, "done": true }))
            })
        );
        let url = spawn_backend(app).await;

        let history = vec![ChatMessage::system("be kind"), ChatMessage::user("hello")];
        let reply = client(url).chat("llama3.2", &history).await.unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn chat_reports_error_status() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async { (StatusCode::NOT_FOUND, "model 'nope' not found") })
        );
        let url = spawn_backend(app).await;

        let err = client(url).chat("nope", &[ChatMessage::user("hi")]).await.unwrap_err();
        match err {
            ProxyError::BackendStatus { status, body } => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert!(body.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_without_message_is_a_payload_error() {
        let app = Router::new().route("/api/chat", post(|| async { Json(json!({ "done": true })) }));
        let url = spawn_backend(app).await;

        let err = client(url).chat("m", &[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ProxyError::BackendPayload(_)));
    }

    #[tokio::test]
    async fn list_models_passes_body_through() {
        let app = Router::new().route(
            "/api/tags",
            get(|| async { Json(json!({ "models": [{ "name": "llama3.2:latest" }] })) })
        );
        let url = spawn_backend(app).await;

        let models = client(url).list_models().await.unwrap();
        assert_eq!(models["models"][0]["name"], "llama3.2:latest");
    }

    #[tokio::test]
    async fn availability_follows_tags_status() {
        let up = spawn_backend(Router::new().route("/api/tags", get(|| async { "{}" }))).await;
        assert!(client(up).is_available().await);

        let broken = spawn_backend(
            Router::new().route("/api/tags", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        ).await;
        assert!(!client(broken).is_available().await);
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable_not_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let c = client(format!("http://{}", addr));
        assert!(!c.is_available().await);
        assert!(matches!(c.chat("m", &[]).await, Err(ProxyError::Backend(_))));
    }

    #[test]
    fn trailing_slash_is_dropped() {
        let c = client("http://localhost:11434/".into());
        assert_eq!(c.get_base_url().as_deref(), Some("http://localhost:11434"));
    }
}
