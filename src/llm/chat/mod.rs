pub mod ollama;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use super::LlmConfig;
use self::ollama::OllamaClient;
use crate::error::ProxyError;
use crate::models::chat::ChatMessage;

/// The completion backend a chat turn talks to.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends the full ordered history and returns the assistant's reply text.
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ProxyError>;

    /// The backend's model listing, passed through as-is.
    async fn list_models(&self) -> Result<Value, ProxyError>;

    /// Whether the backend answers right now. Never fails.
    async fn is_available(&self) -> bool;

    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ProxyError> {
    let client: Arc<dyn ChatClient> = Arc::new(OllamaClient::from_config(config)?);
    Ok(client)
}
