use async_trait::async_trait;
use babycheck_proxy::agent::{ AgentSettings, ChatAgent };
use babycheck_proxy::config::prompt::PromptConfig;
use babycheck_proxy::error::ProxyError;
use babycheck_proxy::llm::chat::ChatClient;
use babycheck_proxy::models::chat::ChatMessage;
use serde_json::Value;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };

/// Stand-in for Ollama. `reply: None` makes every chat call fail.
pub struct MockClient {
    pub calls: AtomicUsize,
    pub reply: Mutex<Option<String>>,
    pub available: bool,
    pub models: Option<Value>,
}

impl MockClient {
    pub fn replying(reply: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: Mutex::new(Some(reply.to_string())),
            available: true,
            models: Some(serde_json::json!({ "models": [{ "name": "llama3.2:latest" }] })),
        }
    }

    pub fn offline() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: Mutex::new(None),
            available: false,
            models: None,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for MockClient {
    async fn chat(&self, _model: &str, _messages: &[ChatMessage]) -> Result<String, ProxyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap().clone();
        reply.ok_or_else(|| ProxyError::BackendPayload("connection refused".into()))
    }

    async fn list_models(&self) -> Result<Value, ProxyError> {
        self.models.clone().ok_or_else(|| ProxyError::BackendPayload("connection refused".into()))
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

pub fn agent_with(client: Arc<MockClient>) -> Arc<ChatAgent> {
    Arc::new(ChatAgent::new(client, &PromptConfig::default(), AgentSettings::default()))
}
