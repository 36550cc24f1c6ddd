use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::error::ProxyError;
use crate::history::{ ConversationStore, StoreLimits };
use crate::llm::chat::{ ChatClient, new_client as new_chat_client };
use crate::llm::LlmConfig;
use crate::models::chat::{ ChatMessage, ChatRequest, ChatResponse };
use crate::timeline::extract_timeline_event;

use log::{ debug, error, info };
use serde_json::Value as JsonValue;
use std::error::Error;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    Connected,
    Disconnected,
}

impl BackendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendStatus::Connected => "connected",
            BackendStatus::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub default_model: String,
    pub default_conversation_id: String,
    pub limits: StoreLimits,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            default_model: "llama3.2".to_string(),
            default_conversation_id: "default".to_string(),
            limits: StoreLimits::default(),
        }
    }
}

/// Runs chat turns against the completion backend and owns every
/// conversation's history.
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    history: ConversationStore,
    default_model: String,
    default_conversation_id: String,
}

impl ChatAgent {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        prompt_config: &PromptConfig,
        settings: AgentSettings
    ) -> Self {
        Self {
            chat_client,
            history: ConversationStore::new(prompt_config.system_prompt.as_str(), settings.limits),
            default_model: settings.default_model,
            default_conversation_id: settings.default_conversation_id,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig::from_timeout_secs(
            Some(args.ollama_base_url.clone()),
            args.chat_timeout_secs
        );
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: BaseURL={:?}, DefaultModel={}, Timeout={:?}",
            chat_client.get_base_url().as_deref().unwrap_or("adapter default"),
            args.default_model,
            chat_config.request_timeout
        );

        let prompt_config = prompt::resolve_prompts(args.system_prompt_path.as_deref())?;
        info!("System prompt: {}", prompt_config.source.as_deref().unwrap_or("built-in"));
        let settings = AgentSettings {
            default_model: args.default_model.clone(),
            default_conversation_id: args.default_conversation_id.clone(),
            limits: StoreLimits {
                max_messages: args.max_history_messages,
                max_conversations: args.max_conversations,
            },
        };

        Ok(Self::new(chat_client, &prompt_config, settings))
    }

    pub fn history(&self) -> &ConversationStore {
        &self.history
    }

    /// One request/response cycle.
    ///
    /// The conversation stays locked for the whole turn. If the backend call
    /// fails the user message is kept and no assistant message is added, so a
    /// retry on the same id resends the right context.
    pub async fn chat_turn(&self, request: ChatRequest) -> Result<ChatResponse, ProxyError> {
        let message = match request.message {
            Some(m) if !m.trim().is_empty() => m,
            _ => {
                return Err(ProxyError::EmptyMessage);
            }
        };
        let conversation_id = request.conversation_id
            .unwrap_or_else(|| self.default_conversation_id.clone());
        let model = request.model.unwrap_or_else(|| self.default_model.clone());

        let mut conversation = self.history.begin_turn(&conversation_id).await;
        conversation.append(ChatMessage::user(message));
        debug!(
            "Conversation '{}': sending {} messages to model {}",
            conversation_id,
            conversation.len(),
            model
        );

        let raw = match self.chat_client.chat(&model, conversation.messages()).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Chat completion failed for conversation '{}': {}", conversation_id, e);
                return Err(e);
            }
        };

        let extraction = extract_timeline_event(&raw);
        if let Some(event) = &extraction.event {
            info!("Conversation '{}': timeline event '{}' ({})", conversation_id, event.title, event.id);
        }

        conversation.append(ChatMessage::assistant(extraction.text.clone()));
        conversation.trim();

        Ok(ChatResponse {
            response: extraction.text,
            conversation_id,
            timeline_event: extraction.event,
        })
    }

    pub async fn clear_conversation(&self, conversation_id: &str) {
        match self.history.clear(conversation_id).await {
            Some(started) => {
                info!("Cleared conversation '{}' (started {})", conversation_id, started.to_rfc3339());
            }
            None => debug!("Clear requested for unknown conversation '{}'", conversation_id),
        }
    }

    pub async fn backend_status(&self) -> BackendStatus {
        if self.chat_client.is_available().await {
            BackendStatus::Connected
        } else {
            BackendStatus::Disconnected
        }
    }

    pub async fn list_models(&self) -> Result<JsonValue, ProxyError> {
        self.chat_client.list_models().await.map_err(|e| {
            error!("Failed to fetch models: {}", e);
            e
        })
    }
}
