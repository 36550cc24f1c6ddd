pub mod chat;

use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    /// Upper bound on a single chat completion. `None` waits as long as the
    /// backend takes.
    pub request_timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: None,
        }
    }
}

impl LlmConfig {
    pub fn from_timeout_secs(base_url: Option<String>, timeout_secs: u64) -> Self {
        Self {
            base_url,
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }
}
