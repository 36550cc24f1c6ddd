use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3001")]
    pub server_addr: String,

    /// Directory with the built frontend. Unmatched GET paths fall back to its index.html.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<String>,

    // --- Chat LLM Provider Args ---
    /// Base URL for the Ollama API.
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = "http://localhost:11434")]
    pub ollama_base_url: String,

    /// Model used when a chat request does not name one.
    #[arg(long, env = "DEFAULT_MODEL", default_value = "llama3.2")]
    pub default_model: String,

    /// Seconds to wait for a chat completion. 0 waits indefinitely.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "0")]
    pub chat_timeout_secs: u64,

    /// Optional JSON file ({"system_prompt": "..."}) replacing the built-in instruction.
    #[arg(long, env = "SYSTEM_PROMPT_PATH")]
    pub system_prompt_path: Option<String>,

    // --- History Args ---
    /// Conversation id used when a chat request does not carry one.
    #[arg(long, env = "DEFAULT_CONVERSATION_ID", default_value = "default")]
    pub default_conversation_id: String,

    /// Messages kept per conversation, including the system instruction (minimum 3).
    #[arg(long, env = "MAX_HISTORY_MESSAGES", default_value = "21")]
    pub max_history_messages: usize,

    /// Conversations kept in memory before the least recently used is evicted. 0 means no limit.
    #[arg(long, env = "MAX_CONVERSATIONS", default_value = "0")]
    pub max_conversations: usize,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
