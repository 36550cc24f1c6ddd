pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;
pub mod timeline;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Ollama Base URL: {}", args.ollama_base_url);
    info!("Default Model: {}", args.default_model);
    info!("Default Conversation: {}", args.default_conversation_id);
    info!("Max History Messages: {}", args.max_history_messages);
    if args.max_conversations > 0 {
        info!("Max Conversations: {}", args.max_conversations);
    } else {
        info!("Max Conversations: unbounded");
    }
    info!(
        "System Prompt: {}",
        args.system_prompt_path.as_deref().unwrap_or("built-in")
    );
    info!("Static Dir: {}", args.static_dir.as_deref().unwrap_or("none"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::from_args(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
