use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::sync::Arc;
use log::info;
use crate::timeline::TIMELINE_MARKER;

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"
You are BabyCheck AI. When a user messages you about their baby's health, milestones, or symptoms,
always generate a timeline event if applicable. The timeline event must be in the following JSON format:

TIMELINE_EVENT: {
  "id": "<unique-id>",
  "title": "<short title of event>",
  "description": "<detailed description>",
  "date": "<YYYY-MM-DD HH:mm>",
  "tags": ["tag1","tag2"],
  "severity": "low|medium|high"
}

Only include TIMELINE_EVENT if the message relates to the baby's health or milestones.
Otherwise, just respond normally.
"#;

#[derive(Debug)]
pub enum PromptError {
    Empty(String),
    MissingMarker(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::Empty(path) => write!(f, "System prompt in '{}' is empty", path),
            PromptError::MissingMarker(path) =>
                write!(f, "System prompt in '{}' never mentions {}", path, TIMELINE_MARKER),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
    #[serde(skip)]
    pub source: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            source: None,
        }
    }
}

impl PromptConfig {
    /// A custom instruction must still ask for the marker, otherwise the
    /// extractor never has anything to find.
    fn validate(&self, path: &str) -> Result<(), PromptError> {
        if self.system_prompt.trim().is_empty() {
            return Err(PromptError::Empty(path.to_string()));
        }
        if !self.system_prompt.contains(TIMELINE_MARKER) {
            return Err(PromptError::MissingMarker(path.to_string()));
        }
        Ok(())
    }
}

/// Reads `{"system_prompt": "..."}` from `path`.
pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(path)?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate(path)?;
    config.source = Some(path.to_string());
    Ok(Arc::new(config))
}

/// The prompt file when one is configured, otherwise the built-in instruction.
pub fn resolve_prompts(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(path) => {
            let config = load_prompts(path)?;
            info!("Loaded system prompt from '{}'", path);
            Ok(config)
        }
        None => Ok(Arc::new(PromptConfig::default())),
    }
}
