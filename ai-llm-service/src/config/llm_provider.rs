use std::str::FromStr;

use crate::error_handler::ConfigError;

/// Represents the provider (backend) used for large language model (LLM) inference.
///
/// This enum distinguishes between the local Ollama runtime and any
/// OpenAI-compatible chat completions API.
///
/// # Examples
///
/// ```
/// use ai_llm_service::config::llm_provider::LlmProvider;
///
/// let provider: LlmProvider = "ollama".parse().unwrap();
/// assert_eq!(provider, LlmProvider::Ollama);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Local Ollama runtime for on-device inference.
    Ollama,
    /// OpenAI's chat completions API (or a compatible gateway).
    OpenAI,
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "chatgpt" => Ok(Self::OpenAI),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}
