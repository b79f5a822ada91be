use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{ConfigError, Result, validate_http_endpoint, validate_range_f32};

/// Configuration for an LLM model invocation.
///
/// # Fields
///
/// - `provider`: Which LLM provider/backend to use (Ollama or OpenAI).
/// - `model`: The model identifier (e.g., `"gpt-4o-mini"`, `"qwen3:14b"`).
/// - `endpoint`: Base URL of the inference server (no path).
/// - `api_key`: Optional API key for providers that require authentication.
/// - `max_tokens`: Maximum number of tokens to generate (if supported).
/// - `temperature`: Controls randomness (0.0 = deterministic, >1.0 = more random).
/// - `top_p`: Nucleus sampling cutoff (alternative to temperature).
/// - `timeout_secs`: Deadline for the response headers and for every gap
///   between two streamed chunks.
///
/// # Examples
///
/// ```
/// use ai_llm_service::config::llm_model_config::LlmModelConfig;
/// use ai_llm_service::config::llm_provider::LlmProvider;
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::OpenAI,
///     model: "gpt-4o-mini".to_string(),
///     endpoint: "https://api.openai.com".to_string(),
///     api_key: Some("sk-...".to_string()),
///     max_tokens: Some(2048),
///     temperature: Some(0.4),
///     top_p: None,
///     timeout_secs: Some(60),
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string.
    pub model: String,

    /// Inference endpoint (local server or remote API base URL).
    pub endpoint: String,

    /// Optional API key for authentication (e.g., OpenAI).
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature (controls creativity).
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Optional header/idle timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Checks model name, endpoint scheme and sampling ranges.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        validate_http_endpoint("endpoint", self.endpoint.trim())?;
        if let Some(t) = self.temperature {
            validate_range_f32("temperature", t, 0.0, 2.0)?;
        }
        if let Some(p) = self.top_p {
            validate_range_f32("top_p", p, 0.0, 1.0)?;
        }
        Ok(())
    }
}
