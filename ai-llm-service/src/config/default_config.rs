//! Default LLM configs loaded strictly from environment variables.
//!
//! Two roles are provided:
//!
//! - **Standard** → the regular report model
//! - **Deep**     → used when the caller asks for deep reasoning; same backend,
//!   optionally a stronger model and a larger output budget
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND` = provider kind (`ollama` or `openai`, default `ollama`)
//! - `LLM_MAX_TOKENS` = optional max tokens (u32)
//! - `LLM_TIMEOUT_SECS` = optional header/idle timeout (u64)
//! - `LLM_DEEP_MODEL` = optional model override for deep reasoning
//! - `LLM_DEEP_MAX_TOKENS` = optional max tokens for deep reasoning
//!
//! Ollama-specific:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (mandatory)
//! - `OLLAMA_MODEL`                = model (mandatory)
//!
//! OpenAI-specific:
//! - `OPENAI_URL`     = endpoint (default `https://api.openai.com`)
//! - `OPENAI_API_KEY` = API key (mandatory unless passed by the caller)
//! - `OPENAI_MODEL`   = model (default `gpt-4o-mini`)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, env_opt_u32, env_opt_u64, must_env, opt_env,
        validate_http_endpoint,
    },
};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Resolves the Ollama endpoint strictly from environment.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
///
/// # Errors
///
/// - [`ConfigError::MissingVar`] if both are missing
/// - [`ConfigError::InvalidNumber`] if `OLLAMA_PORT` is invalid
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Some(url) = opt_env("OLLAMA_URL") {
        validate_http_endpoint("OLLAMA_URL", url.trim())?;
        return Ok(url);
    }
    if let Some(port) = opt_env("OLLAMA_PORT") {
        let _ = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
        return Ok(format!("http://localhost:{}", port.trim()));
    }
    Err(AiLlmError::Config(ConfigError::MissingVar(
        "OLLAMA_URL or OLLAMA_PORT",
    )))
}

/// Constructs the **standard** report model config.
///
/// `api_key` overrides `OPENAI_API_KEY` when the caller supplies one.
///
/// # Defaults
/// - `temperature = Some(0.3)`
/// - `timeout_secs = Some(120)`
pub fn config_from_env(api_key: Option<String>) -> Result<LlmModelConfig, AiLlmError> {
    let provider: LlmProvider = opt_env("LLM_KIND")
        .unwrap_or_else(|| "ollama".to_string())
        .parse()?;
    let max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;
    let timeout_secs = env_opt_u64("LLM_TIMEOUT_SECS")?.or(Some(120));

    let cfg = match provider {
        LlmProvider::Ollama => LlmModelConfig {
            provider,
            model: must_env("OLLAMA_MODEL")?,
            endpoint: ollama_endpoint()?,
            api_key: None,
            max_tokens,
            temperature: Some(0.3),
            top_p: None,
            timeout_secs,
        },
        LlmProvider::OpenAI => {
            let endpoint = opt_env("OPENAI_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.into());
            validate_http_endpoint("OPENAI_URL", endpoint.trim())?;
            let api_key = match api_key.filter(|k| !k.trim().is_empty()) {
                Some(k) => k,
                None => must_env("OPENAI_API_KEY")?,
            };
            LlmModelConfig {
                provider,
                model: opt_env("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
                endpoint,
                api_key: Some(api_key),
                max_tokens,
                temperature: Some(0.3),
                top_p: None,
                timeout_secs,
            }
        }
    };

    cfg.validate()?;
    Ok(cfg)
}

/// Derives the **deep reasoning** config from the standard one.
///
/// # Env
/// - `LLM_DEEP_MODEL` (optional, defaults to the standard model)
/// - `LLM_DEEP_MAX_TOKENS` (optional, defaults to the standard budget)
///
/// # Defaults
/// - `temperature = Some(0.2)`
/// - `timeout_secs` doubled
pub fn deep_config_from(standard: &LlmModelConfig) -> Result<LlmModelConfig, AiLlmError> {
    let max_tokens = env_opt_u32("LLM_DEEP_MAX_TOKENS")?.or(standard.max_tokens);

    Ok(LlmModelConfig {
        model: opt_env("LLM_DEEP_MODEL").unwrap_or_else(|| standard.model.clone()),
        max_tokens,
        temperature: Some(0.2),
        timeout_secs: standard.timeout_secs.map(|s| s.saturating_mul(2)),
        ..standard.clone()
    })
}
