//! Shared LLM service with two profiles: `standard` and `deep`.
//!
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Provider clients are built eagerly, so a bad config fails at startup.
//! - If the `deep` profile is not provided, it falls back to `standard`.
//!
//! # Example
//! ```no_run
//! use ai_llm_service::service_profiles::{LlmServiceProfiles, Profile};
//! use ai_llm_service::services::ChatPrompt;
//!
//! # async fn run() -> Result<(), ai_llm_service::error_handler::AiLlmError> {
//! let svc = LlmServiceProfiles::from_env(None)?;
//! let stream = svc
//!     .stream_chat(Profile::Standard, &ChatPrompt::new("You are terse.", "Hello"))
//!     .await?;
//! println!("{}", stream.collect_text().await?);
//! # Ok(()) }
//! ```

use tracing::debug;

use crate::{
    config::{
        default_config::{config_from_env, deep_config_from},
        llm_model_config::LlmModelConfig,
        llm_provider::LlmProvider,
    },
    error_handler::AiLlmError,
    services::{ChatPrompt, ollama_service::OllamaService, open_ai_service::OpenAiService},
    stream::TextStream,
};

/// Logical model profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Regular reports.
    Standard,
    /// Deep reasoning: larger budgets, possibly a stronger model.
    Deep,
}

/// A configured provider client.
#[derive(Debug)]
pub enum LlmClient {
    Ollama(OllamaService),
    OpenAI(OpenAiService),
}

impl LlmClient {
    /// Builds the client matching `cfg.provider`.
    pub fn from_config(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        cfg.validate()?;
        match cfg.provider {
            LlmProvider::Ollama => Ok(Self::Ollama(OllamaService::new(cfg)?)),
            LlmProvider::OpenAI => Ok(Self::OpenAI(OpenAiService::new(cfg)?)),
        }
    }

    /// Starts a streamed chat completion.
    pub async fn stream_chat(&self, prompt: &ChatPrompt<'_>) -> Result<TextStream, AiLlmError> {
        match self {
            Self::Ollama(s) => s.stream_chat(prompt).await,
            Self::OpenAI(s) => s.stream_chat(prompt).await,
        }
    }

    pub fn config(&self) -> &LlmModelConfig {
        match self {
            Self::Ollama(s) => s.config(),
            Self::OpenAI(s) => s.config(),
        }
    }
}

/// Shared service holding the **standard** and **deep** clients.
#[derive(Debug)]
pub struct LlmServiceProfiles {
    standard: LlmClient,
    deep: Option<LlmClient>,
}

impl LlmServiceProfiles {
    /// Creates the service from explicit configs.
    ///
    /// `deep` falls back to `standard` when `None`.
    pub fn new(
        standard: LlmModelConfig,
        deep: Option<LlmModelConfig>,
    ) -> Result<Self, AiLlmError> {
        Ok(Self {
            standard: LlmClient::from_config(standard)?,
            deep: deep.map(LlmClient::from_config).transpose()?,
        })
    }

    /// Reads both profiles from the environment.
    ///
    /// `api_key` overrides `OPENAI_API_KEY` when present.
    pub fn from_env(api_key: Option<String>) -> Result<Self, AiLlmError> {
        let standard = config_from_env(api_key)?;
        let deep = deep_config_from(&standard)?;
        debug!(
            provider = ?standard.provider,
            standard_model = %standard.model,
            deep_model = %deep.model,
            "LLM profiles loaded"
        );
        Self::new(standard, Some(deep))
    }

    /// Returns the client for a profile.
    pub fn client(&self, profile: Profile) -> &LlmClient {
        match profile {
            Profile::Standard => &self.standard,
            Profile::Deep => self.deep.as_ref().unwrap_or(&self.standard),
        }
    }

    /// Starts a streamed chat completion on the given profile.
    pub async fn stream_chat(
        &self,
        profile: Profile,
        prompt: &ChatPrompt<'_>,
    ) -> Result<TextStream, AiLlmError> {
        self.client(profile).stream_chat(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ollama(model: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: model.into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            max_tokens: None,
            temperature: Some(0.3),
            top_p: None,
            timeout_secs: Some(30),
        }
    }

    #[test]
    fn deep_falls_back_to_standard() {
        let svc = LlmServiceProfiles::new(ollama("small"), None).unwrap();
        assert_eq!(svc.client(Profile::Deep).config().model, "small");

        let svc = LlmServiceProfiles::new(ollama("small"), Some(ollama("large"))).unwrap();
        assert_eq!(svc.client(Profile::Standard).config().model, "small");
        assert_eq!(svc.client(Profile::Deep).config().model, "large");
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        assert!(LlmServiceProfiles::new(ollama(" "), None).is_err());
    }

    #[test]
    fn deep_profile_derivation() {
        let deep = deep_config_from(&ollama("m")).unwrap();
        assert_eq!(deep.temperature, Some(0.2));
        assert_eq!(deep.timeout_secs, Some(60));
    }
}
