//! Ollama streaming chat client.
//!
//! - `POST {endpoint}/api/chat` with `stream: true`, answered with NDJSON
//!   lines of `{ "message": { "content": .. }, "done": bool }`
//!
//! A JSON schema, when given, is passed through the `format` field.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, Provider, ProviderError, ProviderErrorKind},
    services::{ChatPrompt, DEFAULT_TIMEOUT, base_url, send_streaming},
    stream::{TextStream, WireFormat},
};

/// Thin streaming client for a local Ollama runtime.
#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    timeout: Duration,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not `Ollama`
    /// - `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(
                ProviderError::new(Provider::Ollama, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let base = base_url(Provider::Ollama, &cfg.endpoint)?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        info!(model = %cfg.model, endpoint = %cfg.endpoint, "OllamaService initialized");

        Ok(Self {
            client,
            url_chat: format!("{base}/api/chat"),
            cfg,
            timeout,
        })
    }

    /// Starts a streamed chat via `/api/chat`.
    ///
    /// Mapped options:
    /// - `num_predict`  ← `self.cfg.max_tokens`
    /// - `temperature`  ← `self.cfg.temperature`
    /// - `top_p`        ← `self.cfg.top_p`
    #[instrument(skip_all, fields(model = %self.cfg.model, json = prompt.schema.is_some()))]
    pub async fn stream_chat(&self, prompt: &ChatPrompt<'_>) -> Result<TextStream, AiLlmError> {
        let body = ChatRequest::from_cfg(&self.cfg, prompt);

        debug!(prompt_len = prompt.prompt.len(), "POST {}", self.url_chat);

        let req = self.client.post(&self.url_chat).json(&body);
        let resp = send_streaming(Provider::Ollama, req, &self.url_chat, self.timeout).await?;

        Ok(TextStream::new(
            resp,
            WireFormat::Ndjson,
            Provider::Ollama,
            self.timeout,
        ))
    }

    pub fn config(&self) -> &LlmModelConfig {
        &self.cfg
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
    options: ChatOptions,
}

impl<'a> ChatRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, prompt: &ChatPrompt<'a>) -> Self {
        Self {
            model: &cfg.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt.prompt,
                },
            ],
            stream: true,
            format: prompt.schema,
            options: ChatOptions {
                temperature: cfg.temperature,
                top_p: cfg.top_p,
                num_predict: cfg.max_tokens,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Subset of Ollama `options`.
#[derive(Debug, Default, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}
