//! OpenAI (ChatGPT) streaming chat client.
//!
//! Endpoint derived from `LlmModelConfig::endpoint`:
//! - POST {endpoint}/v1/chat/completions with `stream: true`
//!
//! The answer arrives as server-sent events; see [`crate::stream`].
//!
//! Constructor validation:
//! - `cfg.provider` must be `LlmProvider::OpenAI`
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://

use std::time::Duration;

use reqwest::header;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, Provider, ProviderError, ProviderErrorKind},
    services::{ChatPrompt, DEFAULT_TIMEOUT, base_url, send_streaming},
    stream::{TextStream, WireFormat},
};

/// Thin streaming client for the OpenAI chat completions API.
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    timeout: Duration,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - [`AiLlmError::Provider`] with `InvalidProvider` if `cfg.provider` is not OpenAI
    /// - [`AiLlmError::Provider`] with `MissingApiKey` if `cfg.api_key` is `None`
    /// - [`AiLlmError::Provider`] with `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::OpenAI {
            return Err(
                ProviderError::new(Provider::OpenAI, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::new(Provider::OpenAI, ProviderErrorKind::MissingApiKey))?;

        let base = base_url(Provider::OpenAI, &cfg.endpoint)?;

        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
            ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::Decode(format!("invalid API key header: {e}")),
            )
        })?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("text/event-stream"),
        );

        // No total timeout: the body is streamed and bounded per chunk instead.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()?;

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = timeout.as_secs(),
            "OpenAiService initialized"
        );

        Ok(Self {
            client,
            url_chat: format!("{base}/v1/chat/completions"),
            cfg,
            timeout,
        })
    }

    /// Starts a streamed chat completion.
    ///
    /// When `prompt.schema` is set the request carries a strict
    /// `response_format: json_schema`.
    ///
    /// # Errors
    /// - [`AiLlmError::Timeout`] if headers do not arrive in time
    /// - [`AiLlmError::Provider`] with `HttpStatus` for non-2xx responses
    /// - [`AiLlmError::HttpTransport`] for client/network failures
    #[instrument(skip_all, fields(model = %self.cfg.model, json = prompt.schema.is_some()))]
    pub async fn stream_chat(&self, prompt: &ChatPrompt<'_>) -> Result<TextStream, AiLlmError> {
        let body = ChatCompletionRequest::from_cfg(&self.cfg, prompt);

        debug!(
            prompt_len = prompt.prompt.len(),
            system_len = prompt.system.len(),
            "POST {}", self.url_chat
        );

        let req = self.client.post(&self.url_chat).json(&body);
        let resp = send_streaming(Provider::OpenAI, req, &self.url_chat, self.timeout).await?;

        Ok(TextStream::new(
            resp,
            WireFormat::Sse,
            Provider::OpenAI,
            self.timeout,
        ))
    }

    pub fn config(&self) -> &LlmModelConfig {
        &self.cfg
    }
}

/// Request body for `/v1/chat/completions` (streaming).
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, prompt: &ChatPrompt<'a>) -> Self {
        let response_format = prompt.schema.map(|schema| {
            json!({
                "type": "json_schema",
                "json_schema": { "name": "repository_report", "strict": true, "schema": schema }
            })
        });

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
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
            response_format,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}
