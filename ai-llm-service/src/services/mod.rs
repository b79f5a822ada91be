//! Provider clients for streamed chat completions.

pub mod ollama_service;
pub mod open_ai_service;

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::error;

use crate::error_handler::{
    AiLlmError, HttpError, Provider, ProviderError, ProviderErrorKind, Result, make_snippet,
};

/// Default header/idle timeout when the config leaves it unset.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One chat request: a system instruction, the user prompt and an optional
/// JSON schema the answer must follow.
#[derive(Debug, Clone, Copy)]
pub struct ChatPrompt<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub schema: Option<&'a Value>,
}

impl<'a> ChatPrompt<'a> {
    pub fn new(system: &'a str, prompt: &'a str) -> Self {
        Self {
            system,
            prompt,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: &'a Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Sends a streaming request and waits (bounded) for the response headers.
///
/// Non-success statuses are turned into [`ProviderErrorKind::HttpStatus`]
/// with a short body snippet.
pub(crate) async fn send_streaming(
    provider: Provider,
    req: reqwest::RequestBuilder,
    url: &str,
    header_timeout: Duration,
) -> Result<reqwest::Response> {
    let started = Instant::now();
    let resp = tokio::time::timeout(header_timeout, req.send())
        .await
        .map_err(|_| AiLlmError::Timeout(header_timeout))??;

    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    // The error body gets the same bound as the headers.
    let text = match tokio::time::timeout(header_timeout, resp.text()).await {
        Ok(Ok(text)) => text,
        _ => String::new(),
    };
    let snippet = make_snippet(&text);

    error!(
        %provider,
        %status,
        %url,
        %snippet,
        latency_ms = started.elapsed().as_millis(),
        "chat endpoint returned non-success status"
    );

    Err(ProviderError::new(
        provider,
        ProviderErrorKind::HttpStatus(HttpError {
            status,
            url: url.to_string(),
            snippet,
        }),
    )
    .into())
}

/// Validates an endpoint and strips trailing slashes.
pub(crate) fn base_url(provider: Provider, endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
    {
        return Err(ProviderError::new(
            provider,
            ProviderErrorKind::InvalidEndpoint(endpoint.to_string()),
        )
        .into());
    }
    Ok(endpoint.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn slow_error_body_does_not_stall() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/chat", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            sock.write_all(
                b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 1000\r\n\r\npartial",
            )
            .await
            .unwrap();
            // never finish the body
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let req = reqwest::Client::new().post(&url).body("{}");
        let res = tokio::time::timeout(
            Duration::from_secs(5),
            send_streaming(Provider::Ollama, req, &url, Duration::from_millis(300)),
        )
        .await
        .expect("error path must not wait for the whole body");

        match res {
            Err(AiLlmError::Provider(ProviderError {
                kind: ProviderErrorKind::HttpStatus(http),
                ..
            })) => {
                assert_eq!(http.status.as_u16(), 503);
                assert!(http.snippet.is_empty());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn base_url_trims_and_validates() {
        assert_eq!(
            base_url(Provider::Ollama, " http://localhost:11434/ ").unwrap(),
            "http://localhost:11434"
        );
        assert!(base_url(Provider::OpenAI, "localhost:11434").is_err());
    }
}
