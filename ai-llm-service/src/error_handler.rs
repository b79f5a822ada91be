//! Unified error handling for `ai-llm-service`.
//!
//! This module exposes a single top-level error type [`AiLlmError`] for the whole
//! library, and groups domain-specific errors in nested enums ([`ConfigError`],
//! [`ProviderError`]). Small helpers for reading/validating environment variables are
//! provided and return the unified [`Result<T>`] alias.
//!
//! All messages include the suffix `[AI LLM Service]` to simplify attribution in logs.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, AiLlmError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `ai-llm-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AiLlmError {
    /// Configuration/validation errors (startup/readiness).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Provider-level failure (bad status, undecodable stream, ...).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Underlying HTTP transport error (e.g., `reqwest::Error`).
    #[error("[AI LLM Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Operation exceeded the configured timeout.
    #[error("[AI LLM Service] operation timed out after {0:?}")]
    Timeout(Duration),
}

/// User-facing classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The API key is missing, invalid or lacks permissions.
    InvalidCredential,
    /// The account ran out of quota or is being throttled.
    QuotaExceeded,
    /// The backend could not be reached or answered with a server error.
    ServiceUnavailable,
    /// The backend answered with something we could not decode.
    MalformedResponse,
    /// Local configuration is unusable (endpoint, model, provider).
    Misconfigured,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidCredential => "invalid or missing API credential",
            Self::QuotaExceeded => "quota exceeded",
            Self::ServiceUnavailable => "service unavailable",
            Self::MalformedResponse => "malformed response",
            Self::Misconfigured => "misconfigured backend",
        };
        f.write_str(s)
    }
}

impl AiLlmError {
    /// Classifies the error into a category suitable for end users.
    pub fn category(&self) -> FailureCategory {
        match self {
            AiLlmError::Config(_) => FailureCategory::Misconfigured,
            AiLlmError::HttpTransport(e) if e.is_decode() => FailureCategory::MalformedResponse,
            AiLlmError::HttpTransport(_) | AiLlmError::Timeout(_) => {
                FailureCategory::ServiceUnavailable
            }
            AiLlmError::Provider(p) => p.kind.category(),
        }
    }
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[AI LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (like ports, limits, timeouts).
    #[error("[AI LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `LLM_MAX_TOKENS`, `OLLAMA_PORT`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u32`).
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_KIND`.
    #[error("[AI LLM Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[AI LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `OLLAMA_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// A numeric field was outside of the allowed range.
    #[error("[AI LLM Service] {field} is out of range: {detail}")]
    OutOfRange {
        /// Field name (e.g., `temperature`).
        field: &'static str,
        /// Description of the expected range.
        detail: &'static str,
    },

    /// Model name was empty or invalid.
    #[error("[AI LLM Service] model name must not be empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* Provider errors                                                           */
/* ------------------------------------------------------------------------- */

/// Backend that produced a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Ollama,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAI => f.write_str("OpenAI"),
            Provider::Ollama => f.write_str("Ollama"),
        }
    }
}

/// Non-success HTTP answer from a provider.
#[derive(Debug, Clone)]
pub struct HttpError {
    /// Numeric HTTP status code.
    pub status: StatusCode,
    /// Request URL.
    pub url: String,
    /// Short snippet of the response body (trimmed).
    pub snippet: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} from {}: {}", self.status, self.url, self.snippet)
    }
}

/// Provider failure with attribution.
#[derive(Debug, Error)]
#[error("[AI LLM Service] {provider}: {kind}")]
pub struct ProviderError {
    pub provider: Provider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: Provider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }
}

/// What went wrong inside a provider call.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderErrorKind {
    /// The config targets a different provider.
    #[error("invalid provider for this service")]
    InvalidProvider,

    /// The provider needs an API key and none was configured.
    #[error("missing API key")]
    MissingApiKey,

    /// The endpoint is empty or does not start with http/https.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Upstream returned a non-successful HTTP status.
    #[error("{0}")]
    HttpStatus(HttpError),

    /// A stream line or payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The provider reported an error inside the stream.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The stream ended without producing any text.
    #[error("stream produced no content")]
    EmptyStream,
}

impl ProviderErrorKind {
    fn category(&self) -> FailureCategory {
        match self {
            Self::InvalidProvider | Self::InvalidEndpoint(_) => FailureCategory::Misconfigured,
            Self::MissingApiKey => FailureCategory::InvalidCredential,
            Self::HttpStatus(h) => classify_status(h.status, &h.snippet),
            Self::Upstream(msg) => classify_message(msg),
            Self::Decode(_) | Self::EmptyStream => FailureCategory::MalformedResponse,
        }
    }
}

fn classify_status(status: StatusCode, snippet: &str) -> FailureCategory {
    match status.as_u16() {
        401 | 403 => FailureCategory::InvalidCredential,
        429 => FailureCategory::QuotaExceeded,
        400 => classify_message(snippet),
        _ => FailureCategory::ServiceUnavailable,
    }
}

fn classify_message(msg: &str) -> FailureCategory {
    let lower = msg.to_ascii_lowercase();
    if lower.contains("api key") || lower.contains("api_key") || lower.contains("unauthorized") {
        FailureCategory::InvalidCredential
    } else if lower.contains("quota") || lower.contains("rate limit") {
        FailureCategory::QuotaExceeded
    } else {
        FailureCategory::ServiceUnavailable
    }
}

/// Builds a short single-line snippet of a response body for error messages.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 240;
    let flat: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX {
        flat
    } else {
        let mut s: String = flat.chars().take(MAX).collect();
        s.push('…');
        s
    }
}

/* ------------------------------------------------------------------------- */
/* Env helpers (return unified `Result<T>`)                                  */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty environment variable.
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::MissingVar`] if the
/// variable is absent or empty.
pub fn must_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name).into()),
    }
}

/// Reads an optional, non-empty environment variable.
pub fn opt_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::InvalidNumber`] if the
/// variable is set but not a valid `u32`.
pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>> {
    match opt_env(name) {
        Some(v) => v.trim().parse::<u32>().map(Some).map_err(|_| {
            AiLlmError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u32",
            })
        }),
        None => Ok(None),
    }
}

/// Parses an optional `u64` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u64(name: &'static str) -> Result<Option<u64>> {
    match opt_env(name) {
        Some(v) => v.trim().parse::<u64>().map(Some).map_err(|_| {
            AiLlmError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u64",
            })
        }),
        None => Ok(None),
    }
}

/* ------------------------------------------------------------------------- */
/* Validation helpers (return unified `Result<T>`)                           */
/* ------------------------------------------------------------------------- */

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::InvalidFormat`] when
/// the string does not start with a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Validates that a floating-point value lies within an inclusive range.
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::OutOfRange`] if `value`
/// is outside `[min, max]`.
pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        }
        .into())
    }
}
