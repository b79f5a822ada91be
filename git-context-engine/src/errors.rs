//! Crate-wide error hierarchy for git-context-engine.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type GitContextEngineResult<T> = Result<T, GitContextEngineError>;

/// Alias for results produced inside the provider layer.
pub type ProviderResult<T> = Result<T, GitContextEngineProviderError>;

/// Root error type for the git-context-engine crate.
///
/// Rate limiting never shows up here: the fetcher turns it into a
/// fallback context instead of failing.
#[derive(Debug, Error)]
pub enum GitContextEngineError {
    /// The repository root could not be found (missing or private).
    #[error("repository '{repo}' was not found or is private")]
    NotFound {
        /// `owner/name` of the repository that was looked up.
        repo: String,
    },

    /// Listing failed with a non-recoverable transport or status error.
    #[error("source host unavailable: {0}")]
    Unavailable(#[source] GitContextEngineProviderError),

    /// Configuration problems (bad base URL, unusable token, etc.).
    #[error(transparent)]
    Config(#[from] GitContextEngineConfigError),
}

/// Provider-specific error used inside the provider layer.
#[derive(Debug, Error)]
pub enum GitContextEngineProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403). GitHub answers unauthenticated quota
    /// exhaustion with 403, so this counts as rate limiting.
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited {
        /// Optional `Retry-After` hint in seconds when available.
        retry_after_secs: Option<u64>,
    },

    /// Gateway / server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (non-2xx) not covered by specific variants.
    #[error("http status error: status {0}")]
    HttpStatus(u16),

    /// Timeout at transport level or per-call deadline.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without HTTP status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl GitContextEngineProviderError {
    /// Maps a non-2xx status code into a provider error.
    pub fn from_status(code: u16, retry_after_secs: Option<u64>) -> Self {
        match code {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited { retry_after_secs },
            500..=599 => Self::Server(code),
            _ => Self::HttpStatus(code),
        }
    }

    /// True for the statuses that switch the context into fallback mode.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Forbidden | Self::RateLimited { .. })
    }
}

/// Configuration and setup errors (base API URL, token, HTTP client).
#[derive(Debug, Error)]
pub enum GitContextEngineConfigError {
    /// Invalid base API URL.
    #[error("invalid base api url: {0}")]
    InvalidBaseUrl(String),

    /// Unknown listing strategy name.
    #[error("unknown listing strategy: {0}")]
    UnknownStrategy(String),

    /// The HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    HttpClient(String),
}

// ===== Mapping from reqwest::Error into GitContextEngineProviderError =====

impl From<reqwest::Error> for GitContextEngineProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return GitContextEngineProviderError::Timeout;
        }

        if let Some(status) = e.status() {
            return GitContextEngineProviderError::from_status(status.as_u16(), None);
        }

        if e.is_decode() {
            return GitContextEngineProviderError::InvalidResponse(e.to_string());
        }

        GitContextEngineProviderError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_and_429_count_as_rate_limited() {
        assert!(GitContextEngineProviderError::from_status(403, None).is_rate_limited());
        assert!(GitContextEngineProviderError::from_status(429, Some(30)).is_rate_limited());
        assert!(!GitContextEngineProviderError::from_status(404, None).is_rate_limited());
        assert!(!GitContextEngineProviderError::from_status(502, None).is_rate_limited());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            GitContextEngineProviderError::from_status(503, None),
            GitContextEngineProviderError::Server(503)
        ));
        assert!(matches!(
            GitContextEngineProviderError::from_status(418, None),
            GitContextEngineProviderError::HttpStatus(418)
        ));
    }
}
