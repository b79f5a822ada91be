//! Source-hosting provider layer.
//!
//! Holds the provider-agnostic data model (`types`), the GitHub REST client
//! and the runtime configuration shared by both.

pub mod types;
pub use types::*;

pub mod github;

use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::errors::{GitContextEngineConfigError, GitContextEngineResult};

/// Default public API base.
pub const DEFAULT_BASE_API: &str = "https://api.github.com";

/// How the repository listing is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingStrategy {
    /// Root directory plus one conventional source directory.
    #[default]
    Shallow,
    /// Default branch resolution plus one recursive tree listing.
    Deep,
}

impl FromStr for ListingStrategy {
    type Err = GitContextEngineConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shallow" => Ok(Self::Shallow),
            "deep" => Ok(Self::Deep),
            other => Err(GitContextEngineConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Runtime configuration for the context fetcher.
///
/// The token is an opaque credential passed through as a bearer token; it is
/// never stored anywhere else.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// API base, e.g. "https://api.github.com".
    pub base_api: String,
    /// Optional access token (PAT or app token).
    pub token: Option<String>,
    pub strategy: ListingStrategy,
    /// Deadline for each listing call.
    pub list_timeout: Duration,
    /// Deadline for each file download.
    pub file_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_api: DEFAULT_BASE_API.to_string(),
            token: None,
            strategy: ListingStrategy::Shallow,
            list_timeout: Duration::from_millis(3000),
            file_timeout: Duration::from_millis(3500),
        }
    }
}

impl FetcherConfig {
    /// Builds the config from environment variables, falling back to defaults.
    ///
    /// # Env
    /// - `GITHUB_API_URL` (default `https://api.github.com`)
    /// - `GITHUB_TOKEN` (optional)
    /// - `REPO_LISTING_STRATEGY` = `shallow` | `deep` (default `shallow`)
    /// - `REPO_LIST_TIMEOUT_MS` (default 3000)
    /// - `REPO_FILE_TIMEOUT_MS` (default 3500)
    pub fn from_env() -> GitContextEngineResult<Self> {
        let dflt = Self::default();

        let base_api = env_nonempty("GITHUB_API_URL").unwrap_or(dflt.base_api);
        let strategy = match env_nonempty("REPO_LISTING_STRATEGY") {
            Some(s) => s.parse()?,
            None => dflt.strategy,
        };

        let cfg = Self {
            base_api,
            token: env_nonempty("GITHUB_TOKEN"),
            strategy,
            list_timeout: env_millis("REPO_LIST_TIMEOUT_MS").unwrap_or(dflt.list_timeout),
            file_timeout: env_millis("REPO_FILE_TIMEOUT_MS").unwrap_or(dflt.file_timeout),
        };
        cfg.validate()?;

        debug!(
            base_api = %cfg.base_api,
            strategy = ?cfg.strategy,
            has_token = cfg.token.is_some(),
            "fetcher config loaded"
        );
        Ok(cfg)
    }

    /// Checks the base URL scheme.
    pub fn validate(&self) -> Result<(), GitContextEngineConfigError> {
        let base = self.base_api.trim();
        if base.starts_with("http://") || base.starts_with("https://") {
            Ok(())
        } else {
            Err(GitContextEngineConfigError::InvalidBaseUrl(self.base_api.clone()))
        }
    }
}

fn env_nonempty(k: &str) -> Option<String> {
    std::env::var(k).ok().filter(|v| !v.trim().is_empty())
}

fn env_millis(k: &str) -> Option<Duration> {
    env_nonempty(k)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}
