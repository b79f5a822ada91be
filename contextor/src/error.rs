//! Typed error for the contextor crate.

use ai_llm_service::{AiLlmError, FailureCategory};
use git_context_engine::{GitContextEngineError, GitContextEngineProviderError};
use thiserror::Error;

/// The single terminal error of one analysis.
#[derive(Debug, Error)]
pub enum ContextorError {
    /// The input is not a usable repository reference. No request was made.
    #[error("'{0}' is not a valid GitHub repository URL")]
    InvalidReference(String),

    /// The repository does not exist or is private.
    #[error("repository '{repo}' was not found or is private")]
    NotFound { repo: String },

    /// Listing the repository failed.
    #[error("could not read repository: {0}")]
    Fetch(#[source] GitContextEngineProviderError),

    /// The generation backend failed.
    #[error("report generation failed ({category}): {source}")]
    Backend {
        category: FailureCategory,
        #[source]
        source: AiLlmError,
    },

    /// The final structured answer was not valid JSON.
    #[error("malformed report: {0}")]
    Parse(String),

    /// The caller cancelled the analysis.
    #[error("analysis cancelled")]
    Cancelled,

    /// Unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ContextorError {
    /// Failure category for backend errors, `None` otherwise.
    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            Self::Backend { category, .. } => Some(*category),
            _ => None,
        }
    }
}

impl From<AiLlmError> for ContextorError {
    fn from(source: AiLlmError) -> Self {
        Self::Backend {
            category: source.category(),
            source,
        }
    }
}

impl From<GitContextEngineError> for ContextorError {
    fn from(e: GitContextEngineError) -> Self {
        match e {
            GitContextEngineError::NotFound { repo } => Self::NotFound { repo },
            GitContextEngineError::Unavailable(p) => Self::Fetch(p),
            GitContextEngineError::Config(c) => Self::Config(c.to_string()),
        }
    }
}
