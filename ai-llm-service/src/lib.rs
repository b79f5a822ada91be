//! Streaming LLM access for repository reports.
//!
//! - [`services`]: OpenAI and Ollama chat clients
//! - [`stream`]: line-protocol decoding into ordered text deltas
//! - [`service_profiles`]: standard/deep profile dispatch
//! - [`error_handler`]: unified errors and failure categories

pub mod config;
pub mod error_handler;
pub mod service_profiles;
pub mod services;
pub mod stream;
pub mod telemetry;

pub use error_handler::{AiLlmError, FailureCategory};
pub use service_profiles::{LlmClient, LlmServiceProfiles, Profile};
pub use services::ChatPrompt;
pub use stream::TextStream;
