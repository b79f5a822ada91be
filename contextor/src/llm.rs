//! Report generator: sends a [`ReportRequest`] to the configured backend.

use std::sync::Arc;

use ai_llm_service::{ChatPrompt, LlmServiceProfiles, Profile, TextStream};
use tracing::{debug, instrument};

use crate::error::ContextorError;
use crate::prompt::ReportRequest;

/// Thin wrapper over the shared LLM service.
///
/// # Example
/// ```no_run
/// # use std::sync::Arc;
/// # use ai_llm_service::LlmServiceProfiles;
/// # use contextor::llm::ReportGenerator;
/// # use contextor::prompt::{build_request, RequestOptions};
/// # use git_context_engine::{RepoContext, RepoRef};
/// # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let svc = Arc::new(LlmServiceProfiles::from_env(None)?);
/// let generator = ReportGenerator::new(svc);
/// let req = build_request(&RepoRef::new("acme", "widget"), &RepoContext::fallback(), &RequestOptions::default());
/// let text = generator.start(&req, false).await?.collect_text().await?;
/// println!("{text}");
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct ReportGenerator {
    svc: Arc<LlmServiceProfiles>,
}

impl ReportGenerator {
    pub fn new(svc: Arc<LlmServiceProfiles>) -> Self {
        Self { svc }
    }

    /// Opens the generation stream. Deep reasoning uses the deep profile.
    ///
    /// # Errors
    /// [`ContextorError::Backend`] with the failure category of the backend.
    #[instrument(skip_all, fields(deep = deep_reasoning, json = req.schema.is_some()))]
    pub async fn start(
        &self,
        req: &ReportRequest,
        deep_reasoning: bool,
    ) -> Result<TextStream, ContextorError> {
        let profile = if deep_reasoning {
            Profile::Deep
        } else {
            Profile::Standard
        };
        let system = req.system_message();

        let mut prompt = ChatPrompt::new(&system, &req.prompt);
        if let Some(schema) = &req.schema {
            prompt = prompt.with_schema(schema);
        }

        debug!(
            ?profile,
            system_len = system.len(),
            prompt_len = req.prompt.len(),
            "starting report stream"
        );
        Ok(self.svc.stream_chat(profile, &prompt).await?)
    }
}
