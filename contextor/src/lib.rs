//! Repository report pipeline.
//!
//! Public API: [`Analyzer::analyze`] (and the env-driven [`analyze`]). It
//! parses the repository reference, fetches a bounded context from GitHub,
//! builds a report prompt, streams the backend answer and re-parses the
//! accumulated text on every chunk so callers see progressive snapshots.

pub mod cfg;
mod error;
pub mod llm;
pub mod parser;
mod progress;
pub mod prompt;
pub mod report;

pub use cfg::ContextorConfig;
pub use error::ContextorError;
pub use progress::{
    AnalysisState, ChannelProgress, IndicatifProgress, NoopProgress, Progress, ProgressEvent,
};
pub use report::{
    AnalysisMode, ComplexityLevel, Maintainability, MetaSummary, OutputFormat, Report,
    ReportSection,
};

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use git_context_engine::{ContextFetcher, FetcherConfig, RepoContext, RepoRef, parse_repo_ref};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use llm::ReportGenerator;
use progress::StateTracker;
use prompt::{RequestOptions, build_request};

/// Status line shown when GitHub rate-limits the context fetch.
pub const FALLBACK_MESSAGE: &str =
    "GitHub rate limit reached; analyzing from the repository name only";

/// One user-initiated analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Repository URL or `github.com/owner/name` string as typed by the user.
    pub repo_url: String,
    pub mode: AnalysisMode,
    pub deep_reasoning: bool,
    /// Overrides `REPORT_FORMAT` when set.
    pub format: Option<OutputFormat>,
}

impl AnalysisRequest {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            mode: AnalysisMode::Full,
            deep_reasoning: false,
            format: None,
        }
    }
}

/// Owns the collaborators of the pipeline. Holds no per-analysis state, so
/// one instance can serve concurrent analyses.
#[derive(Debug)]
pub struct Analyzer {
    fetcher: ContextFetcher,
    generator: ReportGenerator,
    cfg: ContextorConfig,
}

impl Analyzer {
    pub fn new(fetcher: ContextFetcher, generator: ReportGenerator, cfg: ContextorConfig) -> Self {
        Self {
            fetcher,
            generator,
            cfg,
        }
    }

    /// Builds every collaborator from environment variables.
    ///
    /// `github_token` and `api_key` override `GITHUB_TOKEN` and
    /// `OPENAI_API_KEY` when present.
    pub fn from_env(
        github_token: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self, ContextorError> {
        let mut fetch_cfg = FetcherConfig::from_env()?;
        if let Some(token) = github_token.filter(|t| !t.trim().is_empty()) {
            fetch_cfg.token = Some(token);
        }
        let fetcher = ContextFetcher::new(fetch_cfg)?;
        let svc = LlmServiceProfiles::from_env(api_key)?;

        Ok(Self::new(
            fetcher,
            ReportGenerator::new(Arc::new(svc)),
            ContextorConfig::from_env()?,
        ))
    }

    /// Effective prompt knobs for a request.
    pub fn request_options(&self, req: &AnalysisRequest) -> RequestOptions {
        RequestOptions {
            mode: req.mode,
            deep_reasoning: req.deep_reasoning,
            format: req.format.unwrap_or(self.cfg.format),
            body_budget: self.cfg.body_budget,
            body_budget_deep: self.cfg.body_budget_deep,
        }
    }

    /// Runs one analysis end to end.
    ///
    /// An invalid reference fails immediately, before any state change or
    /// network call. Afterwards exactly one of `Complete` / `Error` is
    /// reported.
    ///
    /// # Errors
    /// See [`ContextorError`]; rate limiting is not an error (the report is
    /// produced in fallback mode).
    pub async fn analyze(
        &self,
        req: &AnalysisRequest,
        progress: &dyn Progress,
        cancel: &CancellationToken,
    ) -> Result<Report, ContextorError> {
        let repo = parse_repo_ref(&req.repo_url)
            .ok_or_else(|| ContextorError::InvalidReference(req.repo_url.trim().to_string()))?;
        let opts = self.request_options(req);

        info!(
            repo = %repo,
            mode = %opts.mode,
            deep = opts.deep_reasoning,
            format = %opts.format,
            "analysis started"
        );

        let mut states = StateTracker::new(progress);
        states.advance(AnalysisState::Fetching);
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ContextorError::Cancelled),
            res = self.fetcher.fetch_context(&repo) => res.map_err(ContextorError::from),
        };
        let ctx = match fetched {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(repo = %repo, error = %e, "fetching repository failed");
                states.advance(AnalysisState::Error);
                return Err(e);
            }
        };

        if ctx.is_fallback {
            warn!(repo = %repo, "source host rate-limited; reporting from the name only");
            progress.message(FALLBACK_MESSAGE);
        }

        self.run_generation(&repo, &ctx, &opts, &mut states, cancel)
            .await
    }

    /// Streams a report for an already fetched context.
    ///
    /// Depends only on its arguments, so a caller may retry it with the
    /// same `RepoContext` after a transient backend failure.
    pub async fn generate_report(
        &self,
        repo: &RepoRef,
        ctx: &RepoContext,
        opts: &RequestOptions,
        progress: &dyn Progress,
        cancel: &CancellationToken,
    ) -> Result<Report, ContextorError> {
        let mut states = StateTracker::resume(progress, AnalysisState::Fetching);
        self.run_generation(repo, ctx, opts, &mut states, cancel)
            .await
    }

    async fn run_generation(
        &self,
        repo: &RepoRef,
        ctx: &RepoContext,
        opts: &RequestOptions,
        states: &mut StateTracker<'_>,
        cancel: &CancellationToken,
    ) -> Result<Report, ContextorError> {
        states.advance(AnalysisState::Analyzing);

        let result = self
            .stream_report(repo, ctx, opts, states.progress(), cancel)
            .await;
        match &result {
            Ok(report) => {
                info!(
                    repo = %repo,
                    items = report.item_count(),
                    fallback = report.is_fallback,
                    "analysis complete"
                );
                states.advance(AnalysisState::Complete);
            }
            Err(e) => {
                warn!(repo = %repo, error = %e, "report generation failed");
                states.advance(AnalysisState::Error);
            }
        }
        debug!(state = %states.current(), "analysis finished");
        result
    }

    async fn stream_report(
        &self,
        repo: &RepoRef,
        ctx: &RepoContext,
        opts: &RequestOptions,
        progress: &dyn Progress,
        cancel: &CancellationToken,
    ) -> Result<Report, ContextorError> {
        let request = build_request(repo, ctx, opts);
        debug!(
            files = ctx.files.len(),
            paths = ctx.tree_paths.len(),
            prompt_len = request.prompt.len(),
            "report request built"
        );

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ContextorError::Cancelled),
            s = self.generator.start(&request, opts.deep_reasoning) => s?,
        };

        let mut buf = String::new();
        let mut last: Option<Report> = None;
        let mut chunks = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ContextorError::Cancelled),
                n = stream.next_chunk() => n?,
            };
            let Some(chunk) = next else { break };
            chunks += 1;
            buf.push_str(&chunk);

            if let Some(mut snap) = parser::parse_snapshot(&buf, opts.format) {
                snap.is_fallback = ctx.is_fallback;
                if last.as_ref() != Some(&snap) {
                    progress.snapshot(&snap);
                    last = Some(snap);
                }
            }
        }

        debug!(chunks, chars = buf.len(), "report stream finished");

        let mut report = parser::parse_final(&buf, opts.format)?;
        report.is_fallback = ctx.is_fallback;
        Ok(report)
    }
}

/// Runs one analysis with collaborators built from the environment.
///
/// # Example
/// ```no_run
/// # use contextor::{analyze, AnalysisRequest, NoopProgress};
/// # use tokio_util::sync::CancellationToken;
/// # #[tokio::main] async fn main() {
/// let req = AnalysisRequest::new("https://github.com/tokio-rs/axum");
/// let report = analyze(&req, &NoopProgress, &CancellationToken::new()).await.unwrap();
/// println!("{}", report.project_overview.items.join("\n"));
/// # }
/// ```
pub async fn analyze(
    req: &AnalysisRequest,
    progress: &dyn Progress,
    cancel: &CancellationToken,
) -> Result<Report, ContextorError> {
    Analyzer::from_env(None, None)?
        .analyze(req, progress, cancel)
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use ai_llm_service::config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
    use ai_llm_service::FailureCategory;
    use axum::{Json, Router, http::StatusCode, routing::get, routing::post};
    use base64::{Engine, engine::general_purpose::STANDARD};
    use git_context_engine::ListingStrategy;
    use serde_json::{Value, json};

    use super::*;

    const ANSWER: [&str; 5] = [
        "=== PROJECT OVERVIEW ===\n- A widget ",
        "library\n=== KEY COMP",
        "ONENTS ===\n- parser\n",
        "=== META ANALYSIS ===\n- Quality Score: 9\n",
        "- Complexity: Beginner\n",
    ];

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<AnalysisState>>,
        snapshots: Mutex<Vec<Report>>,
        messages: Mutex<Vec<String>>,
    }

    impl Progress for Recorder {
        fn state(&self, state: AnalysisState) {
            self.states.lock().unwrap().push(state);
        }
        fn snapshot(&self, report: &Report) {
            self.snapshots.lock().unwrap().push(report.clone());
        }
        fn message(&self, msg: &str) {
            self.messages.lock().unwrap().push(msg.to_string());
        }
    }

    fn ndjson(parts: &[&str]) -> String {
        let mut out: String = parts
            .iter()
            .map(|p| format!("{}\n", json!({ "message": { "content": p }, "done": false })))
            .collect();
        out.push_str("{\"message\":{\"content\":\"\"},\"done\":true}\n");
        out
    }

    fn entry(base: &str, path: &str, kind: &str) -> Value {
        json!({
            "path": path,
            "type": kind,
            "size": 10,
            "url": format!("{base}/blobs/{}", path.replace('/', "__")),
        })
    }

    async fn bind() -> (tokio::net::TcpListener, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        (listener, base)
    }

    fn start(listener: tokio::net::TcpListener, app: Router) {
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    }

    fn analyzer(base: &str) -> Analyzer {
        let fetcher = ContextFetcher::new(FetcherConfig {
            base_api: base.to_string(),
            token: None,
            strategy: ListingStrategy::Shallow,
            list_timeout: Duration::from_secs(2),
            file_timeout: Duration::from_secs(2),
        })
        .unwrap();
        let llm = LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "test".into(),
            endpoint: base.to_string(),
            api_key: None,
            max_tokens: None,
            temperature: Some(0.3),
            top_p: None,
            timeout_secs: Some(2),
        };
        let svc = LlmServiceProfiles::new(llm, None).unwrap();
        Analyzer::new(
            fetcher,
            ReportGenerator::new(Arc::new(svc)),
            ContextorConfig::default(),
        )
    }

    /// GitHub root with one readme, plus an Ollama chat endpoint that
    /// records the prompt it was sent.
    async fn fake_backend(root_status: StatusCode, seen: Arc<Mutex<String>>) -> String {
        let (listener, base) = bind().await;
        let root = json!([entry(&base, "README.md", "file")]);
        let app = Router::new()
            .route(
                "/repos/acme/widget/contents",
                get(move || {
                    let root = root.clone();
                    async move {
                        if root_status.is_success() {
                            (StatusCode::OK, Json(root))
                        } else {
                            (root_status, Json(json!({ "message": "nope" })))
                        }
                    }
                }),
            )
            .route(
                "/blobs/README.md",
                get(|| async {
                    Json(json!({ "encoding": "base64", "content": STANDARD.encode("# Widget") }))
                }),
            )
            .route(
                "/api/chat",
                post(move |Json(body): Json<Value>| {
                    let seen = seen.clone();
                    async move {
                        *seen.lock().unwrap() = body["messages"][1]["content"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string();
                        ndjson(&ANSWER)
                    }
                }),
            );
        start(listener, app);
        base
    }

    #[tokio::test]
    async fn full_pipeline_streams_snapshots_and_completes() {
        let seen = Arc::new(Mutex::new(String::new()));
        let base = fake_backend(StatusCode::OK, seen.clone()).await;
        let rec = Recorder::default();

        let report = analyzer(&base)
            .analyze(
                &AnalysisRequest::new("github.com/acme/widget"),
                &rec,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.project_overview.items, vec!["A widget library"]);
        assert_eq!(report.key_components.items, vec!["parser"]);
        assert_eq!(report.meta.quality_score, 9);
        assert_eq!(report.meta.complexity_level, ComplexityLevel::Beginner);
        assert!(!report.is_fallback);

        assert_eq!(*rec.states.lock().unwrap(), vec![
            AnalysisState::Fetching,
            AnalysisState::Analyzing,
            AnalysisState::Complete,
        ]);
        let snaps = rec.snapshots.lock().unwrap();
        assert!(!snaps.is_empty());
        assert_eq!(snaps.last(), Some(&report));

        let prompt = seen.lock().unwrap().clone();
        assert!(prompt.contains("--- FILE: README.md ---\n# Widget\n--- END FILE ---"));
    }

    #[tokio::test]
    async fn rate_limit_degrades_to_fallback_report() {
        let seen = Arc::new(Mutex::new(String::new()));
        let base = fake_backend(StatusCode::FORBIDDEN, seen.clone()).await;
        let rec = Recorder::default();

        let report = analyzer(&base)
            .analyze(
                &AnalysisRequest::new("https://github.com/acme/widget"),
                &rec,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(report.is_fallback);
        assert_eq!(*rec.messages.lock().unwrap(), vec![FALLBACK_MESSAGE.to_string()]);
        assert_eq!(rec.states.lock().unwrap().last(), Some(&AnalysisState::Complete));
        let prompt = seen.lock().unwrap().clone();
        assert!(prompt.contains(prompt::FALLBACK_NOTICE));
        assert!(!prompt.contains("--- FILE:"));
    }

    #[tokio::test]
    async fn missing_repository_is_not_found() {
        let base = fake_backend(StatusCode::NOT_FOUND, Arc::default()).await;
        let rec = Recorder::default();

        let err = analyzer(&base)
            .analyze(
                &AnalysisRequest::new("github.com/acme/widget"),
                &rec,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ContextorError::NotFound { ref repo } if repo == "acme/widget"));
        assert_eq!(*rec.states.lock().unwrap(), vec![
            AnalysisState::Fetching,
            AnalysisState::Error,
        ]);
    }

    #[tokio::test]
    async fn invalid_reference_fails_without_state_change() {
        let rec = Recorder::default();
        let err = analyzer("http://127.0.0.1:9")
            .analyze(
                &AnalysisRequest::new("https://gitlab.com/acme/widget"),
                &rec,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ContextorError::InvalidReference(_)));
        assert!(rec.states.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_carries_category() {
        let (listener, base) = bind().await;
        let app = Router::new().route(
            "/api/chat",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        start(listener, app);

        let rec = Recorder::default();
        let err = analyzer(&base)
            .generate_report(
                &RepoRef::new("acme", "widget"),
                &RepoContext::fallback(),
                &RequestOptions::default(),
                &rec,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), Some(FailureCategory::QuotaExceeded));
        assert_eq!(*rec.states.lock().unwrap(), vec![
            AnalysisState::Analyzing,
            AnalysisState::Error,
        ]);
    }

    #[tokio::test]
    async fn malformed_final_json_is_parse_error() {
        let (listener, base) = bind().await;
        let app = Router::new().route(
            "/api/chat",
            post(|| async { ndjson(&["{\"projectOverview\": [\"a\"", ", \"b\""]) }),
        );
        start(listener, app);

        let rec = Recorder::default();
        let opts = RequestOptions {
            format: OutputFormat::Json,
            ..RequestOptions::default()
        };
        let err = analyzer(&base)
            .generate_report(
                &RepoRef::new("acme", "widget"),
                &RepoContext::fallback(),
                &opts,
                &rec,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ContextorError::Parse(_)));
        // mid-stream snapshots were delivered and are not retracted
        let snaps = rec.snapshots.lock().unwrap();
        assert_eq!(snaps.last().unwrap().project_overview.items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn cancellation_stops_the_stream() {
        let (listener, base) = bind().await;
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                ndjson(&ANSWER)
            }),
        );
        start(listener, app);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = analyzer(&base)
            .generate_report(
                &RepoRef::new("acme", "widget"),
                &RepoContext::fallback(),
                &RequestOptions::default(),
                &NoopProgress,
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ContextorError::Cancelled));
    }
}
