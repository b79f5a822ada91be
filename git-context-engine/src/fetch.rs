//! Context fetcher: listing, selection and concurrent file retrieval.
//!
//! Failure policy:
//!   * 403/429 on any call switches to a name-only fallback context
//!   * 404 on the root lookup is reported as `NotFound`
//!   * other root/tree listing failures propagate as `Unavailable`
//!   * a failing source-directory listing only narrows the listing to the root
//!   * a failing file download only drops that file

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{
    GitContextEngineConfigError, GitContextEngineError, GitContextEngineProviderError,
    GitContextEngineResult, ProviderResult,
};
use crate::git_providers::github::{BlobPayload, GitHubClient};
use crate::git_providers::{
    FetcherConfig, FileContent, ListingStrategy, RepoContext, RepoRef, TreeEntry,
};
use crate::select::select_files;

/// Conventional source directories, in lookup priority.
const SOURCE_DIRS: &[&str] = &["src", "app", "lib", "pkg"];

/// Deepest path (in segments) a recursive-listing entry may have to be
/// considered for the context set.
const MAX_SELECTION_DEPTH: usize = 2;

/// Fetches a bounded [`RepoContext`] for a repository.
#[derive(Debug, Clone)]
pub struct ContextFetcher {
    client: GitHubClient,
    cfg: FetcherConfig,
}

/// Listing obtained by either strategy, before selection.
struct Listing {
    tree_paths: Vec<String>,
    candidates: Vec<TreeEntry>,
}

impl ContextFetcher {
    /// Builds the fetcher and its HTTP client.
    pub fn new(cfg: FetcherConfig) -> GitContextEngineResult<Self> {
        cfg.validate()?;

        let http = reqwest::Client::builder()
            .user_agent("git-context-engine/0.2")
            .build()
            .map_err(|e| GitContextEngineConfigError::HttpClient(e.to_string()))?;

        let client = GitHubClient::new(http, cfg.base_api.clone(), cfg.token.clone());
        Ok(Self { client, cfg })
    }

    /// Retrieves the structural listing and a capped set of file contents.
    ///
    /// Rate limiting never fails this call: it yields
    /// [`RepoContext::fallback`] instead.
    pub async fn fetch_context(&self, repo: &RepoRef) -> GitContextEngineResult<RepoContext> {
        info!(repo = %repo, strategy = ?self.cfg.strategy, "fetching repository context");

        match self.collect(repo).await {
            Ok(ctx) => {
                info!(
                    repo = %repo,
                    tree_paths = ctx.tree_paths.len(),
                    files = ctx.files.len(),
                    "repository context ready"
                );
                Ok(ctx)
            }
            Err(e) if e.is_rate_limited() => {
                warn!(
                    repo = %repo,
                    error = %e,
                    "source host rate limited us, using name-only fallback"
                );
                Ok(RepoContext::fallback())
            }
            Err(GitContextEngineProviderError::NotFound) => Err(GitContextEngineError::NotFound {
                repo: repo.to_string(),
            }),
            Err(e) => Err(GitContextEngineError::Unavailable(e)),
        }
    }

    async fn collect(&self, repo: &RepoRef) -> ProviderResult<RepoContext> {
        let listing = match self.cfg.strategy {
            ListingStrategy::Shallow => self.list_shallow(repo).await?,
            ListingStrategy::Deep => self.list_deep(repo).await?,
        };

        let selected = select_files(&listing.candidates);
        debug!(
            candidates = listing.candidates.len(),
            selected = selected.len(),
            "context set selected"
        );

        let files = self.fetch_files(&selected).await?;
        Ok(RepoContext::new(listing.tree_paths, files))
    }

    /// Root listing plus one conventional source directory when present.
    async fn list_shallow(&self, repo: &RepoRef) -> ProviderResult<Listing> {
        let root = self.list_with_deadline(repo, "").await?;

        let source_dir = SOURCE_DIRS.iter().find_map(|name| {
            root.iter()
                .find(|e| e.is_dir() && e.path == *name)
                .map(|e| e.path.clone())
        });

        let mut merged = root;
        if let Some(dir) = source_dir {
            match self.list_with_deadline(repo, &dir).await {
                Ok(sub) => merged.extend(sub),
                Err(GitContextEngineProviderError::NotFound) => {
                    debug!(dir = %dir, "source directory vanished, treating as empty");
                }
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => {
                    warn!(
                        dir = %dir,
                        error = %e,
                        "source directory listing failed, using root only"
                    );
                }
            }
        }

        Ok(Listing {
            tree_paths: merged.iter().map(|e| e.path.clone()).collect(),
            candidates: merged,
        })
    }

    /// Default branch plus one recursive tree listing.
    async fn list_deep(&self, repo: &RepoRef) -> ProviderResult<Listing> {
        let branch = timeout(self.cfg.list_timeout, self.client.default_branch(repo))
            .await
            .map_err(|_| GitContextEngineProviderError::Timeout)??;

        let tree = timeout(self.cfg.list_timeout, self.client.recursive_tree(repo, &branch))
            .await
            .map_err(|_| GitContextEngineProviderError::Timeout)??;
        if tree.truncated {
            warn!(
                repo = %repo,
                entries = tree.entries.len(),
                "recursive tree listing truncated by the source host"
            );
        }

        let tree_paths = tree
            .entries
            .iter()
            .filter(|e| e.is_file())
            .map(|e| e.path.clone())
            .collect();

        let candidates = tree
            .entries
            .into_iter()
            .filter(|e| e.path.split('/').count() <= MAX_SELECTION_DEPTH)
            .collect();

        Ok(Listing {
            tree_paths,
            candidates,
        })
    }

    async fn list_with_deadline(
        &self,
        repo: &RepoRef,
        dir: &str,
    ) -> ProviderResult<Vec<TreeEntry>> {
        timeout(self.cfg.list_timeout, self.client.list_dir(repo, dir))
            .await
            .map_err(|_| GitContextEngineProviderError::Timeout)?
    }

    /// Downloads every selected file concurrently; each download has its own
    /// deadline so one slow file never holds back or cancels the others.
    async fn fetch_files(&self, selected: &[TreeEntry]) -> ProviderResult<Vec<FileContent>> {
        let outcomes = join_all(selected.iter().map(|e| self.fetch_one(e))).await;

        let mut files = Vec::with_capacity(selected.len());
        for (entry, outcome) in selected.iter().zip(outcomes) {
            match outcome {
                Ok(Some(file)) => files.push(file),
                Ok(None) => debug!(path = %entry.path, "file dropped: unsupported payload"),
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => debug!(path = %entry.path, error = %e, "file dropped"),
            }
        }
        Ok(files)
    }

    async fn fetch_one(&self, entry: &TreeEntry) -> ProviderResult<Option<FileContent>> {
        let payload = timeout(self.cfg.file_timeout, self.client.get_blob(&entry.fetch_handle))
            .await
            .map_err(|_| GitContextEngineProviderError::Timeout)??;
        Ok(decode_payload(&entry.path, payload))
    }
}

/// Decodes a base64 payload into text. Any other encoding, a missing body,
/// invalid base64 or non-UTF-8 bytes yield `None`.
fn decode_payload(path: &str, payload: BlobPayload) -> Option<FileContent> {
    if payload.encoding.as_deref() != Some("base64") {
        return None;
    }
    let content = payload.content?;

    // GitHub wraps base64 bodies at 60 columns.
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact.as_bytes()).ok()?;
    let text = String::from_utf8(bytes).ok()?;

    Some(FileContent {
        path: path.to_string(),
        text,
    })
}
