//! GitHub provider (REST v3) for repository listings and file blobs.
//!
//! Endpoints used (as of 2025):
//!   * GET /repos/{owner}/{repo}
//!   * GET /repos/{owner}/{repo}/contents/{path}
//!   * GET /repos/{owner}/{repo}/git/trees/{ref}?recursive=1
//!   * GET {blob or contents url} for file bodies (base64 payload)

use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::errors::{GitContextEngineProviderError, ProviderResult};
use crate::git_providers::types::{EntryKind, RepoRef, TreeEntry};

/// GitHub HTTP client wrapper.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String,        // "https://api.github.com"
    token: Option<String>,   // sent as "Bearer <token>"
}

/// Raw file payload as returned by the contents and blobs endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct BlobPayload {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Result of a recursive tree listing.
#[derive(Debug, Clone)]
pub struct TreeListing {
    pub entries: Vec<TreeEntry>,
    /// GitHub stops listing very large trees and flags it.
    pub truncated: bool,
}

impl GitHubClient {
    /// Constructs a GitHub client with a shared HTTP instance and optional token.
    pub fn new(http: Client, base_api: String, token: Option<String>) -> Self {
        debug!("Creating GitHubClient with base_api={}", base_api);
        Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Lists one directory of the default branch (`""` is the root).
    ///
    /// A 404 surfaces as [`GitContextEngineProviderError::NotFound`]; callers
    /// decide whether a missing directory is fatal.
    #[instrument(skip_all, fields(repo = %repo, dir = dir_path))]
    pub async fn list_dir(&self, repo: &RepoRef, dir_path: &str) -> ProviderResult<Vec<TreeEntry>> {
        let url = self.contents_url(repo, dir_path);
        debug!("GitHub list_dir: {}", url);

        let raw: Vec<GitHubContentEntry> = self.get_json(&url, &[]).await?;

        let entries = raw
            .into_iter()
            .filter_map(|c| {
                let kind = match c.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Directory,
                    // symlinks and submodules carry no readable body
                    _ => return None,
                };
                let fetch_handle = c.url.unwrap_or_else(|| self.contents_url(repo, &c.path));
                Some(TreeEntry {
                    path: c.path,
                    kind,
                    size_bytes: c.size,
                    fetch_handle,
                })
            })
            .collect();

        Ok(entries)
    }

    /// Resolves the repository's default branch.
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn default_branch(&self, repo: &RepoRef) -> ProviderResult<String> {
        let url = format!(
            "{}/repos/{}/{}",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name)
        );
        debug!("GitHub default_branch: {}", url);

        let meta: GitHubRepo = self.get_json(&url, &[]).await?;
        Ok(meta.default_branch)
    }

    /// Fetches one recursive tree listing for `git_ref`.
    #[instrument(skip_all, fields(repo = %repo, git_ref = git_ref))]
    pub async fn recursive_tree(
        &self,
        repo: &RepoRef,
        git_ref: &str,
    ) -> ProviderResult<TreeListing> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            urlencoding::encode(git_ref)
        );
        debug!("GitHub recursive_tree: {}", url);

        let tree: GitHubTree = self.get_json(&url, &[("recursive", "1")]).await?;

        let entries = tree
            .tree
            .into_iter()
            .filter_map(|t| {
                let kind = match t.kind.as_str() {
                    "blob" => EntryKind::File,
                    "tree" => EntryKind::Directory,
                    // "commit" entries are submodules
                    _ => return None,
                };
                let fetch_handle = t.url.unwrap_or_else(|| self.contents_url(repo, &t.path));
                Some(TreeEntry {
                    path: t.path,
                    kind,
                    size_bytes: t.size,
                    fetch_handle,
                })
            })
            .collect();

        Ok(TreeListing {
            entries,
            truncated: tree.truncated,
        })
    }

    /// Downloads the payload behind an entry's fetch handle.
    pub async fn get_blob(&self, fetch_handle: &str) -> ProviderResult<BlobPayload> {
        debug!("GitHub get_blob: {}", fetch_handle);
        self.get_json(fetch_handle, &[]).await
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> String {
        let mut url = format!(
            "{}/repos/{}/{}/contents",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name)
        );
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> ProviderResult<T> {
        let mut req = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let err =
                GitContextEngineProviderError::from_status(status.as_u16(), retry_after(&resp));
            debug!(%status, url, "GitHub returned non-success status");
            return Err(err);
        }

        resp.json::<T>()
            .await
            .map_err(|e| GitContextEngineProviderError::InvalidResponse(e.to_string()))
    }
}

fn retry_after(resp: &Response) -> Option<u64> {
    resp.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Contents API directory item (subset).
#[derive(Debug, Deserialize)]
struct GitHubContentEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    url: Option<String>,
}

/// Repository metadata (subset).
#[derive(Debug, Deserialize)]
struct GitHubRepo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GitHubTree {
    #[serde(default)]
    tree: Vec<GitHubTreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubTreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    url: Option<String>,
}
