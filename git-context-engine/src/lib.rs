//! Repository context acquisition for report generation.
//!
//! Three pieces, leaves first:
//!   * [`locator`] turns a pasted URL into an `owner/name` pair
//!   * [`select`] picks a small, representative context set from a listing
//!   * [`fetch`] lists the repository and downloads the selected files
//!
//! The fetcher degrades to a name-only [`RepoContext::fallback`] when the
//! source host rate-limits us instead of failing the analysis.

pub mod errors;
pub mod fetch;
pub mod git_providers;
pub mod locator;
pub mod select;

pub use errors::{
    GitContextEngineConfigError, GitContextEngineError, GitContextEngineProviderError,
    GitContextEngineResult,
};
pub use fetch::ContextFetcher;
pub use git_providers::{
    EntryKind, FetcherConfig, FileContent, ListingStrategy, RepoContext, RepoRef, TreeEntry,
};
pub use locator::parse_repo_ref;
pub use select::select_files;
