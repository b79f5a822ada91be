//! Repository reference parsing.
//!
//! Accepts the forms users paste into a form field: full URLs, URLs without a
//! scheme, URLs with trailing `/tree/...` or query parts. Only the first two
//! path segments matter and they are kept verbatim.

use tracing::debug;
use url::Url;

use crate::git_providers::types::RepoRef;

/// Hosts accepted as the code-hosting domain.
const ACCEPTED_HOSTS: &[&str] = &["github.com", "www.github.com"];

/// Parses a raw repository reference into an [`RepoRef`].
///
/// Returns `None` when the input is not a URL, points to a foreign host or
/// has fewer than two non-empty path segments. Owner and name are not
/// normalized (case and a trailing `.git` are preserved).
pub fn parse_repo_ref(raw: &str) -> Option<RepoRef> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let lowered = raw.to_ascii_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let url = match Url::parse(&candidate) {
        Ok(u) => u,
        Err(e) => {
            debug!(input = raw, error = %e, "repository reference is not a URL");
            return None;
        }
    };

    let host = url.host_str()?;
    if !ACCEPTED_HOSTS.contains(&host) {
        debug!(input = raw, host, "repository reference points to a foreign host");
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let name = segments.next()?;

    Some(RepoRef::new(owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_domain_gets_a_scheme() {
        assert_eq!(
            parse_repo_ref("github.com/acme/widget"),
            Some(RepoRef::new("acme", "widget"))
        );
    }

    #[test]
    fn scheme_does_not_change_the_result() {
        let expected = Some(RepoRef::new("rust-lang", "cargo"));
        for raw in [
            "github.com/rust-lang/cargo",
            "https://github.com/rust-lang/cargo",
            "http://github.com/rust-lang/cargo",
            "HTTPS://github.com/rust-lang/cargo",
            "www.github.com/rust-lang/cargo",
            "  https://github.com/rust-lang/cargo/  ",
        ] {
            assert_eq!(parse_repo_ref(raw), expected, "input: {raw}");
        }
    }

    #[test]
    fn extra_segments_and_query_are_ignored() {
        assert_eq!(
            parse_repo_ref("https://github.com/acme/widget/tree/main/src?tab=readme#top"),
            Some(RepoRef::new("acme", "widget"))
        );
    }

    #[test]
    fn segments_are_kept_verbatim() {
        assert_eq!(
            parse_repo_ref("https://github.com/Acme/Widget.git"),
            Some(RepoRef::new("Acme", "Widget.git"))
        );
    }

    #[test]
    fn too_few_segments() {
        assert_eq!(parse_repo_ref("github.com"), None);
        assert_eq!(parse_repo_ref("https://github.com/acme"), None);
        assert_eq!(parse_repo_ref("https://github.com/acme/"), None);
        assert_eq!(parse_repo_ref(""), None);
    }

    #[test]
    fn foreign_hosts_are_rejected() {
        assert_eq!(parse_repo_ref("https://gitlab.com/acme/widget"), None);
        assert_eq!(parse_repo_ref("github.com.evil.io/acme/widget"), None);
        assert_eq!(parse_repo_ref("ftp://github.com/acme/widget"), None);
    }

    #[test]
    fn garbage_is_not_a_url() {
        assert_eq!(parse_repo_ref("not a url at all"), None);
        assert_eq!(parse_repo_ref("https://"), None);
    }
}
