//! Context-set selection: picks a handful of representative files from a listing.
//!
//! Two tiers, both filled in listing order:
//!   1. canonical manifests/configs/readmes (exact name, case-insensitive)
//!   2. source files by extension, minus tests and declaration-only files
//!
//! Tier caps apply first, then the tiers are concatenated, deduplicated by
//! path and truncated to [`GLOBAL_CAP`]. Nothing is sorted; ties are broken by
//! input position only.

use std::collections::HashSet;

use crate::git_providers::types::TreeEntry;

/// Maximum number of files in a context set.
pub const GLOBAL_CAP: usize = 7;
/// Maximum number of tier-1 (config/manifest) files.
pub const CONFIG_TIER_CAP: usize = 3;
/// Maximum number of tier-2 (source code) files.
pub const CODE_TIER_CAP: usize = 4;

/// Canonical manifest/config/readme names, lowercase.
const PRIORITY_NAMES: &[&str] = &[
    "package.json",
    "readme.md",
    "readme",
    "cargo.toml",
    "go.mod",
    "requirements.txt",
    "pyproject.toml",
    "dockerfile",
    "docker-compose.yml",
    "pom.xml",
    "build.gradle",
    "composer.json",
    "gemfile",
    "tsconfig.json",
];

/// Source-code extensions, lowercase, without the dot.
const SOURCE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "py", "go", "rs", "java", "kt", "rb", "php", "c", "cc",
    "cpp", "h", "hpp", "cs", "swift", "scala", "vue", "svelte",
];

/// Filename markers of test files (checked on the lowercase name).
const TEST_MARKERS: &[&str] = &[".test.", ".spec."];

/// Suffix of declaration-only files.
const DECLARATION_SUFFIX: &str = ".d.ts";

/// Selects the capped context set from a repository listing.
///
/// Pure and deterministic; directories are never selected. Running it on its
/// own output returns the same entries.
pub fn select_files(entries: &[TreeEntry]) -> Vec<TreeEntry> {
    let config_tier = entries
        .iter()
        .filter(|e| e.is_file() && is_priority_file(e.name()))
        .take(CONFIG_TIER_CAP);

    let code_tier = entries
        .iter()
        .filter(|e| e.is_file() && is_code_file(e.name()))
        .take(CODE_TIER_CAP);

    let mut seen: HashSet<&str> = HashSet::new();
    config_tier
        .chain(code_tier)
        .filter(|e| seen.insert(e.path.as_str()))
        .take(GLOBAL_CAP)
        .cloned()
        .collect()
}

/// True for canonical manifest/config/readme names.
pub fn is_priority_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PRIORITY_NAMES.contains(&lower.as_str())
}

/// True for source files that qualify for the code tier.
pub fn is_code_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();

    if PRIORITY_NAMES.contains(&lower.as_str()) {
        return false;
    }
    if TEST_MARKERS.iter().any(|m| lower.contains(m)) {
        return false;
    }
    if lower.ends_with(DECLARATION_SUFFIX) {
        return false;
    }

    match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => SOURCE_EXTENSIONS.contains(&ext),
        _ => false,
    }
}
