//! Tracing helpers for binaries embedding the report pipeline.
//!
//! The fmt layer renders only events whose target belongs to one of the
//! pipeline crates, so a binary can stack it next to its own subscriber.

use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

/// Targets rendered by [`layer`].
pub const TARGET_PREFIXES: &[&str] = &[
    "ai_llm_service",
    "contextor",
    "git_context_engine",
    "repo_report",
];

/// RFC3339 UTC timer, e.g. `2025-09-12T10:20:30Z`.
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let s = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Compact single-line fmt layer limited to [`TARGET_PREFIXES`].
///
/// Writes to stderr so stdout stays free for the report itself.
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = io::stderr().is_terminal();
    let ours = filter::filter_fn(|meta| {
        TARGET_PREFIXES
            .iter()
            .any(|p| meta.target().starts_with(p))
    });

    fmt::layer()
        .with_writer(io::stderr)
        .with_timer(ChronoRfc3339Utc)
        .with_target(true)
        .with_ansi(use_ansi)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
        .with_filter(ours)
}

/// Level directive for one crate target, like `contextor=debug`.
pub fn level_directive(target: &str, level: Level) -> Result<Directive, ParseError> {
    format!("{target}={}", level.as_str().to_lowercase()).parse()
}

/// `RUST_LOG` (or `default`) plus `level` for every pipeline crate.
pub fn env_filter_with_level(default: &str, level: Level) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    TARGET_PREFIXES
        .iter()
        .filter_map(|t| level_directive(t, level).ok())
        .fold(base, EnvFilter::add_directive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_formats_target_and_level() {
        let d = level_directive("contextor", Level::DEBUG).unwrap();
        assert_eq!(d.to_string(), "contextor=debug");
    }
}
