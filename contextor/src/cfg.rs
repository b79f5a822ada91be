//! Runtime configuration loaded from environment variables.

use std::str::FromStr;

use crate::error::ContextorError;
use crate::prompt::{BODY_BUDGET, BODY_BUDGET_DEEP};
use crate::report::OutputFormat;

/// Report knobs. All fields have defaults via `from_env`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextorConfig {
    /// Default answer shape (`REPORT_FORMAT`).
    pub format: OutputFormat,
    /// Per-file body budget in chars (`REPORT_BODY_BUDGET`).
    pub body_budget: usize,
    /// Per-file body budget with deep reasoning (`REPORT_BODY_BUDGET_DEEP`).
    pub body_budget_deep: usize,
}

impl Default for ContextorConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Sections,
            body_budget: BODY_BUDGET,
            body_budget_deep: BODY_BUDGET_DEEP,
        }
    }
}

impl ContextorConfig {
    /// Build from environment variables with defaults.
    ///
    /// # Errors
    /// [`ContextorError::Config`] when `REPORT_FORMAT` is set to an unknown
    /// value or a budget is zero.
    pub fn from_env() -> Result<Self, ContextorError> {
        let format = match std::env::var("REPORT_FORMAT") {
            Ok(v) if !v.trim().is_empty() => OutputFormat::from_str(&v)?,
            _ => OutputFormat::Sections,
        };

        let cfg = Self {
            format,
            body_budget: parse("REPORT_BODY_BUDGET", BODY_BUDGET),
            body_budget_deep: parse("REPORT_BODY_BUDGET_DEEP", BODY_BUDGET_DEEP),
        };
        if cfg.body_budget == 0 || cfg.body_budget_deep == 0 {
            return Err(ContextorError::Config("report body budgets must be positive".into()));
        }
        Ok(cfg)
    }
}

fn parse<T: FromStr>(k: &str, dflt: T) -> T {
    std::env::var(k)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(dflt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_falls_back_on_garbage() {
        assert_eq!(parse("CONTEXTOR_TEST_SURELY_UNSET_VAR", 7usize), 7);
    }

    #[test]
    fn defaults_match_budgets() {
        let cfg = ContextorConfig::default();
        assert_eq!(cfg.body_budget, 4_000);
        assert_eq!(cfg.body_budget_deep, 12_000);
        assert_eq!(cfg.format, OutputFormat::Sections);
    }
}
