//! Report data model and request knobs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContextorError;

/// The six fixed report categories, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    ProjectOverview,
    ArchitectureSummary,
    KeyComponents,
    DataFlow,
    CodeQualityRisks,
    Improvements,
}

impl SectionKind {
    pub const ALL: [SectionKind; 6] = [
        SectionKind::ProjectOverview,
        SectionKind::ArchitectureSummary,
        SectionKind::KeyComponents,
        SectionKind::DataFlow,
        SectionKind::CodeQualityRisks,
        SectionKind::Improvements,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::ProjectOverview => "Project Overview",
            Self::ArchitectureSummary => "Architecture Summary",
            Self::KeyComponents => "Key Components",
            Self::DataFlow => "Data Flow",
            Self::CodeQualityRisks => "Code Quality & Risks",
            Self::Improvements => "Improvements",
        }
    }

    /// Header line the model is asked to emit for this section.
    pub fn header(self) -> &'static str {
        match self {
            Self::ProjectOverview => "=== PROJECT OVERVIEW ===",
            Self::ArchitectureSummary => "=== ARCHITECTURE SUMMARY ===",
            Self::KeyComponents => "=== KEY COMPONENTS ===",
            Self::DataFlow => "=== DATA FLOW ===",
            Self::CodeQualityRisks => "=== CODE QUALITY & RISKS ===",
            Self::Improvements => "=== IMPROVEMENTS ===",
        }
    }

    /// Key of the section array in the JSON shape.
    pub fn json_key(self) -> &'static str {
        match self {
            Self::ProjectOverview => "projectOverview",
            Self::ArchitectureSummary => "architectureSummary",
            Self::KeyComponents => "keyComponents",
            Self::DataFlow => "dataFlow",
            Self::CodeQualityRisks => "codeQualityRisks",
            Self::Improvements => "improvements",
        }
    }
}

/// One named category holding ordered text items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub items: Vec<String>,
}

impl ReportSection {
    pub fn empty(kind: SectionKind) -> Self {
        Self {
            title: kind.title().to_string(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Maintainability {
    Low,
    #[default]
    Medium,
    High,
}

/// Default quality score when the model gives none.
pub const DEFAULT_QUALITY_SCORE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaSummary {
    /// 1..=10.
    pub quality_score: u8,
    pub complexity_level: ComplexityLevel,
    pub maintainability: Maintainability,
}

impl Default for MetaSummary {
    fn default() -> Self {
        Self {
            quality_score: DEFAULT_QUALITY_SCORE,
            complexity_level: ComplexityLevel::default(),
            maintainability: Maintainability::default(),
        }
    }
}

/// Clamps a raw score into 1..=10.
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(1, 10) as u8
}

/// Structured technical report.
///
/// Always fully populated: every section exists (possibly empty) and meta
/// carries defaults until the model says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub project_overview: ReportSection,
    pub architecture_summary: ReportSection,
    pub key_components: ReportSection,
    pub data_flow: ReportSection,
    pub code_quality_risks: ReportSection,
    pub improvements: ReportSection,
    pub meta: MetaSummary,
    pub diagram: String,
    pub is_fallback: bool,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            project_overview: ReportSection::empty(SectionKind::ProjectOverview),
            architecture_summary: ReportSection::empty(SectionKind::ArchitectureSummary),
            key_components: ReportSection::empty(SectionKind::KeyComponents),
            data_flow: ReportSection::empty(SectionKind::DataFlow),
            code_quality_risks: ReportSection::empty(SectionKind::CodeQualityRisks),
            improvements: ReportSection::empty(SectionKind::Improvements),
            meta: MetaSummary::default(),
            diagram: String::new(),
            is_fallback: false,
        }
    }
}

impl Report {
    pub fn section(&self, kind: SectionKind) -> &ReportSection {
        match kind {
            SectionKind::ProjectOverview => &self.project_overview,
            SectionKind::ArchitectureSummary => &self.architecture_summary,
            SectionKind::KeyComponents => &self.key_components,
            SectionKind::DataFlow => &self.data_flow,
            SectionKind::CodeQualityRisks => &self.code_quality_risks,
            SectionKind::Improvements => &self.improvements,
        }
    }

    pub fn section_mut(&mut self, kind: SectionKind) -> &mut ReportSection {
        match kind {
            SectionKind::ProjectOverview => &mut self.project_overview,
            SectionKind::ArchitectureSummary => &mut self.architecture_summary,
            SectionKind::KeyComponents => &mut self.key_components,
            SectionKind::DataFlow => &mut self.data_flow,
            SectionKind::CodeQualityRisks => &mut self.code_quality_risks,
            SectionKind::Improvements => &mut self.improvements,
        }
    }

    /// Total number of items across all sections.
    pub fn item_count(&self) -> usize {
        SectionKind::ALL
            .iter()
            .map(|k| self.section(*k).items.len())
            .sum()
    }
}

/// Which part of the report the model should focus on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    #[default]
    Full,
    Architecture,
    Risks,
}

impl AnalysisMode {
    /// Sections requested for this mode, in order.
    pub fn sections(self) -> &'static [SectionKind] {
        use SectionKind::*;
        match self {
            Self::Full => &SectionKind::ALL,
            Self::Architecture => &[ProjectOverview, ArchitectureSummary, KeyComponents, DataFlow],
            Self::Risks => &[ProjectOverview, CodeQualityRisks, Improvements],
        }
    }

    pub fn wants_diagram(self) -> bool {
        !matches!(self, Self::Risks)
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Architecture => "architecture",
            Self::Risks => "risks",
        })
    }
}

impl FromStr for AnalysisMode {
    type Err = ContextorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "architecture" | "arch" => Ok(Self::Architecture),
            "risks" | "risk" => Ok(Self::Risks),
            other => Err(ContextorError::Config(format!("unknown analysis mode '{other}'"))),
        }
    }
}

/// Textual shape the model answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `=== HEADER ===` delimited sections.
    #[default]
    Sections,
    /// One JSON object following the report schema.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sections => "sections",
            Self::Json => "json",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = ContextorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sections" | "text" => Ok(Self::Sections),
            "json" => Ok(Self::Json),
            other => Err(ContextorError::Config(format!("unknown output format '{other}'"))),
        }
    }
}
