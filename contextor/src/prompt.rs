//! Prompt builder: fixed system message, mode-specific output structure and a
//! budgeted repository context block.

use git_context_engine::{RepoContext, RepoRef};
use serde_json::{Value, json};

use crate::report::{AnalysisMode, OutputFormat, SectionKind};

/// Per-file body budget (chars) for regular reports.
pub const BODY_BUDGET: usize = 4_000;
/// Per-file body budget (chars) with deep reasoning.
pub const BODY_BUDGET_DEEP: usize = 12_000;

/// Default system instructions for repository reports.
pub const DEFAULT_SYSTEM: &str = "\
You are a senior software architect reviewing an unfamiliar code repository.
Be concrete: name files, directories, frameworks and patterns you actually see.
Never invent files that are not listed. Keep each item to one or two sentences.";

/// Replaces the context block when the source host refused to serve files.
pub const FALLBACK_NOTICE: &str = "\
NOTE: The repository contents could not be retrieved (the source host rate-limited the request).
Infer the most likely architecture from the repository name alone.
State clearly, in the Project Overview, that this analysis is inferred from the name and was not based on the source code.";

const REASONING: &str = "\
Think step by step before answering. Trace how the listed files depend on each other,
follow the main data path end to end, and justify every risk with evidence from the files.
Prefer depth over breadth: more detailed items are welcome.";

const META_HEADER: &str = "=== META ANALYSIS ===";
const DIAGRAM_HEADER: &str = "=== DIAGRAM ===";

/// What to send to the generation backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub system: String,
    /// Required output structure for the chosen mode/format.
    pub structure: String,
    /// Extra instructions, present only for deep reasoning.
    pub reasoning: Option<String>,
    /// Repository context block.
    pub prompt: String,
    /// Output schema, present only for [`OutputFormat::Json`].
    pub schema: Option<Value>,
}

impl ReportRequest {
    /// Full system message: instructions, structure and optional reasoning.
    pub fn system_message(&self) -> String {
        let reasoning_len = self.reasoning.as_ref().map_or(0, String::len);
        let mut out = String::with_capacity(
            self.system.len() + self.structure.len() + reasoning_len + 4,
        );
        out.push_str(&self.system);
        out.push_str("\n\n");
        out.push_str(&self.structure);
        if let Some(r) = &self.reasoning {
            out.push_str("\n\n");
            out.push_str(r);
        }
        out
    }
}

/// Knobs for [`build_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub mode: AnalysisMode,
    pub deep_reasoning: bool,
    pub format: OutputFormat,
    pub body_budget: usize,
    pub body_budget_deep: usize,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::Full,
            deep_reasoning: false,
            format: OutputFormat::Sections,
            body_budget: BODY_BUDGET,
            body_budget_deep: BODY_BUDGET_DEEP,
        }
    }
}

impl RequestOptions {
    pub fn effective_budget(&self) -> usize {
        if self.deep_reasoning {
            self.body_budget_deep
        } else {
            self.body_budget
        }
    }
}

/// Builds the full request for one report.
///
/// # Example
/// ```
/// # use contextor::prompt::{build_request, RequestOptions, FALLBACK_NOTICE};
/// # use git_context_engine::{RepoContext, RepoRef};
/// let req = build_request(
///     &RepoRef::new("acme", "widget"),
///     &RepoContext::fallback(),
///     &RequestOptions::default(),
/// );
/// assert!(req.prompt.contains(FALLBACK_NOTICE));
/// ```
pub fn build_request(repo: &RepoRef, ctx: &RepoContext, opts: &RequestOptions) -> ReportRequest {
    let (structure, schema) = match opts.format {
        OutputFormat::Sections => (sections_structure(opts.mode), None),
        OutputFormat::Json => (json_structure(opts.mode), Some(report_schema())),
    };

    ReportRequest {
        system: DEFAULT_SYSTEM.to_string(),
        structure,
        reasoning: opts.deep_reasoning.then(|| REASONING.to_string()),
        prompt: build_context_block(repo, ctx, opts.effective_budget()),
        schema,
    }
}

/// Repository header, structural listing and delimited file bodies.
///
/// For a fallback context the whole block is replaced by [`FALLBACK_NOTICE`].
pub fn build_context_block(repo: &RepoRef, ctx: &RepoContext, body_budget: usize) -> String {
    let mut out = String::new();
    out.push_str("Repository: ");
    out.push_str(&repo.to_string());
    out.push_str("\n\n");

    if ctx.is_fallback {
        out.push_str(FALLBACK_NOTICE);
        out.push('\n');
        return out;
    }

    out.push_str("Structure:\n");
    out.push_str(&ctx.tree_paths.join("\n"));
    out.push_str("\n\n");

    for f in &ctx.files {
        out.push_str("--- FILE: ");
        out.push_str(&f.path);
        out.push_str(" ---\n");
        out.push_str(safe_truncate(&f.text, body_budget));
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("--- END FILE ---\n\n");
    }

    out
}

fn sections_structure(mode: AnalysisMode) -> String {
    let mut out = String::from(
        "Answer ONLY with the sections below, in this order. Start each section with its header line exactly as written, then one item per line prefixed with \"- \".\n",
    );
    for kind in mode.sections() {
        out.push_str(kind.header());
        out.push('\n');
    }
    out.push_str(META_HEADER);
    out.push_str("\n- Quality Score: <1-10>\n- Complexity: <Beginner|Intermediate|Advanced>\n- Maintainability: <Low|Medium|High>\n");
    if mode.wants_diagram() {
        out.push_str(DIAGRAM_HEADER);
        out.push_str("\n<a mermaid flowchart of the main components, raw lines, no code fences>\n");
    }
    out
}

fn json_structure(mode: AnalysisMode) -> String {
    let keys = mode
        .sections()
        .iter()
        .map(|k| k.json_key())
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = format!(
        "Answer ONLY with one JSON object, no prose and no code fences. Fill these arrays of strings: {keys}. Leave the other section arrays empty.\n\
         Always include \"meta\" with \"qualityScore\" (integer 1-10), \"complexityLevel\" (beginner|intermediate|advanced) and \"maintainability\" (low|medium|high)."
    );
    if mode.wants_diagram() {
        out.push_str(
            "\nPut a mermaid flowchart of the main components into \"diagram\" as a string.",
        );
    } else {
        out.push_str("\nSet \"diagram\" to an empty string.");
    }
    out
}

/// JSON schema of the report object.
pub fn report_schema() -> Value {
    let list = json!({ "type": "array", "items": { "type": "string" } });
    let mut properties = serde_json::Map::new();
    for kind in SectionKind::ALL {
        properties.insert(kind.json_key().to_string(), list.clone());
    }
    properties.insert(
        "meta".into(),
        json!({
            "type": "object",
            "properties": {
                "qualityScore": { "type": "integer", "minimum": 1, "maximum": 10 },
                "complexityLevel": { "type": "string", "enum": ["beginner", "intermediate", "advanced"] },
                "maintainability": { "type": "string", "enum": ["low", "medium", "high"] }
            },
            "required": ["qualityScore", "complexityLevel", "maintainability"],
            "additionalProperties": false
        }),
    );
    properties.insert("diagram".into(), json!({ "type": "string" }));

    let required: Vec<Value> = properties.keys().cloned().map(Value::String).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// Truncates to at most `max` chars.
fn safe_truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_context_engine::FileContent;

    fn repo() -> RepoRef {
        RepoRef::new("acme", "widget")
    }

    fn ctx() -> RepoContext {
        RepoContext::new(
            vec!["README.md".to_string(), "src".to_string(), "src/main.go".to_string()],
            vec![
                FileContent {
                    path: "README.md".into(),
                    text: "# Widget".into(),
                },
                FileContent {
                    path: "src/main.go".into(),
                    text: "é".repeat(5_000),
                },
            ],
        )
    }

    #[test]
    fn context_block_layout() {
        let req = build_request(&repo(), &ctx(), &RequestOptions::default());
        assert!(req.prompt.starts_with("Repository: acme/widget\n"));
        assert!(req.prompt.contains("README.md\nsrc\nsrc/main.go"));
        assert!(req.prompt.contains("--- FILE: README.md ---\n# Widget\n--- END FILE ---"));
        assert_eq!(req.prompt.matches("--- END FILE ---").count(), 2);
        assert!(req.reasoning.is_none());
        assert!(req.schema.is_none());
    }

    #[test]
    fn bodies_truncate_on_char_boundary() {
        let normal = build_request(&repo(), &ctx(), &RequestOptions::default());
        assert_eq!(normal.prompt.matches('é').count(), BODY_BUDGET);

        let deep_opts = RequestOptions {
            deep_reasoning: true,
            ..RequestOptions::default()
        };
        let deep = build_request(&repo(), &ctx(), &deep_opts);
        assert_eq!(deep.prompt.matches('é').count(), 5_000);
        assert!(deep.reasoning.is_some());
    }

    #[test]
    fn fallback_replaces_context() {
        let req = build_request(&repo(), &RepoContext::fallback(), &RequestOptions::default());
        assert!(req.prompt.contains(FALLBACK_NOTICE));
        assert!(req.prompt.contains("acme/widget"));
        assert!(!req.prompt.contains("--- FILE:"));
        assert!(!req.prompt.contains("Structure:"));
    }

    #[test]
    fn structure_follows_mode() {
        let risks = RequestOptions {
            mode: AnalysisMode::Risks,
            ..RequestOptions::default()
        };
        let req = build_request(&repo(), &ctx(), &risks);
        assert!(req.structure.contains("=== CODE QUALITY & RISKS ==="));
        assert!(req.structure.contains(META_HEADER));
        assert!(!req.structure.contains(DIAGRAM_HEADER));
        assert!(!req.structure.contains("=== DATA FLOW ==="));

        let full = build_request(&repo(), &ctx(), &RequestOptions::default());
        for kind in SectionKind::ALL {
            assert!(full.structure.contains(kind.header()));
        }
        assert!(full.structure.contains(DIAGRAM_HEADER));
    }

    #[test]
    fn json_format_carries_schema() {
        let opts = RequestOptions {
            format: OutputFormat::Json,
            mode: AnalysisMode::Architecture,
            ..RequestOptions::default()
        };
        let req = build_request(&repo(), &ctx(), &opts);
        let schema = req.schema.expect("schema");
        assert_eq!(schema["properties"]["meta"]["properties"]["qualityScore"]["maximum"], 10);
        assert_eq!(schema["required"].as_array().unwrap().len(), 8);
        assert!(req.structure.contains("keyComponents"));
        assert!(!req.structure.contains("codeQualityRisks,"));
    }

    #[test]
    fn system_message_joins_parts() {
        let opts = RequestOptions {
            deep_reasoning: true,
            ..RequestOptions::default()
        };
        let req = build_request(&repo(), &ctx(), &opts);
        let sys = req.system_message();
        assert!(sys.starts_with(DEFAULT_SYSTEM));
        assert!(sys.contains("=== PROJECT OVERVIEW ==="));
        assert!(sys.ends_with(REASONING));
    }
}
