//! Incremental report parser.
//!
//! Every call re-scans the whole accumulated buffer and returns a fully
//! populated [`Report`]; nothing is carried between calls. Two shapes:
//!
//! - delimited sections: `=== HEADER ===` lines followed by bullet items
//! - JSON: one (possibly fenced, possibly incomplete) object
//!
//! Mid-stream calls never fail. Only the final JSON parse can.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ContextorError;
use crate::report::{
    ComplexityLevel, DEFAULT_QUALITY_SCORE, Maintainability, MetaSummary, OutputFormat, Report,
    SectionKind, clamp_score,
};

static FIRST_INT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+").ok());

const BULLETS: [&str; 3] = ["- ", "• ", "* "];

/// Parses a partially received answer.
///
/// `None` means the buffer is not parseable yet (JSON only); the caller
/// skips that snapshot.
pub fn parse_snapshot(text: &str, format: OutputFormat) -> Option<Report> {
    match format {
        OutputFormat::Sections => Some(parse_sections(text, false)),
        OutputFormat::Json => {
            let body = strip_fences(text);
            parse_json(body)
                .ok()
                .or_else(|| repair_partial_json(body).and_then(|fixed| parse_json(&fixed).ok()))
        }
    }
}

/// Parses the complete answer once the stream has ended.
///
/// # Errors
/// [`ContextorError::Parse`] when a JSON answer is not a valid report object.
pub fn parse_final(text: &str, format: OutputFormat) -> Result<Report, ContextorError> {
    match format {
        OutputFormat::Sections => Ok(parse_sections(text, true)),
        OutputFormat::Json => parse_json(strip_fences(text)).map_err(|e| {
            debug!(error = %e, len = text.len(), "final JSON parse failed");
            ContextorError::Parse(e.to_string())
        }),
    }
}

/* ------------------------------------------------------------------------- */
/* Delimited sections                                                        */
/* ------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Section(SectionKind),
    Meta,
    Diagram,
    /// Unknown header: following lines go nowhere.
    Discard,
}

/// Name inside a `=== NAME ===` line, if the line is a complete header.
fn header_name(line: &str) -> Option<&str> {
    let t = line.trim();
    if t.len() < 6 || !t.starts_with("===") || !t.ends_with("===") {
        return None;
    }
    let name = t.trim_matches('=').trim();
    (!name.is_empty()).then_some(name)
}

fn route(header: &str) -> Target {
    let h = header.to_uppercase();
    if h.contains("META") {
        Target::Meta
    } else if h.contains("DIAGRAM") {
        Target::Diagram
    } else if h.contains("OVERVIEW") {
        Target::Section(SectionKind::ProjectOverview)
    } else if h.contains("ARCHITECTURE") {
        Target::Section(SectionKind::ArchitectureSummary)
    } else if h.contains("COMPONENT") {
        Target::Section(SectionKind::KeyComponents)
    } else if h.contains("FLOW") {
        Target::Section(SectionKind::DataFlow)
    } else if h.contains("QUALITY") || h.contains("RISK") {
        Target::Section(SectionKind::CodeQualityRisks)
    } else if h.contains("IMPROVEMENT") || h.contains("RECOMMENDATION") {
        Target::Section(SectionKind::Improvements)
    } else {
        Target::Discard
    }
}

/// A line holding only a bullet marker, e.g. `-` before its text arrives.
fn is_bare_bullet(line: &str) -> bool {
    let t = line.trim();
    BULLETS.iter().any(|b| b.trim_end() == t)
}

/// Trims, strips one leading bullet marker, and drops empty results.
fn clean_item(line: &str) -> Option<String> {
    if is_bare_bullet(line) {
        return None;
    }
    let t = line.trim();
    let t = BULLETS
        .iter()
        .find_map(|b| t.strip_prefix(b))
        .unwrap_or(t)
        .trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Parses the delimited-sections shape.
///
/// With `complete == false` an unterminated last line that looks like the
/// start of a header (`=` prefix, not yet a full header) or is a lone
/// bullet marker is held back.
pub fn parse_sections(text: &str, complete: bool) -> Report {
    let mut report = Report::default();
    let mut meta_items: Vec<String> = Vec::new();
    let mut diagram: Vec<&str> = Vec::new();
    let mut target: Option<Target> = None;

    let mut lines: Vec<&str> = text.lines().collect();
    if !complete && !text.ends_with('\n') {
        if let Some(last) = lines.last() {
            let partial_header = last.trim_start().starts_with('=') && header_name(last).is_none();
            if partial_header || is_bare_bullet(last) {
                lines.pop();
            }
        }
    }

    for line in lines {
        if let Some(name) = header_name(line) {
            let t = route(name);
            match t {
                Target::Section(kind) => report.section_mut(kind).items.clear(),
                Target::Meta => meta_items.clear(),
                Target::Diagram => diagram.clear(),
                Target::Discard => {}
            }
            target = Some(t);
            continue;
        }

        match target {
            Some(Target::Diagram) => diagram.push(line),
            Some(Target::Section(kind)) => {
                if let Some(item) = clean_item(line) {
                    report.section_mut(kind).items.push(item);
                }
            }
            Some(Target::Meta) => meta_items.extend(clean_item(line)),
            Some(Target::Discard) | None => {}
        }
    }

    report.meta = meta_from_items(&meta_items);
    report.diagram = join_diagram(&diagram);
    report
}

fn join_diagram(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

fn first_int(s: &str) -> Option<i64> {
    let re = FIRST_INT.as_ref()?;
    let m = re.find(s)?;
    // Overlong digit runs saturate instead of failing.
    Some(m.as_str().parse::<i64>().unwrap_or(i64::MAX))
}

fn complexity_of(s: &str) -> ComplexityLevel {
    let l = s.to_lowercase();
    if l.contains("beginner") {
        ComplexityLevel::Beginner
    } else if l.contains("advanced") {
        ComplexityLevel::Advanced
    } else {
        ComplexityLevel::Intermediate
    }
}

fn maintainability_of(s: &str) -> Maintainability {
    let l = s.to_lowercase();
    if l.contains("low") {
        Maintainability::Low
    } else if l.contains("high") {
        Maintainability::High
    } else {
        Maintainability::Medium
    }
}

fn meta_from_items(items: &[String]) -> MetaSummary {
    let mut meta = MetaSummary::default();
    for item in items {
        let lower = item.to_lowercase();
        if lower.contains("score") {
            meta.quality_score = first_int(item).map_or(DEFAULT_QUALITY_SCORE, clamp_score);
        }
        if lower.contains("complexity") {
            meta.complexity_level = complexity_of(after_label(item));
        }
        if lower.contains("maintainability") {
            meta.maintainability = maintainability_of(after_label(item));
        }
    }
    meta
}

/// Value part of `Label: value`, or the whole item without a colon.
fn after_label(item: &str) -> &str {
    item.split_once(':').map_or(item, |(_, v)| v)
}

/* ------------------------------------------------------------------------- */
/* JSON                                                                      */
/* ------------------------------------------------------------------------- */

/// Removes a leading ```` ``` ```` / ```` ```json ```` fence line and a trailing fence.
pub fn strip_fences(text: &str) -> &str {
    let mut t = text.trim();
    if t.starts_with("```") {
        t = match t.find('\n') {
            Some(nl) => &t[nl + 1..],
            // Only the opening fence has arrived so far.
            None => "",
        };
    }
    if let Some(rest) = t.trim_end().strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

/// Loosely typed report as produced by the model.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    #[serde(default, alias = "project_overview")]
    project_overview: Option<Value>,
    #[serde(default, alias = "architecture_summary")]
    architecture_summary: Option<Value>,
    #[serde(default, alias = "key_components")]
    key_components: Option<Value>,
    #[serde(default, alias = "data_flow")]
    data_flow: Option<Value>,
    #[serde(default, alias = "code_quality_risks", alias = "codeQualityAndRisks")]
    code_quality_risks: Option<Value>,
    #[serde(default)]
    improvements: Option<Value>,
    #[serde(default)]
    meta: Option<Value>,
    #[serde(default)]
    diagram: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeta {
    #[serde(default, alias = "quality_score")]
    quality_score: Option<Value>,
    #[serde(default, alias = "complexity_level", alias = "complexity")]
    complexity_level: Option<Value>,
    #[serde(default)]
    maintainability: Option<Value>,
}

/// Parses one complete JSON report object.
pub fn parse_json(body: &str) -> Result<Report, serde_json::Error> {
    let raw: RawReport = serde_json::from_str(body)?;
    Ok(raw.into_report())
}

impl RawReport {
    fn into_report(self) -> Report {
        let mut report = Report::default();
        let fields = [
            (SectionKind::ProjectOverview, self.project_overview),
            (SectionKind::ArchitectureSummary, self.architecture_summary),
            (SectionKind::KeyComponents, self.key_components),
            (SectionKind::DataFlow, self.data_flow),
            (SectionKind::CodeQualityRisks, self.code_quality_risks),
            (SectionKind::Improvements, self.improvements),
        ];
        for (kind, value) in fields {
            report.section_mut(kind).items = value.map(items_of).unwrap_or_default();
        }

        report.meta = self
            .meta
            .and_then(|v| serde_json::from_value::<RawMeta>(v).ok())
            .map(RawMeta::into_meta)
            .unwrap_or_default();
        report.diagram = self.diagram.map(diagram_of).unwrap_or_default();
        report
    }
}

impl RawMeta {
    fn into_meta(self) -> MetaSummary {
        let quality_score = match self.quality_score {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .map_or(DEFAULT_QUALITY_SCORE, clamp_score),
            Some(Value::String(s)) => first_int(&s).map_or(DEFAULT_QUALITY_SCORE, clamp_score),
            _ => DEFAULT_QUALITY_SCORE,
        };
        let complexity_level = match self.complexity_level {
            Some(Value::String(s)) => complexity_of(&s),
            _ => ComplexityLevel::default(),
        };
        let maintainability = match self.maintainability {
            Some(Value::String(s)) => maintainability_of(&s),
            _ => Maintainability::default(),
        };
        MetaSummary {
            quality_score,
            complexity_level,
            maintainability,
        }
    }
}

fn items_of(value: Value) -> Vec<String> {
    match value {
        Value::Array(values) => values.into_iter().flat_map(items_of).collect(),
        Value::String(s) => s.lines().filter_map(clean_item).collect(),
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        // `{ "name": .., "description": .. }` style entries.
        Value::Object(map) => {
            let pick = |keys: &[&str]| {
                keys.iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };
            let name = pick(&["name", "title", "component"]);
            let detail = pick(&["description", "details", "summary", "purpose"]);
            let joined = match (name, detail) {
                (Some(n), Some(d)) => format!("{n}: {d}"),
                (Some(one), None) | (None, Some(one)) => one.to_string(),
                (None, None) => map
                    .values()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(": "),
            };
            clean_item(&joined).into_iter().collect()
        }
        Value::Null => Vec::new(),
    }
}

fn diagram_of(value: Value) -> String {
    match value {
        Value::String(s) => join_diagram(&s.lines().collect::<Vec<_>>()),
        Value::Array(lines) => {
            let lines: Vec<String> = lines
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect();
            join_diagram(&lines.iter().map(String::as_str).collect::<Vec<_>>())
        }
        _ => String::new(),
    }
}

/// Closes whatever is left open in a truncated JSON document.
///
/// Returns `None` when no plausible completion exists (e.g. the text ends
/// right after a key's colon).
pub fn repair_partial_json(body: &str) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in body.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        return None;
    }

    let mut out = body.to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    loop {
        let trimmed = out.trim_end();
        if let Some(rest) = trimmed.strip_suffix(',') {
            out = rest.to_string();
        } else {
            out.truncate(trimmed.len());
            break;
        }
    }
    if out.ends_with(':') {
        return None;
    }

    out.extend(stack.iter().rev());
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "=== PROJECT OVERVIEW ===\n- A CLI tool\n- Written in Go\n=== META ANALYSIS ===\n- Quality Score: 8\n- Complexity: Advanced\n- Maintainability: High\n";

    #[test]
    fn sections_scenario() {
        let r = parse_final(SAMPLE, OutputFormat::Sections).unwrap();
        assert_eq!(r.project_overview.items, vec!["A CLI tool", "Written in Go"]);
        assert_eq!(r.meta.quality_score, 8);
        assert_eq!(r.meta.complexity_level, ComplexityLevel::Advanced);
        assert_eq!(r.meta.maintainability, Maintainability::High);
        assert!(r.architecture_summary.items.is_empty());
    }

    #[test]
    fn char_by_char_accumulation_matches_one_shot() {
        let text = format!(
            "{SAMPLE}=== DIAGRAM ===\n\n  graph TD\n    A --> B\n\n=== IMPROVEMENTS ===\n• Add tests\n* Pin deps\n"
        );
        let one_shot = parse_final(&text, OutputFormat::Sections).unwrap();

        let mut buf = String::new();
        for c in text.chars() {
            buf.push(c);
            let snap = parse_snapshot(&buf, OutputFormat::Sections).unwrap();
            assert!(snap.item_count() <= one_shot.item_count());
            for kind in SectionKind::ALL {
                for item in &snap.section(kind).items {
                    assert!(!is_bare_bullet(item), "bare marker {item:?} after {buf:?}");
                }
            }
        }
        assert_eq!(parse_final(&buf, OutputFormat::Sections).unwrap(), one_shot);
        assert_eq!(one_shot.diagram, "  graph TD\n    A --> B");
        assert_eq!(one_shot.improvements.items, vec!["Add tests", "Pin deps"]);
    }

    #[test]
    fn defaults_without_meta() {
        let r = parse_final("=== OVERVIEW ===\n- x\n", OutputFormat::Sections).unwrap();
        assert_eq!(r.meta, MetaSummary::default());
        assert_eq!(r.meta.quality_score, 5);

        let empty = parse_final("", OutputFormat::Sections).unwrap();
        assert_eq!(empty, Report::default());
    }

    #[test]
    fn partial_header_is_held_back() {
        let r = parse_snapshot("=== OVERVIEW ===\n- a\n=== ARCH", OutputFormat::Sections).unwrap();
        assert_eq!(r.project_overview.items, vec!["a"]);

        // an unterminated item line is shown as-is
        let r = parse_snapshot("=== OVERVIEW ===\n- a\n- b", OutputFormat::Sections).unwrap();
        assert_eq!(r.project_overview.items, vec!["a", "b"]);
    }

    #[test]
    fn unknown_header_routes_nowhere_and_repeat_resets() {
        let text = "=== OVERVIEW ===\n- old\n=== NOTES ===\n- ignored\n=== OVERVIEW ===\n- new\n";
        let r = parse_final(text, OutputFormat::Sections).unwrap();
        assert_eq!(r.project_overview.items, vec!["new"]);
        assert_eq!(r.item_count(), 1);
    }

    #[test]
    fn header_keywords() {
        assert_eq!(route("DATA FLOW"), Target::Section(SectionKind::DataFlow));
        assert_eq!(route("Code Quality & Risks"), Target::Section(SectionKind::CodeQualityRisks));
        assert_eq!(route("RECOMMENDATIONS"), Target::Section(SectionKind::Improvements));
        assert_eq!(route("META ANALYSIS"), Target::Meta);
        assert_eq!(route("ARCHITECTURE DIAGRAM"), Target::Diagram);
        assert_eq!(header_name("==="), None);
        assert_eq!(header_name("======"), None);
        assert_eq!(header_name("  === KEY COMPONENTS ===  "), Some("KEY COMPONENTS"));
    }

    #[test]
    fn meta_score_clamps_and_defaults() {
        let meta = meta_from_items(&["Quality Score: 42/10".into()]);
        assert_eq!(meta.quality_score, 10);
        let meta = meta_from_items(&["Quality Score: n/a".into()]);
        assert_eq!(meta.quality_score, 5);
        let meta = meta_from_items(&["Maintainability: moderate, some duplication".into()]);
        assert_eq!(meta.maintainability, Maintainability::Medium);
        let meta = meta_from_items(&["Maintainability: LOW".into()]);
        assert_eq!(meta.maintainability, Maintainability::Low);
        // substring match on the value after the label
        let meta = meta_from_items(&["Maintainability: Highly maintainable".into()]);
        assert_eq!(meta.maintainability, Maintainability::High);
        let meta = meta_from_items(&["Follows conventions; maintainability: high".into()]);
        assert_eq!(meta.maintainability, Maintainability::High);
    }

    #[test]
    fn highly_maintainable_reads_as_high() {
        let text = "=== META ANALYSIS ===\n- Maintainability: Highly maintainable\n";
        let r = parse_final(text, OutputFormat::Sections).unwrap();
        assert_eq!(r.meta.maintainability, Maintainability::High);
    }

    #[test]
    fn lone_bullet_is_held_back() {
        let r = parse_snapshot("=== PROJECT OVERVIEW ===\n- Does X\n-", OutputFormat::Sections)
            .unwrap();
        assert_eq!(r.project_overview.items, vec!["Does X"]);
        let r = parse_snapshot("=== PROJECT OVERVIEW ===\n- Does X\n•", OutputFormat::Sections)
            .unwrap();
        assert_eq!(r.project_overview.items, vec!["Does X"]);

        // a bare marker line in a finished answer is not an item either
        let r = parse_final("=== PROJECT OVERVIEW ===\n- Does X\n*\n", OutputFormat::Sections)
            .unwrap();
        assert_eq!(r.project_overview.items, vec!["Does X"]);
    }

    const JSON: &str = r#"{
  "projectOverview": ["A CLI tool", "- Written in Go"],
  "architecture_summary": "Layered\n- cmd/ entrypoint",
  "keyComponents": [{"name": "parser", "description": "reads input"}],
  "dataFlow": [],
  "codeQualityRisks": ["No tests"],
  "improvements": ["Add tests"],
  "meta": {"qualityScore": "7", "complexityLevel": "BEGINNER", "maintainability": "low"},
  "diagram": "graph TD\n  A --> B"
}"#;

    #[test]
    fn json_final_with_fences_and_aliases() {
        let fenced = format!("```json\n{JSON}\n```");
        let r = parse_final(&fenced, OutputFormat::Json).unwrap();
        assert_eq!(r.project_overview.items, vec!["A CLI tool", "Written in Go"]);
        assert_eq!(r.architecture_summary.items, vec!["Layered", "cmd/ entrypoint"]);
        assert_eq!(r.key_components.items, vec!["parser: reads input"]);
        assert_eq!(r.meta.quality_score, 7);
        assert_eq!(r.meta.complexity_level, ComplexityLevel::Beginner);
        assert_eq!(r.meta.maintainability, Maintainability::Low);
        assert_eq!(r.diagram, "graph TD\n  A --> B");
    }

    #[test]
    fn json_missing_fields_default() {
        let r = parse_final(r#"{"meta": {"qualityScore": 0}}"#, OutputFormat::Json).unwrap();
        assert_eq!(r.meta.quality_score, 1);
        assert_eq!(r.item_count(), 0);
        assert_eq!(r.project_overview.title, "Project Overview");
    }

    #[test]
    fn json_final_failure_is_parse_error() {
        let err = parse_final(r#"{"projectOverview": ["a""#, OutputFormat::Json).unwrap_err();
        assert!(matches!(err, ContextorError::Parse(_)));
        assert!(parse_final("not json at all", OutputFormat::Json).is_err());
    }

    #[test]
    fn json_snapshots_never_fail_and_converge() {
        let fenced = format!("```json\n{JSON}\n```");
        let mut buf = String::new();
        let mut seen = 0;
        for c in fenced.chars() {
            buf.push(c);
            if parse_snapshot(&buf, OutputFormat::Json).is_some() {
                seen += 1;
            }
        }
        assert!(seen > 10);
        assert_eq!(
            parse_snapshot(&buf, OutputFormat::Json),
            Some(parse_final(&buf, OutputFormat::Json).unwrap())
        );
    }

    #[test]
    fn repair_closes_open_structures() {
        assert_eq!(
            repair_partial_json(r#"{"projectOverview": ["A CLI"#).as_deref(),
            Some(r#"{"projectOverview": ["A CLI"]}"#)
        );
        assert_eq!(
            repair_partial_json(r#"{"a": ["x", "#).as_deref(),
            Some(r#"{"a": ["x"]}"#)
        );
        assert_eq!(repair_partial_json(r#"{"a": "#), None);
        assert_eq!(repair_partial_json(r#"{"a": 1}"#), None);

        let snap = parse_snapshot(r#"{"projectOverview": ["A CLI"#, OutputFormat::Json).unwrap();
        assert_eq!(snap.project_overview.items, vec!["A CLI"]);
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_fences("```"), "");
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_fences("  {\"a\":1}  "), "{\"a\":1}");
    }
}
