//! Heuristic line/column enrichment for OperationOutcome issues.
//!
//! The upstream FHIR validator reports locations as FHIRPath-ish strings
//! (`Parameters.parameter[0].resource.TestScript.test[0].action[1].operation`)
//! with no source positions. This module estimates a `{line, column}` for
//! each issue by locating the last path segment's JSON key textually in the
//! pretty-printed document that was sent. It is a line locator, not a
//! parser: the first substring match wins and `{1, 1}` is the fallback.

use regex::Regex;
use serde_json::{Value, json};
use std::sync::OnceLock;
use testscript_core::{ISSUE_COL_EXTENSION, ISSUE_LINE_EXTENSION};

/// 1-based position in a pretty-printed JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub line: u32,
    pub column: u32,
}

impl TextPosition {
    /// Position reported when no better estimate exists.
    pub const FALLBACK: TextPosition = TextPosition { line: 1, column: 1 };
}

fn parameters_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Parameters\.parameter\[\d+\]\.resource\.").unwrap())
}

fn index_brackets() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d+\]").unwrap())
}

/// Reduces an issue location segment to the JSON key to search for.
///
/// Strips the `Parameters.parameter[n].resource.` wrapper the upstream
/// validator prepends, drops array index brackets, and keeps the final
/// dotted component. Returns `None` when nothing searchable remains.
pub fn normalize_segment(segment: &str) -> Option<String> {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return None;
    }
    let stripped = parameters_prefix().replace(trimmed, "");
    let without_indices = index_brackets().replace_all(&stripped, "");
    let key = without_indices
        .rsplit('.')
        .find(|part| !part.is_empty())?
        .to_string();
    if key.is_empty() { None } else { Some(key) }
}

/// Finds the first line of `pretty` containing the quoted key, in line
/// order. Positions are 1-based; `{1, 1}` when the key never appears.
pub fn locate_key(pretty: &str, key: &str) -> TextPosition {
    let needle = format!("\"{key}\"");
    for (i, line) in pretty.lines().enumerate() {
        if let Some(col) = line.find(&needle) {
            return TextPosition {
                line: i as u32 + 1,
                column: col as u32 + 1,
            };
        }
    }
    TextPosition::FALLBACK
}

/// Reads an explicit position carried as FHIR extensions, accepted only
/// when it reports something beyond the degenerate `{1, 1}`.
fn explicit_position(issue: &Value) -> Option<TextPosition> {
    let extensions = issue.get("extension")?.as_array()?;
    let read = |url: &str| -> Option<u32> {
        extensions
            .iter()
            .find(|e| e.get("url").and_then(Value::as_str) == Some(url))
            .and_then(|e| e.get("valueInteger"))
            .and_then(Value::as_u64)
            .map(|v| v as u32)
    };
    let line = read(ISSUE_LINE_EXTENSION)?;
    let column = read(ISSUE_COL_EXTENSION)?;
    let position = TextPosition { line, column };
    if position == TextPosition::FALLBACK {
        None
    } else {
        Some(position)
    }
}

/// The last location segment of an issue, taken from `location[]` or,
/// failing that, `expression[]`.
fn last_segment(issue: &Value) -> Option<String> {
    for field in ["location", "expression"] {
        if let Some(last) = issue
            .get(field)
            .and_then(Value::as_array)
            .and_then(|a| a.last())
            .and_then(Value::as_str)
        {
            return Some(last.to_string());
        }
    }
    None
}

/// Estimates the position for a single issue.
pub fn position_for_issue(issue: &Value, pretty: &str) -> TextPosition {
    if let Some(explicit) = explicit_position(issue) {
        return explicit;
    }
    last_segment(issue)
        .and_then(|segment| normalize_segment(&segment))
        .map(|key| locate_key(pretty, &key))
        .unwrap_or(TextPosition::FALLBACK)
}

/// Enriches every issue of an OperationOutcome with line/col extensions,
/// estimated against the pretty-printed JSON that was validated. Existing
/// extensions other than the two position URLs are preserved.
pub fn enrich_outcome(outcome: &mut Value, pretty: &str) {
    let Some(issues) = outcome.get_mut("issue").and_then(Value::as_array_mut) else {
        return;
    };
    for issue in issues {
        let position = position_for_issue(issue, pretty);

        let extensions = issue
            .as_object_mut()
            .map(|obj| {
                obj.entry("extension")
                    .or_insert_with(|| Value::Array(vec![]))
            })
            .and_then(Value::as_array_mut);
        let Some(extensions) = extensions else { continue };

        extensions.retain(|e| {
            let url = e.get("url").and_then(Value::as_str);
            url != Some(ISSUE_LINE_EXTENSION) && url != Some(ISSUE_COL_EXTENSION)
        });
        extensions.push(json!({ "url": ISSUE_LINE_EXTENSION, "valueInteger": position.line }));
        extensions.push(json!({ "url": ISSUE_COL_EXTENSION, "valueInteger": position.column }));
    }
}
