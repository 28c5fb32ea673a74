//! Validation issue model and FHIR OperationOutcome construction.

use serde_json::{Value, json};

/// Extension URL carrying the 1-based line of an issue.
pub const ISSUE_LINE_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/operationoutcome-issue-line";
/// Extension URL carrying the 1-based column of an issue.
pub const ISSUE_COL_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/operationoutcome-issue-col";

/// Severity levels for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl Severity {
    /// Returns the FHIR string representation of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "information",
        }
    }
}

/// A single structural validation finding.
///
/// `location` is a breadcrumb into the document tree, one segment per field
/// name or collection index, e.g. `["test", "0", "action", "1", "operation",
/// "type", "code"]`. `line`/`column` are optional UI hints; for locally
/// produced issues they are synthetic placeholders, not real source offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureIssue {
    pub message: String,
    pub location: Vec<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl StructureIssue {
    /// Creates an issue at the given location path.
    pub fn new(message: impl Into<String>, location: Vec<String>) -> Self {
        Self {
            message: message.into(),
            location,
            line: None,
            column: None,
        }
    }

    /// Attaches a synthetic line/column hint.
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Renders the location breadcrumb as a dotted path,
    /// e.g. `metadata.capability.1.capabilities`.
    pub fn location_path(&self) -> String {
        self.location.join(".")
    }
}

/// Result of a structural validation pass.
///
/// `valid` is true iff `errors` is empty; issues accumulate in traversal
/// order, so a single pass reports every violation at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<StructureIssue>,
}

impl ValidationOutcome {
    /// Creates a successful outcome with no issues.
    pub fn success() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Creates an outcome from accumulated errors.
    pub fn from_errors(errors: Vec<StructureIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Converts the outcome to a FHIR OperationOutcome JSON value.
    ///
    /// Structural errors map to `severity: "error", code: "structure"`;
    /// a fully valid document yields a single informational issue so the
    /// response always carries at least one issue.
    pub fn to_operation_outcome(&self) -> Value {
        if self.valid {
            return json!({
                "resourceType": "OperationOutcome",
                "issue": [{
                    "severity": Severity::Information.as_str(),
                    "code": "informational",
                    "diagnostics": "Validation successful: no structural issues found",
                }]
            });
        }

        let issues: Vec<Value> = self
            .errors
            .iter()
            .map(|e| {
                let mut issue = json!({
                    "severity": Severity::Error.as_str(),
                    "code": "structure",
                    "diagnostics": e.message,
                });
                if !e.location.is_empty() {
                    issue["location"] = json!([e.location_path()]);
                }
                if let (Some(line), Some(column)) = (e.line, e.column) {
                    issue["extension"] = json!([
                        { "url": ISSUE_LINE_EXTENSION, "valueInteger": line },
                        { "url": ISSUE_COL_EXTENSION, "valueInteger": column },
                    ]);
                }
                issue
            })
            .collect();

        json!({
            "resourceType": "OperationOutcome",
            "issue": issues,
        })
    }
}

/// Builds an OperationOutcome reporting a single boundary failure, e.g. an
/// unparseable request body.
pub fn exception_outcome(diagnostics: impl Into<String>) -> Value {
    json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": Severity::Error.as_str(),
            "code": "exception",
            "diagnostics": diagnostics.into(),
        }]
    })
}
