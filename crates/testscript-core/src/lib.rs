pub mod error;
pub mod fhir;
pub mod issue;

pub use error::{CoreError, Result};
pub use fhir::{FhirVersion, TestScriptStatus, ValidationMode};
pub use issue::{
    ISSUE_COL_EXTENSION, ISSUE_LINE_EXTENSION, Severity, StructureIssue, ValidationOutcome,
    exception_outcome,
};
