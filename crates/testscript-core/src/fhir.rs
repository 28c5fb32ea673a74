use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// FHIR version enumeration
///
/// TestScript validation supports R4 and R5; the two differ only in which
/// upstream validation endpoint is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FhirVersion {
    #[serde(rename = "R4")]
    R4,
    #[serde(rename = "R5")]
    R5,
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FhirVersion::R4 => write!(f, "R4"),
            FhirVersion::R5 => write!(f, "R5"),
        }
    }
}

impl FromStr for FhirVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "R4" | "r4" | "4.0.1" => Ok(FhirVersion::R4),
            "R5" | "r5" | "5.0.0" => Ok(FhirVersion::R5),
            _ => Err(CoreError::unknown_fhir_version(s)),
        }
    }
}

impl Default for FhirVersion {
    fn default() -> Self {
        FhirVersion::R5
    }
}

impl FhirVersion {
    /// Parse the `X-FHIR-Version` header value, defaulting to R5 when the
    /// header is absent or unrecognized.
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }
}

/// Publication status of a TestScript (the `status` element)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestScriptStatus {
    Draft,
    Active,
    Retired,
    Unknown,
}

impl TestScriptStatus {
    /// All valid status codes, in specification order.
    pub const CODES: [&'static str; 4] = ["draft", "active", "retired", "unknown"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestScriptStatus::Draft => "draft",
            TestScriptStatus::Active => "active",
            TestScriptStatus::Retired => "retired",
            TestScriptStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TestScriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TestScriptStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TestScriptStatus::Draft),
            "active" => Ok(TestScriptStatus::Active),
            "retired" => Ok(TestScriptStatus::Retired),
            "unknown" => Ok(TestScriptStatus::Unknown),
            _ => Err(CoreError::unknown_status(s)),
        }
    }
}

/// Severity profile applied by the structural validator.
///
/// Basic mode checks only the structurally indispensable fields and is used
/// when importing possibly-incomplete documents; Extended mode runs the
/// full rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationMode {
    Basic,
    Extended,
}

impl Default for ValidationMode {
    fn default() -> Self {
        ValidationMode::Extended
    }
}

impl ValidationMode {
    /// Parse the `X-Validation-Mode` header value.
    ///
    /// `import` (and its alias `basic`) selects Basic mode; anything else,
    /// including an absent header, selects Extended mode.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("import") || v.eq_ignore_ascii_case("basic") => {
                ValidationMode::Basic
            }
            _ => ValidationMode::Extended,
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, ValidationMode::Extended)
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Basic => write!(f, "basic"),
            ValidationMode::Extended => write!(f, "extended"),
        }
    }
}
