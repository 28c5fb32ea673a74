//! Structural validation for FHIR TestScript resources.
//!
//! The validator reproduces the hand-coded TestScript invariants
//! (tst-1..tst-9 informally) as a declarative rule table applied by a
//! generic tree walker, plus a heuristic position locator used to attach
//! line/column hints to OperationOutcome issues.

pub mod position;
pub mod rules;
pub mod validator;

pub use position::{TextPosition, enrich_outcome, locate_key, normalize_segment};
pub use rules::{NodeKind, Phase, Rule, RuleContext, Violation};
pub use validator::validate;
