//! Generic tree walker applying the structural rule table.
//!
//! The walker visits a TestScript-shaped document in a fixed field order
//! (`resourceType` → `status` → `name` → `metadata.capability[]` →
//! `setup.action[]` → `teardown.action[]` → `test[].action[]`), embedding
//! collection indices into the location path as strings. Traversal never
//! short-circuits: every applicable rule runs and its violations accumulate
//! into one flat list, so a single pass reports all findings at once.

use serde_json::Value;
use testscript_core::{StructureIssue, ValidationMode, ValidationOutcome};

use crate::rules::{NodeKind, Phase, RULES, RuleContext};

/// Validates a TestScript-shaped document against the structural rule set.
///
/// The document may be partial or oddly typed; absent optional fields mean
/// "rule not applicable" and never raise. The function is pure: it does not
/// mutate the document and holds no state between calls, so repeated calls
/// on the same document yield identical issue lists.
pub fn validate(document: &Value, mode: ValidationMode) -> ValidationOutcome {
    let mut errors = Vec::new();

    let doc_cx = RuleContext { mode, phase: None };
    apply_rules(NodeKind::Document, document, &[], &doc_cx, &mut errors);

    // metadata.capability[]
    if let Some(capabilities) = document
        .pointer("/metadata/capability")
        .and_then(Value::as_array)
    {
        for (i, capability) in capabilities.iter().enumerate() {
            let base = path(&["metadata", "capability", &i.to_string()]);
            apply_rules(NodeKind::Capability, capability, &base, &doc_cx, &mut errors);
        }
    }

    visit_phase(document, Phase::Setup, mode, &mut errors);
    visit_phase(document, Phase::Teardown, mode, &mut errors);

    // test[].action[]
    if let Some(tests) = document.get("test").and_then(Value::as_array) {
        for (i, test) in tests.iter().enumerate() {
            let actions = test.get("action").and_then(Value::as_array);
            let Some(actions) = actions else { continue };
            let base = path(&["test", &i.to_string()]);
            visit_actions(actions, &base, Phase::Test, mode, &mut errors);
        }
    }

    ValidationOutcome::from_errors(errors)
}

/// Visits `setup.action[]` or `teardown.action[]`.
fn visit_phase(document: &Value, phase: Phase, mode: ValidationMode, errors: &mut Vec<StructureIssue>) {
    let actions = document
        .get(phase.as_str())
        .and_then(|p| p.get("action"))
        .and_then(Value::as_array);
    if let Some(actions) = actions {
        let base = path(&[phase.as_str()]);
        visit_actions(actions, &base, phase, mode, errors);
    }
}

/// Visits an action array, descending into operations and assertions.
fn visit_actions(
    actions: &[Value],
    base: &[String],
    phase: Phase,
    mode: ValidationMode,
    errors: &mut Vec<StructureIssue>,
) {
    let cx = RuleContext {
        mode,
        phase: Some(phase),
    };
    for (j, action) in actions.iter().enumerate() {
        let action_path = extend(base, &["action", &j.to_string()]);
        apply_rules(NodeKind::Action, action, &action_path, &cx, errors);

        if let Some(operation) = action.get("operation").filter(|v| v.is_object()) {
            let op_path = extend(&action_path, &["operation"]);
            apply_rules(NodeKind::Operation, operation, &op_path, &cx, errors);
        }
        if let Some(assertion) = action.get("assert").filter(|v| v.is_object()) {
            let assert_path = extend(&action_path, &["assert"]);
            apply_rules(NodeKind::Assertion, assertion, &assert_path, &cx, errors);
        }
    }
}

/// Runs every matching rule against a node, rebasing violation paths onto
/// the walker's current location.
fn apply_rules(
    kind: NodeKind,
    node: &Value,
    base: &[String],
    cx: &RuleContext,
    errors: &mut Vec<StructureIssue>,
) {
    for rule in RULES.iter().filter(|r| r.applies(kind, cx)) {
        for violation in (rule.check)(node, cx) {
            let mut location = base.to_vec();
            location.extend(violation.path);
            let mut issue = StructureIssue::new(violation.message, location);
            if let Some((line, column)) = violation.position {
                issue = issue.with_position(line, column);
            }
            errors.push(issue);
        }
    }
}

fn path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

fn extend(base: &[String], segments: &[&str]) -> Vec<String> {
    let mut out = base.to_vec();
    out.extend(segments.iter().map(|s| s.to_string()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use testscript_core::ValidationMode::{Basic, Extended};

    fn locations(outcome: &ValidationOutcome) -> Vec<String> {
        outcome.errors.iter().map(|e| e.location_path()).collect()
    }

    #[test]
    fn minimal_document_passes_basic_mode() {
        let doc = json!({"resourceType": "TestScript", "status": "draft"});
        let outcome = validate(&doc, Basic);
        assert!(outcome.valid, "unexpected errors: {:?}", outcome.errors);
    }

    #[test]
    fn basic_mode_skips_name_and_metadata_rules() {
        // No name, no metadata, no actions anywhere: import-tolerant
        let doc = json!({"resourceType": "TestScript", "status": "active"});
        assert!(validate(&doc, Basic).valid);
    }

    #[test]
    fn wrong_resource_type_is_exactly_one_error() {
        let doc = json!({"resourceType": "Patient", "status": "draft", "name": "X"});
        let outcome = validate(&doc, Extended);
        assert!(!outcome.valid);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].location, vec!["resourceType"]);
    }

    #[test]
    fn missing_resource_type_reports_at_root_segment() {
        let doc = json!({"status": "draft"});
        let outcome = validate(&doc, Basic);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].location, vec!["resourceType"]);
        // Synthetic placeholder position, kept for UI hints only
        assert_eq!(outcome.errors[0].line, Some(2));
        assert_eq!(outcome.errors[0].column, Some(3));
    }

    #[test]
    fn missing_status_is_exactly_one_error_ending_in_status() {
        let doc = json!({"resourceType": "TestScript", "name": "T"});
        let outcome = validate(&doc, Extended);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].location.last().unwrap(), "status");
    }

    #[test]
    fn invalid_status_is_exactly_one_error_ending_in_status() {
        let doc = json!({"resourceType": "TestScript", "status": "published", "name": "T"});
        let outcome = validate(&doc, Extended);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].location.last().unwrap(), "status");
    }

    #[test]
    fn extended_mode_requires_name() {
        let doc = json!({"resourceType": "TestScript", "status": "draft"});
        let outcome = validate(&doc, Extended);
        assert_eq!(locations(&outcome), vec!["name"]);

        // Same document is fine on import
        assert!(validate(&doc, Basic).valid);
    }

    #[test]
    fn action_with_both_operation_and_assert_violates_tst_2() {
        let doc = json!({
            "resourceType": "TestScript",
            "status": "active",
            "name": "T1",
            "test": [{"action": [{
                "operation": {"resource": "Patient"},
                "assert": {"description": "x"}
            }]}]
        });
        let outcome = validate(&doc, Extended);
        let tst2: Vec<_> = outcome
            .errors
            .iter()
            .filter(|e| e.message.contains("tst-2"))
            .collect();
        assert_eq!(tst2.len(), 1);
        assert_eq!(tst2[0].location, vec!["test", "0", "action", "0"]);
    }

    #[test]
    fn action_with_neither_reports_different_message_same_location() {
        let doc = json!({
            "resourceType": "TestScript",
            "status": "active",
            "name": "T1",
            "test": [{"action": [{}]}]
        });
        let outcome = validate(&doc, Extended);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].location, vec!["test", "0", "action", "0"]);
        assert!(!outcome.errors[0].message.contains("tst-2"));
    }

    #[test]
    fn setup_actions_are_exempt_from_exclusivity() {
        // Reference behavior: only test[].action is checked against tst-2
        let doc = json!({
            "resourceType": "TestScript",
            "status": "active",
            "name": "T1",
            "setup": {"action": [{
                "operation": {
                    "type": {"code": "read"},
                    "resource": "Patient",
                    "url": "/Patient/1"
                },
                "assert": {"description": "ok"}
            }]}
        });
        let outcome = validate(&doc, Extended);
        assert!(
            !outcome.errors.iter().any(|e| e.message.contains("tst-2")),
            "setup actions must not trigger tst-2: {:?}",
            outcome.errors
        );
    }

    #[test]
    fn operation_without_type_code_reports_nested_location() {
        let doc = json!({
            "resourceType": "TestScript",
            "status": "active",
            "name": "T1",
            "test": [{"action": [{
                "operation": {"resource": "Patient", "url": "/Patient"}
            }]}]
        });
        let outcome = validate(&doc, Extended);
        assert_eq!(
            locations(&outcome),
            vec!["test.0.action.0.operation.type.code"]
        );
    }

    #[test]
    fn operation_content_rules_apply_in_setup_and_teardown() {
        let doc = json!({
            "resourceType": "TestScript",
            "status": "active",
            "name": "T1",
            "teardown": {"action": [{
                "operation": {"type": {"code": "delete"}, "url": "/Patient/1"}
            }]}
        });
        let outcome = validate(&doc, Extended);
        assert_eq!(locations(&outcome), vec!["teardown.action.0.operation.resource"]);
    }

    #[test]
    fn assert_without_description_reports_nested_location() {
        let doc = json!({
            "resourceType": "TestScript",
            "status": "active",
            "name": "T1",
            "test": [{"action": [{"assert": {"response": "okay"}}]}]
        });
        let outcome = validate(&doc, Extended);
        assert_eq!(locations(&outcome), vec!["test.0.action.0.assert.description"]);
    }

    #[test]
    fn empty_test_action_array_is_reported_per_test() {
        let doc = json!({
            "resourceType": "TestScript",
            "status": "active",
            "name": "T1",
            "test": [
                {"action": [{"operation": {"type": {"code": "read"}, "resource": "Patient", "url": "/p"}}]},
                {"action": []},
                {}
            ]
        });
        let outcome = validate(&doc, Extended);
        assert_eq!(locations(&outcome), vec!["test.1.action", "test.2.action"]);
    }

    #[test]
    fn present_but_empty_setup_action_is_an_error() {
        let doc = json!({
            "resourceType": "TestScript",
            "status": "active",
            "name": "T1",
            "setup": {"action": []}
        });
        let outcome = validate(&doc, Extended);
        assert_eq!(locations(&outcome), vec!["setup.action"]);
    }

    #[test]
    fn absent_setup_and_teardown_are_not_errors() {
        let doc = json!({"resourceType": "TestScript", "status": "active", "name": "T1"});
        assert!(validate(&doc, Extended).valid);
    }

    #[test]
    fn capability_violations_embed_index_in_location() {
        let doc = json!({
            "resourceType": "TestScript",
            "status": "active",
            "name": "T1",
            "metadata": {"capability": [
                {"capabilities": "CapabilityStatement/base", "required": true},
                {"validated": false}
            ]}
        });
        let outcome = validate(&doc, Extended);
        assert_eq!(locations(&outcome), vec!["metadata.capability.1.capabilities"]);
    }

    #[test]
    fn all_violations_accumulate_without_short_circuit() {
        let doc = json!({
            "resourceType": "Bundle",
            "status": "bogus",
            "test": [{"action": [{}]}]
        });
        let outcome = validate(&doc, Extended);
        let locs = locations(&outcome);
        assert!(locs.contains(&"resourceType".to_string()));
        assert!(locs.contains(&"status".to_string()));
        assert!(locs.contains(&"name".to_string()));
        assert!(locs.contains(&"test.0.action.0".to_string()));
    }

    #[test]
    fn validation_is_idempotent() {
        let doc = json!({
            "resourceType": "Patient",
            "status": "bogus",
            "test": [{"action": [{"operation": {}, "assert": {}}]}]
        });
        let first = validate(&doc, Extended);
        let second = validate(&doc, Extended);
        assert_eq!(first.errors, second.errors);
    }

    #[test]
    fn validator_does_not_mutate_the_document() {
        let doc = json!({"resourceType": "TestScript", "status": "draft"});
        let before = doc.clone();
        let _ = validate(&doc, Extended);
        assert_eq!(doc, before);
    }

    #[test]
    fn tolerates_wildly_mistyped_fields() {
        // Nothing here should panic; mistyped fields either violate a rule
        // or are treated as absent.
        let doc = json!({
            "resourceType": ["TestScript"],
            "status": 7,
            "name": {"given": "x"},
            "metadata": "none",
            "setup": 3,
            "test": "not-an-array",
            "teardown": {"action": "nope"}
        });
        let outcome = validate(&doc, Extended);
        assert!(!outcome.valid);
    }
}
