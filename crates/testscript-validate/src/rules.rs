//! Declarative rule set for TestScript structural validation.
//!
//! Each rule targets one node kind and is gated by validation mode (and,
//! for the operation/assertion exclusivity rule, by document phase). The
//! walker in [`crate::validator`] applies every matching rule and collects
//! the violations into a flat issue list; rules themselves never see the
//! full document, only the node under inspection.

use serde_json::Value;
use testscript_core::{TestScriptStatus, ValidationMode};

/// Document phase an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Test,
    Teardown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Test => "test",
            Phase::Teardown => "teardown",
        }
    }
}

/// Node kinds visited by the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Capability,
    Action,
    Operation,
    Assertion,
}

/// Context a rule check runs in.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub mode: ValidationMode,
    pub phase: Option<Phase>,
}

/// A violated rule, located relative to the node under inspection.
#[derive(Debug, Clone)]
pub struct Violation {
    pub path: Vec<String>,
    pub message: String,
    pub position: Option<(u32, u32)>,
}

impl Violation {
    fn at(path: &[&str], message: impl Into<String>) -> Self {
        Self {
            path: path.iter().map(|s| s.to_string()).collect(),
            message: message.into(),
            position: None,
        }
    }

    fn at_owned(path: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            position: None,
        }
    }

    /// Placeholder UI hint; not derived from real source offsets.
    fn with_position(mut self, line: u32, column: u32) -> Self {
        self.position = Some((line, column));
        self
    }
}

/// A single structural rule.
pub struct Rule {
    /// FHIR invariant key or a local identifier for hand-coded checks.
    pub id: &'static str,
    pub kind: NodeKind,
    /// Skipped in basic (import) mode when set.
    pub extended_only: bool,
    /// Applied only to actions under `test[].action` when set.
    pub test_phase_only: bool,
    pub check: fn(&Value, &RuleContext) -> Vec<Violation>,
}

impl Rule {
    /// Whether this rule fires for the given node kind in the given context.
    pub fn applies(&self, kind: NodeKind, cx: &RuleContext) -> bool {
        self.kind == kind
            && (!self.extended_only || cx.mode.is_extended())
            && (!self.test_phase_only || cx.phase == Some(Phase::Test))
    }
}

/// HTTP verbs allowed for `operation.method`.
const HTTP_METHODS: [&str; 7] = ["delete", "get", "options", "patch", "post", "put", "head"];

/// Comparison kinds allowed for `assert.operator`.
const ASSERT_OPERATORS: [&str; 11] = [
    "equals",
    "notEquals",
    "in",
    "notIn",
    "greaterThan",
    "lessThan",
    "empty",
    "notEmpty",
    "contains",
    "notContains",
    "eval",
];

/// HTTP status names allowed for `assert.response`.
const ASSERT_RESPONSES: [&str; 12] = [
    "okay",
    "created",
    "noContent",
    "notModified",
    "bad",
    "forbidden",
    "notFound",
    "methodNotAllowed",
    "conflict",
    "gone",
    "preconditionFailed",
    "unprocessable",
];

/// The full rule table, in the order violations should surface.
pub static RULES: &[Rule] = &[
    Rule {
        id: "resource-type",
        kind: NodeKind::Document,
        extended_only: false,
        test_phase_only: false,
        check: check_resource_type,
    },
    Rule {
        id: "status",
        kind: NodeKind::Document,
        extended_only: false,
        test_phase_only: false,
        check: check_status,
    },
    Rule {
        id: "name",
        kind: NodeKind::Document,
        extended_only: true,
        test_phase_only: false,
        check: check_name,
    },
    Rule {
        id: "setup-actions",
        kind: NodeKind::Document,
        extended_only: true,
        test_phase_only: false,
        check: check_setup_actions,
    },
    Rule {
        id: "teardown-actions",
        kind: NodeKind::Document,
        extended_only: true,
        test_phase_only: false,
        check: check_teardown_actions,
    },
    Rule {
        id: "test-actions",
        kind: NodeKind::Document,
        extended_only: true,
        test_phase_only: false,
        check: check_test_actions,
    },
    Rule {
        id: "capability-reference",
        kind: NodeKind::Capability,
        extended_only: true,
        test_phase_only: false,
        check: check_capability_reference,
    },
    Rule {
        id: "capability-flags",
        kind: NodeKind::Capability,
        extended_only: true,
        test_phase_only: false,
        check: check_capability_flags,
    },
    Rule {
        id: "tst-2",
        kind: NodeKind::Action,
        extended_only: true,
        test_phase_only: true,
        check: check_action_exclusivity,
    },
    Rule {
        id: "operation-type-code",
        kind: NodeKind::Operation,
        extended_only: true,
        test_phase_only: false,
        check: check_operation_type_code,
    },
    Rule {
        id: "operation-resource",
        kind: NodeKind::Operation,
        extended_only: true,
        test_phase_only: false,
        check: check_operation_resource,
    },
    Rule {
        id: "tst-7",
        kind: NodeKind::Operation,
        extended_only: true,
        test_phase_only: false,
        check: check_operation_target,
    },
    Rule {
        id: "operation-method",
        kind: NodeKind::Operation,
        extended_only: true,
        test_phase_only: false,
        check: check_operation_method,
    },
    Rule {
        id: "operation-request-headers",
        kind: NodeKind::Operation,
        extended_only: true,
        test_phase_only: false,
        check: check_operation_request_headers,
    },
    Rule {
        id: "assert-description",
        kind: NodeKind::Assertion,
        extended_only: true,
        test_phase_only: false,
        check: check_assert_description,
    },
    Rule {
        id: "assert-operator",
        kind: NodeKind::Assertion,
        extended_only: true,
        test_phase_only: false,
        check: check_assert_operator,
    },
    Rule {
        id: "assert-direction",
        kind: NodeKind::Assertion,
        extended_only: true,
        test_phase_only: false,
        check: check_assert_direction,
    },
    Rule {
        id: "assert-response",
        kind: NodeKind::Assertion,
        extended_only: true,
        test_phase_only: false,
        check: check_assert_response,
    },
];

fn str_field<'a>(node: &'a Value, field: &str) -> Option<&'a str> {
    node.get(field).and_then(Value::as_str)
}

// ---- Document rules ----

fn check_resource_type(doc: &Value, _cx: &RuleContext) -> Vec<Violation> {
    if str_field(doc, "resourceType") == Some("TestScript") {
        return vec![];
    }
    vec![
        Violation::at(&["resourceType"], "resourceType must be 'TestScript'").with_position(2, 3),
    ]
}

fn check_status(doc: &Value, _cx: &RuleContext) -> Vec<Violation> {
    let violation = match str_field(doc, "status") {
        Some(s) if s.parse::<TestScriptStatus>().is_ok() => return vec![],
        Some(_) => Violation::at(
            &["status"],
            format!(
                "status must be one of {}",
                TestScriptStatus::CODES.join(", ")
            ),
        ),
        None => Violation::at(
            &["status"],
            format!(
                "status is required and must be one of {}",
                TestScriptStatus::CODES.join(", ")
            ),
        ),
    };
    vec![violation.with_position(3, 3)]
}

fn check_name(doc: &Value, _cx: &RuleContext) -> Vec<Violation> {
    match doc.get("name") {
        Some(Value::String(_)) => vec![],
        Some(_) => vec![Violation::at(&["name"], "name must be a string")],
        None => vec![Violation::at(&["name"], "name is required")],
    }
}

fn non_empty_action_array(node: &Value) -> bool {
    node.get("action")
        .and_then(Value::as_array)
        .is_some_and(|a| !a.is_empty())
}

fn check_setup_actions(doc: &Value, _cx: &RuleContext) -> Vec<Violation> {
    match doc.get("setup") {
        Some(setup) if !non_empty_action_array(setup) => vec![Violation::at(
            &["setup", "action"],
            "setup.action must be a non-empty array",
        )],
        _ => vec![],
    }
}

fn check_teardown_actions(doc: &Value, _cx: &RuleContext) -> Vec<Violation> {
    match doc.get("teardown") {
        Some(teardown) if !non_empty_action_array(teardown) => vec![Violation::at(
            &["teardown", "action"],
            "teardown.action must be a non-empty array",
        )],
        _ => vec![],
    }
}

fn check_test_actions(doc: &Value, _cx: &RuleContext) -> Vec<Violation> {
    let Some(tests) = doc.get("test").and_then(Value::as_array) else {
        return vec![];
    };
    tests
        .iter()
        .enumerate()
        .filter(|(_, test)| !non_empty_action_array(test))
        .map(|(i, _)| {
            Violation::at_owned(
                vec!["test".into(), i.to_string(), "action".into()],
                "Test must contain at least one action",
            )
        })
        .collect()
}

// ---- Capability rules ----

fn check_capability_reference(cap: &Value, _cx: &RuleContext) -> Vec<Violation> {
    match str_field(cap, "capabilities") {
        Some(c) if !c.is_empty() => vec![],
        _ => vec![Violation::at(
            &["capabilities"],
            "Capability must declare a capabilities reference",
        )],
    }
}

fn check_capability_flags(cap: &Value, _cx: &RuleContext) -> Vec<Violation> {
    let has_flag = cap.get("required").and_then(Value::as_bool).is_some()
        || cap.get("validated").and_then(Value::as_bool).is_some();
    if has_flag {
        vec![]
    } else {
        vec![Violation::at(
            &[],
            "Capability must set at least one of required or validated",
        )]
    }
}

// ---- Action rules ----

fn check_action_exclusivity(action: &Value, _cx: &RuleContext) -> Vec<Violation> {
    let has_operation = action.get("operation").is_some();
    let has_assert = action.get("assert").is_some();
    match (has_operation, has_assert) {
        (true, true) => vec![Violation::at(
            &[],
            "Action must not contain both an operation and an assertion (tst-2)",
        )],
        (false, false) => vec![Violation::at(
            &[],
            "Action must contain either an operation or an assertion",
        )],
        _ => vec![],
    }
}

// ---- Operation rules ----

fn check_operation_type_code(op: &Value, _cx: &RuleContext) -> Vec<Violation> {
    let code = op.get("type").and_then(|t| t.get("code")).and_then(Value::as_str);
    match code {
        Some(c) if !c.is_empty() => vec![],
        _ => vec![Violation::at(
            &["type", "code"],
            "Operation must declare a type code",
        )],
    }
}

fn check_operation_resource(op: &Value, _cx: &RuleContext) -> Vec<Violation> {
    match str_field(op, "resource") {
        Some(r) if !r.is_empty() => vec![],
        _ => vec![Violation::at(
            &["resource"],
            "Operation must declare a resource type",
        )],
    }
}

fn check_operation_target(op: &Value, _cx: &RuleContext) -> Vec<Violation> {
    let has_target = ["url", "sourceId", "targetId", "params"]
        .iter()
        .any(|f| op.get(f).is_some());
    if has_target {
        vec![]
    } else {
        vec![Violation::at(
            &[],
            "Operation must declare at least one of url, sourceId, targetId or params (tst-7)",
        )]
    }
}

fn check_operation_method(op: &Value, _cx: &RuleContext) -> Vec<Violation> {
    match str_field(op, "method") {
        Some(m) if !HTTP_METHODS.contains(&m) => vec![Violation::at(
            &["method"],
            format!("Operation method must be one of {}", HTTP_METHODS.join(", ")),
        )],
        _ => vec![],
    }
}

fn check_operation_request_headers(op: &Value, _cx: &RuleContext) -> Vec<Violation> {
    let Some(headers) = op.get("requestHeader").and_then(Value::as_array) else {
        return vec![];
    };
    let mut violations = Vec::new();
    for (i, header) in headers.iter().enumerate() {
        if str_field(header, "field").is_none_or(str::is_empty) {
            violations.push(Violation::at_owned(
                vec!["requestHeader".into(), i.to_string(), "field".into()],
                "Request header must declare a field",
            ));
        }
        if str_field(header, "value").is_none_or(str::is_empty) {
            violations.push(Violation::at_owned(
                vec!["requestHeader".into(), i.to_string(), "value".into()],
                "Request header must declare a value",
            ));
        }
    }
    violations
}

// ---- Assertion rules ----

fn check_assert_description(assert: &Value, _cx: &RuleContext) -> Vec<Violation> {
    match str_field(assert, "description") {
        Some(d) if !d.is_empty() => vec![],
        _ => vec![Violation::at(
            &["description"],
            "Assertion must include a description",
        )],
    }
}

fn check_assert_operator(assert: &Value, _cx: &RuleContext) -> Vec<Violation> {
    match str_field(assert, "operator") {
        Some(op) if !ASSERT_OPERATORS.contains(&op) => vec![Violation::at(
            &["operator"],
            "Assertion operator must be a known comparison kind",
        )],
        _ => vec![],
    }
}

fn check_assert_direction(assert: &Value, _cx: &RuleContext) -> Vec<Violation> {
    let mut violations = Vec::new();
    match str_field(assert, "direction") {
        Some(d) if d != "request" && d != "response" => {
            violations.push(Violation::at(
                &["direction"],
                "Assertion direction must be 'request' or 'response'",
            ));
        }
        Some("request") => {
            if assert.get("response").is_some() || assert.get("responseCode").is_some() {
                violations.push(Violation::at(
                    &[],
                    "Assertion with direction 'request' must not set response or responseCode",
                ));
            }
        }
        _ => {}
    }
    violations
}

fn check_assert_response(assert: &Value, _cx: &RuleContext) -> Vec<Violation> {
    match str_field(assert, "response") {
        Some(r) if !ASSERT_RESPONSES.contains(&r) => vec![Violation::at(
            &["response"],
            "Assertion response must be a known HTTP status name",
        )],
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EXTENDED: RuleContext = RuleContext {
        mode: ValidationMode::Extended,
        phase: None,
    };

    #[test]
    fn test_rule_mode_gating() {
        let basic = RuleContext {
            mode: ValidationMode::Basic,
            phase: None,
        };
        let name_rule = RULES.iter().find(|r| r.id == "name").unwrap();
        assert!(name_rule.applies(NodeKind::Document, &EXTENDED));
        assert!(!name_rule.applies(NodeKind::Document, &basic));

        let rt_rule = RULES.iter().find(|r| r.id == "resource-type").unwrap();
        assert!(rt_rule.applies(NodeKind::Document, &basic));
        assert!(!rt_rule.applies(NodeKind::Action, &basic));
    }

    #[test]
    fn test_rule_phase_gating() {
        let tst2 = RULES.iter().find(|r| r.id == "tst-2").unwrap();
        let in_test = RuleContext {
            mode: ValidationMode::Extended,
            phase: Some(Phase::Test),
        };
        let in_setup = RuleContext {
            mode: ValidationMode::Extended,
            phase: Some(Phase::Setup),
        };
        assert!(tst2.applies(NodeKind::Action, &in_test));
        assert!(!tst2.applies(NodeKind::Action, &in_setup));
    }

    #[test]
    fn test_resource_type_check() {
        let ok = json!({"resourceType": "TestScript"});
        assert!(check_resource_type(&ok, &EXTENDED).is_empty());

        let bad = json!({"resourceType": "Patient"});
        let violations = check_resource_type(&bad, &EXTENDED);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, vec!["resourceType"]);
        assert_eq!(violations[0].position, Some((2, 3)));

        // Missing resourceType is the same violation
        assert_eq!(check_resource_type(&json!({}), &EXTENDED).len(), 1);
    }

    #[test]
    fn test_status_check_distinguishes_missing_and_invalid() {
        let missing = check_status(&json!({}), &EXTENDED);
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("required"));

        let invalid = check_status(&json!({"status": "published"}), &EXTENDED);
        assert_eq!(invalid.len(), 1);
        assert!(!invalid[0].message.contains("required"));
        assert_eq!(invalid[0].path, vec!["status"]);

        assert!(check_status(&json!({"status": "draft"}), &EXTENDED).is_empty());
    }

    #[test]
    fn test_name_wrong_type_is_a_violation_not_a_panic() {
        let violations = check_name(&json!({"name": 42}), &EXTENDED);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message, "name must be a string");
    }

    #[test]
    fn test_action_exclusivity() {
        let both = json!({"operation": {}, "assert": {}});
        let violations = check_action_exclusivity(&both, &EXTENDED);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("tst-2"));
        assert!(violations[0].path.is_empty());

        let neither = json!({});
        let violations = check_action_exclusivity(&neither, &EXTENDED);
        assert_eq!(violations.len(), 1);
        assert!(!violations[0].message.contains("tst-2"));

        assert!(check_action_exclusivity(&json!({"operation": {}}), &EXTENDED).is_empty());
        assert!(check_action_exclusivity(&json!({"assert": {}}), &EXTENDED).is_empty());
    }

    #[test]
    fn test_operation_type_code() {
        let missing = json!({"resource": "Patient"});
        let violations = check_operation_type_code(&missing, &EXTENDED);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, vec!["type", "code"]);

        let ok = json!({"type": {"code": "read"}});
        assert!(check_operation_type_code(&ok, &EXTENDED).is_empty());
    }

    #[test]
    fn test_operation_target_requires_one_of() {
        assert_eq!(check_operation_target(&json!({}), &EXTENDED).len(), 1);
        for field in ["url", "sourceId", "targetId", "params"] {
            let op = json!({field: "x"});
            assert!(check_operation_target(&op, &EXTENDED).is_empty());
        }
    }

    #[test]
    fn test_operation_method_enum() {
        assert!(check_operation_method(&json!({"method": "get"}), &EXTENDED).is_empty());
        assert!(check_operation_method(&json!({}), &EXTENDED).is_empty());
        assert_eq!(
            check_operation_method(&json!({"method": "fetch"}), &EXTENDED).len(),
            1
        );
    }

    #[test]
    fn test_request_header_pairs() {
        let op = json!({"requestHeader": [
            {"field": "Accept", "value": "application/fhir+json"},
            {"field": "Authorization"},
            {"value": "secret"},
        ]});
        let violations = check_operation_request_headers(&op, &EXTENDED);
        assert_eq!(violations.len(), 2);
        assert_eq!(
            violations[0].path,
            vec!["requestHeader", "1", "value"]
        );
        assert_eq!(violations[1].path, vec!["requestHeader", "2", "field"]);
    }

    #[test]
    fn test_assert_direction_request_excludes_response() {
        let bad = json!({"direction": "request", "response": "okay"});
        let violations = check_assert_direction(&bad, &EXTENDED);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("direction 'request'"));

        let ok = json!({"direction": "response", "response": "okay"});
        assert!(check_assert_direction(&ok, &EXTENDED).is_empty());

        let unknown = json!({"direction": "sideways"});
        assert_eq!(check_assert_direction(&unknown, &EXTENDED).len(), 1);
    }

    #[test]
    fn test_assert_enums() {
        assert!(check_assert_operator(&json!({"operator": "equals"}), &EXTENDED).is_empty());
        assert_eq!(
            check_assert_operator(&json!({"operator": "matches"}), &EXTENDED).len(),
            1
        );
        assert!(check_assert_response(&json!({"response": "okay"}), &EXTENDED).is_empty());
        assert_eq!(
            check_assert_response(&json!({"response": "418"}), &EXTENDED).len(),
            1
        );
    }

    #[test]
    fn test_capability_checks() {
        let cap = json!({"capabilities": "CapabilityStatement/example", "required": true});
        assert!(check_capability_reference(&cap, &EXTENDED).is_empty());
        assert!(check_capability_flags(&cap, &EXTENDED).is_empty());

        let bare = json!({});
        assert_eq!(check_capability_reference(&bare, &EXTENDED).len(), 1);
        assert_eq!(check_capability_flags(&bare, &EXTENDED).len(), 1);
    }
}
