use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{Value, json};

use testscript_core::{FhirVersion, ValidationMode, exception_outcome};
use testscript_validate::{enrich_outcome, validate};

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "TestScript Validation Server",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ready" }))
}

pub async fn metadata(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "resourceType": "CapabilityStatement",
        "status": "active",
        "kind": "instance",
        "fhirVersion": state.config.fhir.version,
        "software": { "name": "TestScript Validation Server", "version": env!("CARGO_PKG_VERSION") },
        "format": ["application/fhir+json"],
    });
    (StatusCode::OK, Json(body))
}

pub async fn favicon() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

/// `POST /validate` — structural validation of a TestScript document.
///
/// `X-FHIR-Version` selects R4/R5 (default R5); `X-Validation-Mode: import`
/// selects the lenient basic rule set. The response body is always an
/// OperationOutcome: validation failure is data, not an HTTP error. Only an
/// unparseable body answers 400.
pub async fn validate_testscript(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let version = headers
        .get("x-fhir-version")
        .and_then(|v| v.to_str().ok())
        .map(|v| FhirVersion::from_header(Some(v)))
        .unwrap_or_else(|| state.config.fhir_version());
    let mode =
        ValidationMode::from_header(headers.get("x-validation-mode").and_then(|v| v.to_str().ok()));

    let document: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "rejected unparseable validation request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(exception_outcome(format!(
                    "Request body is not valid JSON: {e}"
                ))),
            );
        }
    };

    let local = validate(&document, mode);
    tracing::debug!(
        fhir.version = %version,
        mode = %mode,
        valid = local.valid,
        issues = local.errors.len(),
        "structural validation complete"
    );

    // Single best-effort upstream attempt; any failure falls back to the
    // local structural outcome.
    let outcome = match state.upstream.validate(version, &document).await {
        Ok(mut remote) => {
            let pretty = serde_json::to_string_pretty(&document).unwrap_or_default();
            enrich_outcome(&mut remote, &pretty);
            remote
        }
        Err(e) => {
            if e.is_unexpected() {
                tracing::warn!(
                    fhir.version = %version,
                    error = %e,
                    "upstream validation unavailable, falling back to local outcome"
                );
            }
            local.to_operation_outcome()
        }
    };

    (StatusCode::OK, Json(outcome))
}
