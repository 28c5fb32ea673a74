//! Client for the authoritative external FHIR validation server.
//!
//! The upstream server accepts a `Parameters` resource wrapping the
//! TestScript and answers with an `OperationOutcome`. One attempt per
//! validation request, bounded by the configured timeout; the caller is
//! expected to fall back to the local structural outcome on any failure.

use serde_json::{Value, json};
use thiserror::Error;
use testscript_core::FhirVersion;

use crate::config::UpstreamConfig;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("no validation endpoint configured for FHIR {0}")]
    NotConfigured(FhirVersion),

    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("upstream response is not an OperationOutcome")]
    NotAnOutcome,
}

impl UpstreamError {
    /// Whether this failure is worth a warning, as opposed to the expected
    /// "nothing configured" case.
    pub fn is_unexpected(&self) -> bool {
        !matches!(self, Self::NotConfigured(_))
    }
}

/// Best-effort client for the external FHIR validation endpoint.
#[derive(Clone)]
pub struct UpstreamValidator {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamValidator {
    pub fn new(config: UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { http, config })
    }

    /// Whether an endpoint is configured for the given FHIR version.
    pub fn is_configured(&self, version: FhirVersion) -> bool {
        self.config.endpoint(version).is_some()
    }

    /// Submits the resource for authoritative validation.
    ///
    /// Single attempt, no retry; the client-level timeout bounds the whole
    /// exchange. Non-2xx statuses and undecodable bodies are errors so the
    /// caller can fall back to its local outcome.
    pub async fn validate(
        &self,
        version: FhirVersion,
        resource: &Value,
    ) -> Result<Value, UpstreamError> {
        let endpoint = self
            .config
            .endpoint(version)
            .ok_or(UpstreamError::NotConfigured(version))?;

        let parameters = json!({
            "resourceType": "Parameters",
            "parameter": [{
                "name": "resource",
                "resource": resource,
            }]
        });

        let response = self
            .http
            .post(endpoint)
            .header("content-type", "application/fhir+json")
            .json(&parameters)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let outcome: Value = response.json().await?;
        if outcome.get("resourceType").and_then(Value::as_str) != Some("OperationOutcome") {
            return Err(UpstreamError::NotAnOutcome);
        }
        Ok(outcome)
    }
}
