//! The network seam: one GraphQL request in, one classified response out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use tracker_core::{TenantSlug, TrackerError};

use crate::queries::Operation;

/// Header carrying the tenant scope on every request.
pub const ORGANIZATION_HEADER: &str = "X-Organization-Slug";
/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A single entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    #[serde(default)]
    pub path: Vec<Value>,
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl ErrorEntry {
    pub fn into_error(self) -> TrackerError {
        let code = self
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let path = self
            .path
            .iter()
            .map(|p| match p {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        TrackerError::Application {
            message: self.message,
            code,
            path,
        }
    }
}

/// The `{data?, errors?}` envelope. Both may be present.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

/// Anything that can carry an operation to the remote API.
///
/// Implementations report only transport-level failures as `Err`;
/// schema-level failures travel inside the returned `GraphResponse`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        tenant: &TenantSlug,
        request_id: Uuid,
        operation: &Operation,
    ) -> Result<GraphResponse, TrackerError>;
}

/// `reqwest`-backed transport POSTing JSON to a single endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        tenant: &TenantSlug,
        request_id: Uuid,
        operation: &Operation,
    ) -> Result<GraphResponse, TrackerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(request_headers(tenant, request_id)?)
            .json(operation)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        parse_body(status.as_u16(), &body)
    }
}

impl HttpTransport {
    fn classify(&self, err: reqwest::Error) -> TrackerError {
        if err.is_timeout() {
            TrackerError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if err.is_decode() || err.is_body() {
            TrackerError::MalformedResponse(err.to_string())
        } else {
            TrackerError::Unreachable(err.to_string())
        }
    }
}

/// Headers attached to every request.
pub fn request_headers(tenant: &TenantSlug, request_id: Uuid) -> Result<HeaderMap, TrackerError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let slug = HeaderValue::from_str(tenant.as_str())
        .map_err(|e| TrackerError::validation("organization slug", e.to_string()))?;
    headers.insert(ORGANIZATION_HEADER, slug);
    // A UUID always renders as a valid header value.
    if let Ok(id) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, id);
    }
    Ok(headers)
}

/// Classify a response body.
///
/// GraphQL envelopes pass through untouched. The tenant middleware answers
/// unknown organizations with `{"error", "code"}` outside the envelope; that
/// becomes an application error. Anything else is malformed.
pub fn parse_body(status: u16, body: &str) -> Result<GraphResponse, TrackerError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        TrackerError::MalformedResponse(format!("HTTP {status}: body is not JSON ({e})"))
    })?;

    let Value::Object(map) = &value else {
        return Err(TrackerError::MalformedResponse(format!(
            "HTTP {status}: expected a JSON object"
        )));
    };

    if map.contains_key("data") || map.contains_key("errors") {
        return serde_json::from_value(value)
            .map_err(|e| TrackerError::MalformedResponse(format!("HTTP {status}: {e}")));
    }

    if let Some(message) = map.get("error").and_then(Value::as_str) {
        let code = map.get("code").and_then(Value::as_str).map(str::to_string);
        return Err(TrackerError::Application {
            message: message.to_string(),
            code,
            path: Vec::new(),
        });
    }

    Err(TrackerError::MalformedResponse(format!(
        "HTTP {status}: neither data nor errors present"
    )))
}
