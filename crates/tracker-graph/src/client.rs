//! Shared GraphQL client: tenant scoping, bounded waits, error classification.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

use tracker_core::{ErrorList, TrackerConfig, TrackerError};

use crate::queries::Operation;
use crate::tenant::{TenantContext, TenantScope};
use crate::transport::{HttpTransport, Transport};

/// Configuration for reaching the tracker API.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for GraphConfig {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout: config.request_timeout(),
        }
    }
}

/// A successful (possibly partial) response.
///
/// `errors` is non-empty when the server returned data alongside errors.
/// `scope` records the tenant the request was issued under.
#[derive(Debug, Clone)]
pub struct Payload {
    pub data: Value,
    pub errors: ErrorList,
    pub scope: TenantScope,
}

impl Payload {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }

    /// A top-level field of `data`, `None` when absent or `null`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name).filter(|v| !v.is_null())
    }
}

/// The single point of access for all remote operations.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    transport: Arc<dyn Transport>,
    tenant: Arc<TenantContext>,
    timeout: Duration,
}

impl GraphClient {
    /// Build a client that talks HTTP to the configured endpoint.
    pub fn connect(config: &GraphConfig, tenant: Arc<TenantContext>) -> Result<Self, TrackerError> {
        let transport = HttpTransport::new(&config.endpoint, config.timeout)?;
        tracing::info!(endpoint = %config.endpoint, "Tracker client configured");
        Ok(Self::with_transport(Arc::new(transport), tenant, config.timeout))
    }

    /// Build a client over any transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        tenant: Arc<TenantContext>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            tenant,
            timeout,
        }
    }

    pub fn tenant(&self) -> &Arc<TenantContext> {
        &self.tenant
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute one operation under the current tenant scope.
    ///
    /// Never panics and never leaves the caller waiting past the timeout:
    /// every failure comes back as an `ErrorList`. Data accompanied by
    /// errors is returned as `Ok` with `Payload::errors` populated.
    pub async fn execute(&self, operation: &Operation) -> Result<Payload, ErrorList> {
        let scope = self.tenant.scope();
        let request_id = Uuid::new_v4();
        let start = Instant::now();

        let sent = tokio::time::timeout(
            self.timeout,
            self.transport.send(&scope.slug, request_id, operation),
        )
        .await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let response = match sent {
            Err(_) => {
                tracing::warn!(
                    operation = operation.operation_name,
                    tenant = %scope.slug,
                    %request_id,
                    elapsed_ms,
                    "Request timed out"
                );
                return Err(TrackerError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
                .into());
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    operation = operation.operation_name,
                    tenant = %scope.slug,
                    %request_id,
                    elapsed_ms,
                    error = %e,
                    "Request failed"
                );
                return Err(e.into());
            }
            Ok(Ok(response)) => response,
        };

        let errors = ErrorList(
            response
                .errors
                .into_iter()
                .map(|entry| entry.into_error())
                .collect(),
        );

        tracing::debug!(
            operation = operation.operation_name,
            tenant = %scope.slug,
            %request_id,
            elapsed_ms,
            error_count = errors.len(),
            "Request completed"
        );

        match response.data {
            Some(data) if !data.is_null() => Ok(Payload {
                data,
                errors,
                scope,
            }),
            _ if !errors.is_empty() => Err(errors),
            _ => Err(TrackerError::MalformedResponse(
                "response carried neither data nor errors".to_string(),
            )
            .into()),
        }
    }
}
