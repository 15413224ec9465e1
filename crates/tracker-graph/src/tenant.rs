//! Tenant resolution for outgoing requests.
//!
//! The active organization is an explicit context object rather than a
//! module-level static. Every change bumps a scope epoch so that responses
//! issued under an older scope can be recognised and discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tracker_core::{TenantSlug, TrackerError};

/// The tenant a request was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    pub slug: TenantSlug,
    pub epoch: u64,
}

/// Process-wide current-tenant value with a configured default.
#[derive(Debug)]
pub struct TenantContext {
    default: TenantSlug,
    current: RwLock<Option<TenantSlug>>,
    epoch: AtomicU64,
}

impl TenantContext {
    pub fn new(default: TenantSlug) -> Self {
        Self {
            default,
            current: RwLock::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    /// The slug to attach to the next request. Never fails.
    pub fn resolve_tenant(&self) -> TenantSlug {
        self.scope().slug
    }

    /// Slug plus the epoch it belongs to, read consistently.
    pub fn scope(&self) -> TenantScope {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        TenantScope {
            slug: current.clone().unwrap_or_else(|| self.default.clone()),
            epoch: self.epoch.load(Ordering::Acquire),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn default_tenant(&self) -> &TenantSlug {
        &self.default
    }

    /// Select a tenant by raw slug.
    ///
    /// Returns `Ok(true)` when the effective tenant changed. Callers that
    /// own a cache must clear it in that case; `SyncClient::switch_tenant`
    /// does both.
    pub fn select(&self, raw: &str) -> Result<bool, TrackerError> {
        let slug = TenantSlug::new(raw)?;
        Ok(self.replace(Some(slug)))
    }

    /// Drop any explicit selection and fall back to the default tenant.
    pub fn reset(&self) -> bool {
        self.replace(None)
    }

    fn replace(&self, next: Option<TenantSlug>) -> bool {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let before = current.clone().unwrap_or_else(|| self.default.clone());
        let after = next.clone().unwrap_or_else(|| self.default.clone());
        *current = next;
        if before == after {
            return false;
        }
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(from = %before, to = %after, epoch, "Tenant scope changed");
        true
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::new(TenantSlug::default())
    }
}
