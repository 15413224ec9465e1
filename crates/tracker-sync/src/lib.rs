//! tracker-sync: client-side data synchronization for the tracker API.
//!
//! Binds typed queries to the normalized entity cache, fetching what the
//! cache lacks, and applies mutations so every overlapping view converges
//! on the same merged records. The tenant scope and the cache live in one
//! explicit context object, [`SyncClient`].

mod fetch;
pub mod mutation;
pub mod query;
pub mod watch;

pub use mutation::MutationHooks;
pub use query::{
    NamedQuery, OrganizationBySlug, Organizations, ProjectById, ProjectStatsQuery, Projects, Query,
    TaskById,
};
pub use watch::{QueryState, QueryWatch};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use tracker_cache::{EntityCache, Record, RootKey};
use tracker_core::{AnyEntity, Entity, EntityKey, ErrorList, TenantSlug, TrackerConfig, TrackerError};
use tracker_graph::{GraphClient, GraphConfig, Mutation, TenantContext, Transport};

use crate::fetch::InFlight;

/// State shared by the client, its watches and their spawned fetches.
pub(crate) struct SyncInner {
    pub(crate) graph: GraphClient,
    pub(crate) cache: Mutex<EntityCache>,
    pub(crate) in_flight: Mutex<HashMap<RootKey, InFlight>>,
    generation: AtomicU64,
}

impl SyncInner {
    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }
}

/// Tenant scope, entity cache and transport behind one handle.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<SyncInner>,
}

impl SyncClient {
    /// Start with the default tenant and an empty cache.
    pub fn new(graph: GraphClient) -> Self {
        let epoch = graph.tenant().epoch();
        let mut cache = EntityCache::new();
        cache.ensure_epoch(epoch);
        Self {
            inner: Arc::new(SyncInner {
                graph,
                cache: Mutex::new(cache),
                in_flight: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Build an HTTP-backed client from configuration.
    pub fn connect(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let tenant = Arc::new(TenantContext::new(config.default_tenant()?));
        let graph = GraphClient::connect(&GraphConfig::from(config), tenant)?;
        Ok(Self::new(graph))
    }

    /// Build a client over any transport.
    pub fn with_transport(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        let tenant = Arc::new(TenantContext::default());
        Self::new(GraphClient::with_transport(transport, tenant, timeout))
    }

    // ── Tenant Scope ─────────────────────────────────────────────

    /// The organization slug attached to outgoing requests.
    pub fn tenant(&self) -> TenantSlug {
        self.inner.graph.tenant().resolve_tenant()
    }

    /// Select another organization. Clears the cache when the tenant
    /// actually changed; every bound watch then refetches.
    pub fn switch_tenant(&self, slug: &str) -> Result<bool, TrackerError> {
        let mut cache = self.lock_cache();
        let changed = self.inner.graph.tenant().select(slug)?;
        if changed {
            cache.clear(self.inner.graph.tenant().epoch());
            self.forget_in_flight();
        }
        Ok(changed)
    }

    /// Fall back to the default organization.
    pub fn reset_tenant(&self) -> bool {
        let mut cache = self.lock_cache();
        let changed = self.inner.graph.tenant().reset();
        if changed {
            cache.clear(self.inner.graph.tenant().epoch());
            self.forget_in_flight();
        }
        changed
    }

    // ── Reads ────────────────────────────────────────────────────

    /// A typed entity straight from the cache, without any request.
    pub fn get<T: Entity>(&self, id: &str) -> Option<T> {
        let mut cache = self.lock_cache();
        cache.ensure_epoch(self.inner.graph.tenant().epoch());
        cache.get_as(id)
    }

    /// The raw merged record for `key`.
    pub fn record(&self, key: &EntityKey) -> Option<Record> {
        let mut cache = self.lock_cache();
        cache.ensure_epoch(self.inner.graph.tenant().epoch());
        cache.get(key).cloned()
    }

    /// Bind a view to `query`. Must be called within a Tokio runtime.
    pub fn watch<Q: Query>(&self, query: Q) -> QueryWatch<Q> {
        QueryWatch::bind(self.inner.clone(), query)
    }

    /// Bind a view by operation name, e.g. `GetProject` with `{"id": "1"}`.
    pub fn watch_named(
        &self,
        operation_name: &str,
        variables: &Value,
    ) -> Result<QueryWatch<NamedQuery>, ErrorList> {
        Ok(self.watch(NamedQuery::new(operation_name, variables)?))
    }

    /// Bind, wait for the first settled state and unbind.
    pub async fn fetch<Q: Query>(&self, query: Q) -> QueryState<Q::Output> {
        self.watch(query).settled().await
    }

    /// Remove cached entities matching `predicate`. Views reading them
    /// refetch.
    pub fn invalidate<F>(&self, predicate: F) -> usize
    where
        F: Fn(&EntityKey, &Record) -> bool,
    {
        self.lock_cache().invalidate(predicate)
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Validate, send once and reconcile the result into the cache.
    ///
    /// `hooks` fire after the cache has been updated: `on_success` with
    /// the merged entity, or `on_failure` with every error (validation
    /// included). Never both.
    pub async fn mutate(
        &self,
        mutation: Mutation,
        hooks: MutationHooks,
    ) -> Result<AnyEntity, ErrorList> {
        mutation::run(&self.inner, mutation, hooks).await
    }

    /// [`SyncClient::mutate`] by name, e.g. `createTask` with JSON variables.
    pub async fn mutate_named(
        &self,
        name: &str,
        variables: &Value,
        hooks: MutationHooks,
    ) -> Result<AnyEntity, ErrorList> {
        match Mutation::from_variables(name, variables) {
            Ok(mutation) => self.mutate(mutation, hooks).await,
            Err(errors) => {
                hooks.fail(&errors);
                Err(errors)
            }
        }
    }

    /// Fetches issued under the old tenant must not be joined.
    fn forget_in_flight(&self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, EntityCache> {
        self.inner.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}
