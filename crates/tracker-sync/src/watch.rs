//! Bound query views.
//!
//! A [`QueryWatch`] owns a subscription in the entity cache and, while
//! anything it reads is being fetched, a receiver for that fetch. It turns
//! cache notices and fetch outcomes into [`QueryState`] transitions.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use tracker_cache::{CacheKey, CacheNotice, RootKey, SubscriptionId};
use tracker_core::{ErrorList, TrackerError};

use crate::fetch::{self, FetchOutcome, FetchSpec, OutcomeReceiver};
use crate::query::Query;
use crate::SyncInner;

/// What a bound view currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    Loading,
    /// The server answered `null` for a single-entity read.
    NotFound,
    Failed(ErrorList),
    /// `errors` is non-empty after a partial success. `stale` is set while
    /// a dependent-query refresh is pending.
    Loaded {
        data: T,
        errors: ErrorList,
        stale: bool,
    },
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            QueryState::Loaded { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            QueryState::Loaded { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn errors(&self) -> Option<&ErrorList> {
        match self {
            QueryState::Failed(errors) => Some(errors),
            QueryState::Loaded { errors, .. } if !errors.is_empty() => Some(errors),
            _ => None,
        }
    }
}

enum Event {
    Fetched(FetchOutcome),
    Notice(CacheNotice),
    /// The cache dropped this subscription.
    Closed,
}

/// A live view over one query.
///
/// Dropping it unsubscribes from the cache; a fetch it started keeps
/// running and still lands in the cache.
pub struct QueryWatch<Q: Query> {
    inner: Arc<SyncInner>,
    query: Q,
    root: RootKey,
    subscription: SubscriptionId,
    notices: mpsc::UnboundedReceiver<CacheNotice>,
    pending: Option<OutcomeReceiver>,
    state: QueryState<Q::Output>,
    /// Errors from the last partial success, shown alongside cached data.
    errors: ErrorList,
    /// Last value of an uncached root.
    snapshot: Option<Value>,
}

impl<Q: Query> QueryWatch<Q> {
    pub(crate) fn bind(inner: Arc<SyncInner>, query: Q) -> Self {
        let root = query.root_key();
        let (subscription, notices) = {
            let mut cache = inner.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.ensure_epoch(inner.graph.tenant().epoch());
            cache.subscribe(HashSet::from([CacheKey::Root(root.clone())]))
        };

        let mut watch = Self {
            inner,
            query,
            root,
            subscription,
            notices,
            pending: None,
            state: QueryState::Loading,
            errors: ErrorList::new(),
            snapshot: None,
        };

        match watch.read_cache() {
            Some(state) => {
                let stale = matches!(state, QueryState::Loaded { stale: true, .. });
                watch.state = state;
                if stale {
                    watch.start_fetch(true);
                }
            }
            None => watch.start_fetch(true),
        }
        tracing::debug!(
            root = %watch.root,
            loading = watch.state.is_loading(),
            "Query bound"
        );
        watch
    }

    pub fn state(&self) -> &QueryState<Q::Output> {
        &self.state
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    /// True while a fetch for this view is outstanding.
    pub fn is_fetching(&self) -> bool {
        self.pending.is_some()
    }

    /// Force a fresh request regardless of cache state.
    ///
    /// Never joins a fetch already in flight. The state keeps showing
    /// cached data until the response lands.
    pub fn refetch(&mut self) {
        self.start_fetch(false);
        if !matches!(self.state, QueryState::Loaded { .. }) {
            self.state = QueryState::Loading;
        }
    }

    /// Wait for the next event that changes the state and return it.
    pub async fn changed(&mut self) -> QueryState<Q::Output> {
        let before = self.state.clone();
        loop {
            if !self.next_event().await {
                return self.state.clone();
            }
            if self.state != before {
                return self.state.clone();
            }
        }
    }

    /// Wait until nothing is loading or being fetched for this view.
    pub async fn settled(&mut self) -> QueryState<Q::Output> {
        loop {
            self.drain_notices();
            if self.pending.is_none() && !self.state.is_loading() {
                return self.state.clone();
            }
            if !self.next_event().await {
                return self.state.clone();
            }
        }
    }

    // ── Event Handling ───────────────────────────────────────────

    /// Process one event. Returns false when no event can ever arrive.
    async fn next_event(&mut self) -> bool {
        let event = tokio::select! {
            outcome = wait_pending(&mut self.pending) => Event::Fetched(outcome),
            notice = self.notices.recv() => match notice {
                Some(notice) => Event::Notice(notice),
                None => Event::Closed,
            },
        };
        match event {
            Event::Closed => match self.pending.as_mut() {
                Some(rx) => {
                    let outcome = fetch::outcome(rx).await;
                    self.handle(Event::Fetched(outcome));
                    true
                }
                None => false,
            },
            event => {
                self.handle(event);
                true
            }
        }
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            self.handle(Event::Notice(notice));
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Closed => {}
            Event::Fetched(outcome) => {
                self.pending = None;
                self.apply_outcome(outcome);
            }
            Event::Notice(CacheNotice::Changed) => {
                if self.query.cached() {
                    self.refresh_from_cache();
                }
            }
            Event::Notice(CacheNotice::Evicted) => {
                self.snapshot = None;
                self.errors = ErrorList::new();
                if self.query.cached() {
                    self.refresh_from_cache();
                } else {
                    self.state = QueryState::Loading;
                    if self.pending.is_none() {
                        self.start_fetch(true);
                    }
                }
            }
            Event::Notice(CacheNotice::Stale) => {
                tracing::debug!(root = %self.root, "Refreshing stale query");
                self.start_fetch(true);
                if let QueryState::Loaded { stale, .. } = &mut self.state {
                    *stale = true;
                }
            }
        }
    }

    fn apply_outcome(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Loaded { errors, snapshot } => {
                self.errors = errors;
                if self.query.cached() {
                    self.state = match self.read_cache() {
                        Some(state) => state,
                        None if self.epoch_moved() => {
                            self.start_fetch(true);
                            QueryState::Loading
                        }
                        None => QueryState::Failed(
                            TrackerError::MalformedResponse(format!(
                                "{} could not be read back from the cache",
                                self.root
                            ))
                            .into(),
                        ),
                    };
                } else {
                    self.snapshot = snapshot;
                    self.state = self.decode_snapshot();
                }
            }
            FetchOutcome::Failed(errors) => {
                tracing::debug!(root = %self.root, errors = %errors, "Query failed");
                self.state = QueryState::Failed(errors);
            }
            FetchOutcome::Superseded => {
                self.start_fetch(true);
                self.state = QueryState::Loading;
            }
        }
    }

    /// Re-read after a notice. A miss means something this view needs is
    /// gone, so fetch it again.
    fn refresh_from_cache(&mut self) {
        match self.read_cache() {
            Some(state) => self.state = state,
            None => {
                self.state = QueryState::Loading;
                if self.pending.is_none() {
                    self.start_fetch(true);
                }
            }
        }
    }

    // ── Cache Access ─────────────────────────────────────────────

    /// Current state as the cache sees it. `None` on a miss.
    fn read_cache(&mut self) -> Option<QueryState<Q::Output>> {
        if !self.query.cached() {
            return self.snapshot.as_ref().map(|_| self.decode_snapshot());
        }

        let mut cache = self.inner.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.ensure_epoch(self.inner.graph.tenant().epoch());

        let Some(resolved) = cache.read_root(&self.root, self.query.follow()) else {
            cache.set_dependencies(
                self.subscription,
                HashSet::from([CacheKey::Root(self.root.clone())]),
            );
            return None;
        };
        cache.set_dependencies(self.subscription, resolved.deps);
        drop(cache);

        if resolved.value.is_null() {
            return Some(QueryState::NotFound);
        }
        match serde_json::from_value(resolved.value) {
            Ok(data) => Some(QueryState::Loaded {
                data,
                errors: self.errors.clone(),
                stale: resolved.stale,
            }),
            Err(e) => {
                tracing::debug!(root = %self.root, error = %e, "Cached data incomplete for query");
                None
            }
        }
    }

    fn decode_snapshot(&self) -> QueryState<Q::Output> {
        match &self.snapshot {
            None => QueryState::Loading,
            Some(Value::Null) => QueryState::NotFound,
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(data) => QueryState::Loaded {
                    data,
                    errors: self.errors.clone(),
                    stale: false,
                },
                Err(e) => QueryState::Failed(
                    TrackerError::MalformedResponse(format!("{}: {e}", self.root)).into(),
                ),
            },
        }
    }

    fn epoch_moved(&self) -> bool {
        let cache = self.inner.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.epoch() != self.inner.graph.tenant().epoch()
    }

    fn start_fetch(&mut self, join: bool) {
        let spec = FetchSpec {
            operation: self.query.operation(),
            root_field: self.query.root_field(),
            root_key: self.root.clone(),
            cached: self.query.cached(),
        };
        self.pending = Some(fetch::start(&self.inner, spec, join));
    }
}

impl<Q: Query> Drop for QueryWatch<Q> {
    fn drop(&mut self) {
        let mut cache = self.inner.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.unsubscribe(self.subscription);
    }
}

async fn wait_pending(pending: &mut Option<OutcomeReceiver>) -> FetchOutcome {
    match pending {
        Some(rx) => fetch::outcome(rx).await,
        None => std::future::pending().await,
    }
}
