//! Fetching roots from the remote API into the cache.
//!
//! Every fetch runs as a spawned task and publishes its outcome on a
//! `watch` channel. First binds of the same root share one in-flight
//! fetch; dropping every receiver does not cancel it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use tracker_cache::RootKey;
use tracker_core::{ErrorList, TrackerError};
use tracker_graph::Operation;

use crate::SyncInner;

/// Everything needed to fetch and store one root.
#[derive(Debug, Clone)]
pub(crate) struct FetchSpec {
    pub operation: Operation,
    pub root_field: &'static str,
    pub root_key: RootKey,
    pub cached: bool,
}

/// How a fetch ended.
#[derive(Debug, Clone)]
pub(crate) enum FetchOutcome {
    /// The root was written to the cache. Uncached roots carry the raw
    /// value in `snapshot`. `errors` holds any partial-success errors.
    Loaded {
        errors: ErrorList,
        snapshot: Option<Value>,
    },
    Failed(ErrorList),
    /// The tenant changed while the request was in flight. Nothing was
    /// written.
    Superseded,
}

pub(crate) type OutcomeReceiver = watch::Receiver<Option<FetchOutcome>>;

/// A fetch other binds may still join.
pub(crate) struct InFlight {
    generation: u64,
    receiver: OutcomeReceiver,
}

/// Start fetching `spec`, or join a fetch already in flight for the same
/// root when `join` is set.
pub(crate) fn start(inner: &Arc<SyncInner>, spec: FetchSpec, join: bool) -> OutcomeReceiver {
    let mut in_flight = inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());

    if join {
        let joinable = in_flight
            .get(&spec.root_key)
            .filter(|f| f.receiver.borrow().is_none());
        if let Some(existing) = joinable {
            tracing::debug!(root = %spec.root_key, "Joining in-flight fetch");
            return existing.receiver.clone();
        }
    }

    let generation = inner.next_generation();
    let (tx, rx) = watch::channel(None);
    in_flight.insert(
        spec.root_key.clone(),
        InFlight {
            generation,
            receiver: rx.clone(),
        },
    );
    drop(in_flight);

    let task_inner = inner.clone();
    tokio::spawn(async move {
        let root_key = spec.root_key.clone();
        let outcome = run(&task_inner, spec).await;
        tx.send_replace(Some(outcome));

        let mut in_flight = task_inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight.get(&root_key).is_some_and(|f| f.generation == generation) {
            in_flight.remove(&root_key);
        }
    });

    rx
}

/// Stop offering in-flight fetches of `roots` to new joiners.
///
/// Used after a write: a fetch issued before the write may carry data the
/// write just replaced, so refreshes must not piggyback on it.
pub(crate) fn detach(inner: &SyncInner, roots: &[RootKey]) {
    let mut in_flight = inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
    for root in roots {
        in_flight.remove(root);
    }
}

/// Wait for a fetch to publish its outcome.
pub(crate) async fn outcome(receiver: &mut OutcomeReceiver) -> FetchOutcome {
    match receiver.wait_for(Option::is_some).await {
        Ok(published) => (*published).clone().unwrap_or(FetchOutcome::Superseded),
        Err(_) => FetchOutcome::Failed(
            TrackerError::Unreachable("fetch task ended without a result".to_string()).into(),
        ),
    }
}

async fn run(inner: &SyncInner, spec: FetchSpec) -> FetchOutcome {
    let issued = inner.graph.tenant().epoch();
    let result = inner.graph.execute(&spec.operation).await;

    // Failures from a previous tenant scope say nothing about the new one.
    let current = inner.graph.tenant().epoch();
    if current != issued {
        tracing::warn!(
            root = %spec.root_key,
            issued_epoch = issued,
            current_epoch = current,
            failed = result.is_err(),
            "Discarding response from a previous tenant scope"
        );
        return FetchOutcome::Superseded;
    }

    let payload = match result {
        Ok(payload) => payload,
        Err(errors) => return FetchOutcome::Failed(errors),
    };

    let value = payload.field(spec.root_field).cloned().unwrap_or(Value::Null);
    if value.is_null() && payload.is_partial() {
        // Null together with errors means the read failed, not that the
        // entity is missing.
        return FetchOutcome::Failed(payload.errors);
    }
    if payload.is_partial() {
        tracing::warn!(
            root = %spec.root_key,
            errors = %payload.errors,
            "Partial success: caching returned data"
        );
    }

    let mut cache = inner.cache.lock().unwrap_or_else(|e| e.into_inner());
    let current = inner.graph.tenant().epoch();
    if payload.scope.epoch != current {
        tracing::warn!(
            root = %spec.root_key,
            issued_epoch = payload.scope.epoch,
            current_epoch = current,
            "Discarding response from a previous tenant scope"
        );
        return FetchOutcome::Superseded;
    }
    cache.ensure_epoch(current);

    if !spec.cached {
        return FetchOutcome::Loaded {
            errors: payload.errors,
            snapshot: Some(value),
        };
    }

    match cache.write_root(spec.root_key.clone(), value) {
        Some(_) => {
            tracing::debug!(root = %spec.root_key, records = cache.len(), "Root stored");
            FetchOutcome::Loaded {
                errors: payload.errors,
                snapshot: None,
            }
        }
        None => FetchOutcome::Failed(
            TrackerError::MalformedResponse(format!(
                "{} did not return identifiable entities",
                spec.root_field
            ))
            .into(),
        ),
    }
}
