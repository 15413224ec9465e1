//! The normalized entity store.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tokio::sync::mpsc;

use tracker_core::{Entity, EntityKey};

use crate::normalize::{make_ref, normalize, ref_key, Record};
use crate::root::{RootEntry, RootKey, RootValue};
use crate::subscription::{CacheKey, CacheNotice, SubscriptionId, SubscriptionRegistry};

/// A denormalized read together with every cache key it touched.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub deps: HashSet<CacheKey>,
    /// True when the root entry was marked stale.
    pub stale: bool,
}

/// One canonical record per `(type, id)`, the roots that point at them and
/// the subscriptions that watch both.
///
/// `epoch` is the tenant scope the contents belong to.
#[derive(Default)]
pub struct EntityCache {
    records: HashMap<EntityKey, Record>,
    roots: HashMap<RootKey, RootEntry>,
    subscriptions: SubscriptionRegistry,
    epoch: u64,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    // ── Records ──────────────────────────────────────────────────

    /// Upsert records, merging shallowly per top-level field.
    ///
    /// Fields present in the incoming record overwrite, absent fields are
    /// kept. Returns the keys whose stored record actually changed; only
    /// those are announced to subscribers.
    pub fn put(&mut self, entities: impl IntoIterator<Item = (EntityKey, Record)>) -> HashSet<EntityKey> {
        let mut changed = HashSet::new();
        for (key, incoming) in entities {
            let existing = self.records.entry(key.clone()).or_default();
            if merge(existing, incoming) {
                changed.insert(key);
            }
        }

        if !changed.is_empty() {
            tracing::debug!(changed = changed.len(), total = self.records.len(), "Cache records merged");
            let keys = changed.iter().cloned().map(CacheKey::Entity).collect();
            self.subscriptions.notify(&keys, CacheNotice::Changed);
        }
        changed
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Record> {
        self.records.get(key)
    }

    /// A typed entity by id. `None` when absent or incomplete for `T`.
    pub fn get_as<T: Entity>(&self, id: &str) -> Option<T> {
        let record = self.records.get(&EntityKey::new(T::TYPE, id))?;
        serde_json::from_value(Value::Object(record.clone())).ok()
    }

    /// Remove every record matching `predicate`. Returns how many went.
    pub fn invalidate<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&EntityKey, &Record) -> bool,
    {
        let doomed: Vec<EntityKey> = self
            .records
            .iter()
            .filter(|(key, record)| predicate(key, record))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.records.remove(key);
        }

        if !doomed.is_empty() {
            tracing::debug!(evicted = doomed.len(), "Cache records invalidated");
            let keys = doomed.into_iter().map(CacheKey::Entity).collect::<HashSet<_>>();
            let count = keys.len();
            self.subscriptions.notify(&keys, CacheNotice::Evicted);
            return count;
        }
        0
    }

    /// Append a reference to `parent.field` if that list is already known
    /// and does not yet contain `child`. Returns true when appended.
    pub fn append_ref(&mut self, parent: &EntityKey, field: &str, child: &EntityKey) -> bool {
        let Some(Value::Array(items)) = self.records.get_mut(parent).and_then(|r| r.get_mut(field))
        else {
            return false;
        };
        if items.iter().any(|item| ref_key(item).as_ref() == Some(child)) {
            return false;
        }
        items.push(make_ref(child));

        tracing::debug!(parent = %parent, field, child = %child, "Reference appended");
        let keys = HashSet::from([CacheKey::Entity(parent.clone())]);
        self.subscriptions.notify(&keys, CacheNotice::Changed);
        true
    }

    // ── Roots ────────────────────────────────────────────────────

    /// Normalize a response value for `root` and store both the records and
    /// the root entry. Values without identity (aggregates) store nothing
    /// and return `None`.
    pub fn write_root(&mut self, root: RootKey, value: Value) -> Option<RootValue> {
        let normalized = normalize(value);
        self.put(normalized.records);
        let root_value = RootValue::from_normalized(&normalized.value)?;
        self.put_root(root, root_value.clone());
        Some(root_value)
    }

    /// Store a root entry, clearing any stale mark.
    pub fn put_root(&mut self, key: RootKey, value: RootValue) -> bool {
        let entry = RootEntry { value, stale: false };
        if self.roots.get(&key) == Some(&entry) {
            return false;
        }
        self.roots.insert(key.clone(), entry);
        let keys = HashSet::from([CacheKey::Root(key)]);
        self.subscriptions.notify(&keys, CacheNotice::Changed);
        true
    }

    pub fn root(&self, key: &RootKey) -> Option<&RootEntry> {
        self.roots.get(key)
    }

    /// Mark roots stale and tell their subscribers to refetch.
    ///
    /// Subscribers are told even when no entry exists yet, since
    /// uncacheable roots (aggregates) are tracked by key alone.
    pub fn mark_stale(&mut self, keys: &[RootKey]) -> usize {
        for key in keys {
            if let Some(entry) = self.roots.get_mut(key) {
                entry.stale = true;
            }
        }
        let keys: HashSet<CacheKey> = keys.iter().cloned().map(CacheKey::Root).collect();
        let notified = self.subscriptions.notify(&keys, CacheNotice::Stale);
        tracing::debug!(roots = keys.len(), notified, "Roots marked stale");
        notified
    }

    pub fn evict_root(&mut self, key: &RootKey) -> bool {
        if self.roots.remove(key).is_none() {
            return false;
        }
        let keys = HashSet::from([CacheKey::Root(key.clone())]);
        self.subscriptions.notify(&keys, CacheNotice::Evicted);
        true
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Denormalize one record, inlining references found under `follow`
    /// one level deep. `None` if the record or anything it references is
    /// missing.
    pub fn resolve(&self, key: &EntityKey, follow: &[&str]) -> Option<Resolved> {
        let mut deps = HashSet::new();
        let value = self.resolve_into(key, follow, &mut deps)?;
        Some(Resolved {
            value,
            deps,
            stale: false,
        })
    }

    /// Read a root entry and everything it points at.
    ///
    /// A `Null` root resolves to `Value::Null`. `None` means a cache miss.
    pub fn read_root(&self, key: &RootKey, follow: &[&str]) -> Option<Resolved> {
        let entry = self.roots.get(key)?;
        let mut deps = HashSet::from([CacheKey::Root(key.clone())]);
        let value = match &entry.value {
            RootValue::Null => Value::Null,
            RootValue::One(k) => self.resolve_into(k, follow, &mut deps)?,
            RootValue::Many(keys) => Value::Array(
                keys.iter()
                    .map(|k| self.resolve_into(k, follow, &mut deps))
                    .collect::<Option<Vec<_>>>()?,
            ),
        };
        Some(Resolved {
            value,
            deps,
            stale: entry.stale,
        })
    }

    fn resolve_into(
        &self,
        key: &EntityKey,
        follow: &[&str],
        deps: &mut HashSet<CacheKey>,
    ) -> Option<Value> {
        let mut record = self.records.get(key)?.clone();
        deps.insert(CacheKey::Entity(key.clone()));

        for field in follow {
            if let Some(slot) = record.get_mut(*field) {
                *slot = self.inline(slot, deps)?;
            }
        }
        Some(Value::Object(record))
    }

    fn inline(&self, value: &Value, deps: &mut HashSet<CacheKey>) -> Option<Value> {
        if let Some(key) = ref_key(value) {
            let record = self.records.get(&key)?;
            deps.insert(CacheKey::Entity(key));
            return Some(Value::Object(record.clone()));
        }
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.inline(item, deps))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            other => Some(other.clone()),
        }
    }

    // ── Scope ────────────────────────────────────────────────────

    /// Drop everything and adopt `epoch`. Every subscriber hears `Evicted`.
    pub fn clear(&mut self, epoch: u64) {
        let records = self.records.len();
        let roots = self.roots.len();
        self.records.clear();
        self.roots.clear();
        self.epoch = epoch;
        let notified = self.subscriptions.notify_all(CacheNotice::Evicted);
        tracing::info!(epoch, records, roots, notified, "Entity cache cleared");
    }

    /// Clear if the cache still holds data from another scope.
    /// Returns true when a clear happened.
    pub fn ensure_epoch(&mut self, epoch: u64) -> bool {
        if self.epoch == epoch {
            return false;
        }
        self.clear(epoch);
        true
    }

    // ── Subscriptions ────────────────────────────────────────────

    pub fn subscribe(
        &mut self,
        deps: HashSet<CacheKey>,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<CacheNotice>) {
        self.subscriptions.subscribe(deps)
    }

    pub fn set_dependencies(&mut self, id: SubscriptionId, deps: HashSet<CacheKey>) -> bool {
        self.subscriptions.set_dependencies(id, deps)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }
}

/// Shallow merge. Returns true if anything changed.
fn merge(existing: &mut Record, incoming: Record) -> bool {
    let mut changed = false;
    for (field, value) in incoming {
        if existing.get(&field) != Some(&value) {
            existing.insert(field, value);
            changed = true;
        }
    }
    changed
}
