//! Subscription registry: who depends on which cache keys.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;

use tracker_core::EntityKey;

use crate::root::RootKey;

pub type SubscriptionId = u64;

/// Anything a subscriber can depend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Entity(EntityKey),
    Root(RootKey),
}

impl From<EntityKey> for CacheKey {
    fn from(key: EntityKey) -> Self {
        CacheKey::Entity(key)
    }
}

impl From<RootKey> for CacheKey {
    fn from(key: RootKey) -> Self {
        CacheKey::Root(key)
    }
}

/// What happened to a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheNotice {
    /// A tracked record or root was written with different content.
    Changed,
    /// A tracked record or root was removed.
    Evicted,
    /// A tracked root was marked stale and should be refetched.
    Stale,
}

struct Subscription {
    deps: HashSet<CacheKey>,
    tx: mpsc::UnboundedSender<CacheNotice>,
}

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    next_id: SubscriptionId,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

impl SubscriptionRegistry {
    pub fn subscribe(
        &mut self,
        deps: HashSet<CacheKey>,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<CacheNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, Subscription { deps, tx });
        (id, rx)
    }

    /// Replace the tracked keys. Returns false for an unknown id.
    pub fn set_dependencies(&mut self, id: SubscriptionId, deps: HashSet<CacheKey>) -> bool {
        match self.subscriptions.get_mut(&id) {
            Some(sub) => {
                sub.deps = deps;
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Send `notice` to every subscription tracking any of `keys`.
    /// Returns how many were notified.
    pub fn notify(&mut self, keys: &HashSet<CacheKey>, notice: CacheNotice) -> usize {
        if keys.is_empty() {
            return 0;
        }
        let mut notified = 0;
        self.subscriptions.retain(|_, sub| {
            if sub.tx.is_closed() {
                return false;
            }
            if sub.deps.is_disjoint(keys) {
                return true;
            }
            match sub.tx.send(notice) {
                Ok(()) => {
                    notified += 1;
                    true
                }
                Err(_) => false,
            }
        });
        notified
    }

    /// Send `notice` to every live subscription.
    pub fn notify_all(&mut self, notice: CacheNotice) -> usize {
        let mut notified = 0;
        self.subscriptions.retain(|_, sub| match sub.tx.send(notice) {
            Ok(()) => {
                notified += 1;
                true
            }
            Err(_) => false,
        });
        notified
    }
}
