//! Tracker Cache: the single in-memory source of truth for entities.
//!
//! Responses are normalized into flat records keyed by `(type, id)`; parents
//! hold `{"__ref": "Type:id"}` references instead of copies, so the same
//! task seen through a project and on its own can never diverge. Query
//! results are remembered as root entries pointing at those records, and a
//! subscription registry tells bound watches when anything they read changes.

pub mod normalize;
pub mod root;
pub mod store;
pub mod subscription;

pub use normalize::{normalize, Normalized, Record};
pub use root::{RootEntry, RootKey, RootValue};
pub use store::{EntityCache, Resolved};
pub use subscription::{CacheKey, CacheNotice, SubscriptionId};
