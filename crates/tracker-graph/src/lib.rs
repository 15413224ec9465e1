//! Tracker Graph: GraphQL transport for the tracker API.
//!
//! Every read and write the client performs flows through this crate, so
//! tenant scoping, timeouts, and error classification are applied in one
//! place. The operation documents and mutation inputs live here as well;
//! caching and reconciliation are left to `tracker-cache` and `tracker-sync`.

pub mod client;
pub mod mutations;
pub mod queries;
pub mod tenant;
pub mod transport;

pub use client::{GraphClient, GraphConfig, Payload};
pub use mutations::Mutation;
pub use queries::Operation;
pub use tenant::{TenantContext, TenantScope};
pub use transport::{GraphResponse, HttpTransport, Transport};
