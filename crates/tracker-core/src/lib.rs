//! tracker-core: Shared types, configuration, and error handling for the tracker client.
//!
//! This crate provides the foundational types used across all tracker crates:
//! - Entity types (Organization, Project, Task, TaskComment) as seen on the wire
//! - Cache identity (`EntityType`, `EntityKey`) and tenant scoping (`TenantSlug`)
//! - Configuration management
//! - The error taxonomy shared by transport, cache, and sync layers

pub mod config;
pub mod error;
pub mod types;

pub use config::TrackerConfig;
pub use error::{ErrorKind, ErrorList, TrackerError};
pub use types::{
    AnyEntity, Entity, EntityKey, EntityType, Organization, Project, ProjectDetail, ProjectStats,
    ProjectStatus, ProjectSummary, Task, TaskComment, TaskDetail, TaskStatus, TenantSlug,
};
