//! Core domain types for the tracker client.
//!
//! These mirror the remote GraphQL schema as the cache sees it: field names
//! are camelCase on the wire, identifiers are opaque strings, and dates stay
//! in their wire string form. Parsing into `chrono` types happens only in the
//! presentation helpers at the bottom of each impl block.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

// ── Tenant ────────────────────────────────────────────────────────

/// URL-safe organization slug that scopes every request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct TenantSlug(String);

impl TenantSlug {
    /// Slug used when no organization has been selected.
    pub const DEFAULT: &'static str = "demo-org";

    /// Validate and wrap a slug. Letters, digits, `-` and `_` only.
    pub fn new(raw: impl Into<String>) -> Result<Self, TrackerError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(TrackerError::validation("organization slug", "must not be empty"));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(TrackerError::validation(
                "organization slug",
                format!("'{raw}' contains '{bad}', which is not URL-safe"),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantSlug {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for TenantSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantSlug {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantSlug> for String {
    fn from(slug: TenantSlug) -> Self {
        slug.0
    }
}

// ── Cache Identity ────────────────────────────────────────────────

/// The normalized entity types held by the cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Organization,
    Project,
    Task,
    TaskComment,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Organization => "Organization",
            EntityType::Project => "Project",
            EntityType::Task => "Task",
            EntityType::TaskComment => "TaskComment",
        }
    }

    /// Map a GraphQL `__typename` to an entity type.
    ///
    /// The server suffixes its object types with `Type` (`ProjectType`);
    /// both spellings are accepted.
    pub fn from_typename(typename: &str) -> Option<Self> {
        let base = typename.strip_suffix("Type").unwrap_or(typename);
        match base {
            "Organization" => Some(EntityType::Organization),
            "Project" => Some(EntityType::Project),
            "Task" => Some(EntityType::Task),
            "TaskComment" => Some(EntityType::TaskComment),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache identity of an entity: `(type, id)`, rendered as `Type:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub entity_type: EntityType,
    pub id: String,
}

impl EntityKey {
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }

    /// Parse the `Type:id` form used in cache references.
    pub fn parse(raw: &str) -> Option<Self> {
        let (typename, id) = raw.split_once(':')?;
        let entity_type = EntityType::from_typename(typename)?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(entity_type, id))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

/// A typed entity that can be read back out of the cache.
pub trait Entity: DeserializeOwned + Clone + Send + 'static {
    const TYPE: EntityType;

    fn id(&self) -> &str;

    fn key(&self) -> EntityKey {
        EntityKey::new(Self::TYPE, self.id())
    }
}

// ── Entities ──────────────────────────────────────────────────────

/// A tenant. Owns projects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub created_at: String,
}

impl Organization {
    pub fn created_at_parsed(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.created_at)
    }
}

/// A project. Aggregates are server-derived and never recomputed locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub due_date: Option<String>,
    /// Server-derived. `None` when the field failed to resolve or was not
    /// selected.
    #[serde(default)]
    pub task_count: Option<u32>,
    #[serde(default)]
    pub completed_task_count: Option<u32>,
    #[serde(default)]
    pub completion_rate: Option<f64>,
    pub created_at: String,
}

impl Project {
    /// Due date as a calendar date. `None` when unset or unparsable.
    pub fn due_date_parsed(&self) -> Option<NaiveDate> {
        self.due_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    pub fn created_at_parsed(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.created_at)
    }
}

/// The `{id, name}` projection of a project embedded in other reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
}

/// A task. `description` is absent from list projections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee_email: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub comment_count: Option<u32>,
    pub created_at: String,
}

impl Task {
    pub fn due_date_parsed(&self) -> Option<DateTime<FixedOffset>> {
        self.due_date.as_deref().and_then(parse_timestamp)
    }

    pub fn created_at_parsed(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.created_at)
    }
}

/// An immutable comment on a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskComment {
    pub id: String,
    pub content: String,
    pub author_email: String,
    pub timestamp: String,
}

impl TaskComment {
    pub fn timestamp_parsed(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.timestamp)
    }
}

impl Entity for Organization {
    const TYPE: EntityType = EntityType::Organization;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Project {
    const TYPE: EntityType = EntityType::Project;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Task {
    const TYPE: EntityType = EntityType::Task;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for TaskComment {
    const TYPE: EntityType = EntityType::TaskComment;

    fn id(&self) -> &str {
        &self.id
    }
}

// ── Read Shapes ───────────────────────────────────────────────────

/// A project together with its task summaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub tasks: Vec<Task>,
}

/// A task together with its parent project and comments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub project: ProjectSummary,
    pub comments: Vec<TaskComment>,
}

/// Aggregate statistics over every project in scope.
///
/// A disposable snapshot: never normalized into the entity cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    #[serde(default)]
    pub total_projects: Option<u32>,
    #[serde(default)]
    pub active_projects: Option<u32>,
    #[serde(default)]
    pub completed_projects: Option<u32>,
    #[serde(default)]
    pub total_tasks: Option<u32>,
    #[serde(default)]
    pub completed_tasks: Option<u32>,
    #[serde(default)]
    pub overall_completion_rate: Option<f64>,
}

/// Whichever entity a mutation produced.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AnyEntity {
    Organization(Organization),
    Project(Project),
    Task(Task),
    TaskComment(TaskComment),
}

impl AnyEntity {
    pub fn key(&self) -> EntityKey {
        match self {
            AnyEntity::Organization(e) => e.key(),
            AnyEntity::Project(e) => e.key(),
            AnyEntity::Task(e) => e.key(),
            AnyEntity::TaskComment(e) => e.key(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            AnyEntity::Organization(e) => &e.id,
            AnyEntity::Project(e) => &e.id,
            AnyEntity::Task(e) => &e.id,
            AnyEntity::TaskComment(e) => &e.id,
        }
    }

    /// Deserialize a wire record of the given type.
    pub fn from_value(
        entity_type: EntityType,
        value: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match entity_type {
            EntityType::Organization => AnyEntity::Organization(serde_json::from_value(value)?),
            EntityType::Project => AnyEntity::Project(serde_json::from_value(value)?),
            EntityType::Task => AnyEntity::Task(serde_json::from_value(value)?),
            EntityType::TaskComment => AnyEntity::TaskComment(serde_json::from_value(value)?),
        })
    }
}

// ── Enums ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Active,
    Completed,
    OnHold,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "ACTIVE",
            ProjectStatus::Completed => "COMPLETED",
            ProjectStatus::OnHold => "ON_HOLD",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ProjectStatus::Active),
            "COMPLETED" => Ok(ProjectStatus::Completed),
            "ON_HOLD" => Ok(ProjectStatus::OnHold),
            other => Err(TrackerError::validation(
                "status",
                format!("'{other}' is not one of ACTIVE, COMPLETED, ON_HOLD"),
            )),
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task workflow status. Any status is reachable from any other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(TaskStatus::Todo),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "DONE" => Ok(TaskStatus::Done),
            other => Err(TrackerError::validation(
                "status",
                format!("'{other}' is not one of TODO, IN_PROGRESS, DONE"),
            )),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse an RFC 3339 wire timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}
