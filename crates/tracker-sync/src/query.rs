//! Typed read operations.
//!
//! A query names its operation, the root field it reads, the relation
//! fields to inline when reading back from the cache, and its output type.

use serde::de::DeserializeOwned;
use serde_json::Value;

use tracker_cache::RootKey;
use tracker_core::{
    ErrorList, Organization, Project, ProjectDetail, ProjectStats, TaskDetail, TrackerError,
};
use tracker_graph::queries::{self, Operation};

/// A read the sync layer can bind a watch to.
pub trait Query: Send + 'static {
    type Output: DeserializeOwned + Clone + PartialEq + Send + 'static;

    fn operation(&self) -> Operation;

    /// The field on the response root holding the result.
    fn root_field(&self) -> &'static str;

    /// Relation fields inlined one level deep on read-back.
    fn follow(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether results are normalized into the cache. Aggregates are not.
    fn cached(&self) -> bool {
        true
    }

    fn root_key(&self) -> RootKey {
        RootKey::new(self.root_field(), &self.operation().variables)
    }
}

// ── Typed Reads ──────────────────────────────────────────────────

/// All projects of the current organization.
#[derive(Debug, Clone, Copy, Default)]
pub struct Projects;

impl Query for Projects {
    type Output = Vec<Project>;

    fn operation(&self) -> Operation {
        queries::get_projects()
    }

    fn root_field(&self) -> &'static str {
        "projects"
    }
}

/// One project with its task summaries.
#[derive(Debug, Clone)]
pub struct ProjectById(pub String);

impl Query for ProjectById {
    type Output = ProjectDetail;

    fn operation(&self) -> Operation {
        queries::get_project(&self.0)
    }

    fn root_field(&self) -> &'static str {
        "project"
    }

    fn follow(&self) -> &'static [&'static str] {
        &["tasks"]
    }
}

/// One task with its project and comments.
#[derive(Debug, Clone)]
pub struct TaskById(pub String);

impl Query for TaskById {
    type Output = TaskDetail;

    fn operation(&self) -> Operation {
        queries::get_task(&self.0)
    }

    fn root_field(&self) -> &'static str {
        "task"
    }

    fn follow(&self) -> &'static [&'static str] {
        &["project", "comments"]
    }
}

/// Aggregate statistics. Fetched on every bind, never cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectStatsQuery;

impl Query for ProjectStatsQuery {
    type Output = ProjectStats;

    fn operation(&self) -> Operation {
        queries::get_project_stats()
    }

    fn root_field(&self) -> &'static str {
        "projectStats"
    }

    fn cached(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Organizations;

impl Query for Organizations {
    type Output = Vec<Organization>;

    fn operation(&self) -> Operation {
        queries::get_organizations()
    }

    fn root_field(&self) -> &'static str {
        "organizations"
    }
}

#[derive(Debug, Clone)]
pub struct OrganizationBySlug(pub String);

impl Query for OrganizationBySlug {
    type Output = Organization;

    fn operation(&self) -> Operation {
        queries::get_organization(&self.0)
    }

    fn root_field(&self) -> &'static str {
        "organization"
    }
}

// ── Dynamic Reads ────────────────────────────────────────────────

/// A read chosen at runtime by operation name. Output stays JSON.
#[derive(Debug, Clone)]
pub struct NamedQuery {
    operation: Operation,
    root_field: &'static str,
    follow: &'static [&'static str],
    cached: bool,
}

impl NamedQuery {
    /// Operation names accepted by [`NamedQuery::new`].
    pub const NAMES: [&'static str; 6] = [
        "GetProjects",
        "GetProject",
        "GetTask",
        "GetProjectStats",
        "GetOrganizations",
        "GetOrganization",
    ];

    pub fn new(operation_name: &str, variables: &Value) -> Result<Self, ErrorList> {
        let named = match operation_name {
            "GetProjects" => Self::from_query(&Projects),
            "GetProject" => Self::from_query(&ProjectById(string_var(variables, "id")?)),
            "GetTask" => Self::from_query(&TaskById(string_var(variables, "id")?)),
            "GetProjectStats" => Self::from_query(&ProjectStatsQuery),
            "GetOrganizations" => Self::from_query(&Organizations),
            "GetOrganization" => {
                Self::from_query(&OrganizationBySlug(string_var(variables, "slug")?))
            }
            other => {
                return Err(TrackerError::validation(
                    "operation",
                    format!("unknown query '{other}'"),
                )
                .into())
            }
        };
        Ok(named)
    }

    fn from_query<Q: Query>(query: &Q) -> Self {
        Self {
            operation: query.operation(),
            root_field: query.root_field(),
            follow: query.follow(),
            cached: query.cached(),
        }
    }
}

impl Query for NamedQuery {
    type Output = Value;

    fn operation(&self) -> Operation {
        self.operation.clone()
    }

    fn root_field(&self) -> &'static str {
        self.root_field
    }

    fn follow(&self) -> &'static [&'static str] {
        self.follow
    }

    fn cached(&self) -> bool {
        self.cached
    }
}

fn string_var(variables: &Value, name: &str) -> Result<String, ErrorList> {
    match variables.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(TrackerError::validation(name, "is required").into())
        }
        Some(_) => Err(TrackerError::validation(name, "must be a string").into()),
    }
}
