//! Read operation documents for the tracker API.
//!
//! Every object selection requests `__typename` so responses can be
//! normalized by identity without knowledge of the schema.

use serde::Serialize;
use serde_json::{json, Value};

/// A named GraphQL operation with its variables, ready to POST.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_name: &'static str,
    pub query: &'static str,
    pub variables: Value,
}

impl Operation {
    pub fn new(operation_name: &'static str, query: &'static str, variables: Value) -> Self {
        Self {
            operation_name,
            query,
            variables,
        }
    }
}

// ── Documents ────────────────────────────────────────────────────

pub const GET_PROJECTS: &str = r#"
query GetProjects {
  projects {
    __typename
    id
    name
    status
    description
    dueDate
    taskCount
    completedTaskCount
    completionRate
    createdAt
  }
}"#;

pub const GET_PROJECT: &str = r#"
query GetProject($id: ID!) {
  project(id: $id) {
    __typename
    id
    name
    status
    description
    dueDate
    taskCount
    completedTaskCount
    completionRate
    createdAt
    tasks {
      __typename
      id
      title
      status
      assigneeEmail
      dueDate
      createdAt
    }
  }
}"#;

pub const GET_TASK: &str = r#"
query GetTask($id: ID!) {
  task(id: $id) {
    __typename
    id
    title
    description
    status
    assigneeEmail
    dueDate
    createdAt
    project {
      __typename
      id
      name
    }
    comments {
      __typename
      id
      content
      authorEmail
      timestamp
    }
  }
}"#;

pub const GET_PROJECT_STATS: &str = r#"
query GetProjectStats {
  projectStats {
    totalProjects
    activeProjects
    completedProjects
    totalTasks
    completedTasks
    overallCompletionRate
  }
}"#;

pub const GET_ORGANIZATIONS: &str = r#"
query GetOrganizations {
  organizations {
    __typename
    id
    name
    slug
    contactEmail
    createdAt
  }
}"#;

pub const GET_ORGANIZATION: &str = r#"
query GetOrganization($slug: String!) {
  organization(slug: $slug) {
    __typename
    id
    name
    slug
    contactEmail
    createdAt
  }
}"#;

// ── Operation Builders ───────────────────────────────────────────

pub fn get_projects() -> Operation {
    Operation::new("GetProjects", GET_PROJECTS, json!({}))
}

pub fn get_project(id: &str) -> Operation {
    Operation::new("GetProject", GET_PROJECT, json!({ "id": id }))
}

pub fn get_task(id: &str) -> Operation {
    Operation::new("GetTask", GET_TASK, json!({ "id": id }))
}

pub fn get_project_stats() -> Operation {
    Operation::new("GetProjectStats", GET_PROJECT_STATS, json!({}))
}

pub fn get_organizations() -> Operation {
    Operation::new("GetOrganizations", GET_ORGANIZATIONS, json!({}))
}

pub fn get_organization(slug: &str) -> Operation {
    Operation::new("GetOrganization", GET_ORGANIZATION, json!({ "slug": slug }))
}
