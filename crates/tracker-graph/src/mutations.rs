//! Write operations for the tracker API.
//!
//! Each mutation is a typed input struct. Inputs are validated locally before
//! anything is sent; a validation failure never reaches the transport.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use tracker_core::{EntityType, ErrorList, ProjectStatus, TaskStatus, TenantSlug, TrackerError};

use crate::queries::Operation;

const ORGANIZATION_NAME_MAX: usize = 100;
const PROJECT_NAME_MAX: usize = 200;
const TASK_TITLE_MAX: usize = 200;

// ── Inputs ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganization {
    pub name: String,
    pub contact_email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_slug: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProject {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub project_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTaskComment {
    pub task_id: String,
    pub content: String,
    pub author_email: String,
}

/// Every write the client can perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateOrganization(CreateOrganization),
    CreateProject(CreateProject),
    UpdateProject(UpdateProject),
    CreateTask(CreateTask),
    UpdateTask(UpdateTask),
    AddTaskComment(AddTaskComment),
}

impl Mutation {
    /// Operation names accepted by [`Mutation::from_variables`].
    pub const NAMES: [&'static str; 6] = [
        "createOrganization",
        "createProject",
        "updateProject",
        "createTask",
        "updateTask",
        "addTaskComment",
    ];

    /// The GraphQL operation name, e.g. `CreateTask`.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Mutation::CreateOrganization(_) => "CreateOrganization",
            Mutation::CreateProject(_) => "CreateProject",
            Mutation::UpdateProject(_) => "UpdateProject",
            Mutation::CreateTask(_) => "CreateTask",
            Mutation::UpdateTask(_) => "UpdateTask",
            Mutation::AddTaskComment(_) => "AddTaskComment",
        }
    }

    /// The mutation field on the response root, e.g. `createTask`.
    pub fn field(&self) -> &'static str {
        match self {
            Mutation::CreateOrganization(_) => "createOrganization",
            Mutation::CreateProject(_) => "createProject",
            Mutation::UpdateProject(_) => "updateProject",
            Mutation::CreateTask(_) => "createTask",
            Mutation::UpdateTask(_) => "updateTask",
            Mutation::AddTaskComment(_) => "addTaskComment",
        }
    }

    /// The field inside the mutation payload that carries the entity.
    pub fn payload_field(&self) -> &'static str {
        match self {
            Mutation::CreateOrganization(_) => "organization",
            Mutation::CreateProject(_) | Mutation::UpdateProject(_) => "project",
            Mutation::CreateTask(_) | Mutation::UpdateTask(_) => "task",
            Mutation::AddTaskComment(_) => "comment",
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Mutation::CreateOrganization(_) => EntityType::Organization,
            Mutation::CreateProject(_) | Mutation::UpdateProject(_) => EntityType::Project,
            Mutation::CreateTask(_) | Mutation::UpdateTask(_) => EntityType::Task,
            Mutation::AddTaskComment(_) => EntityType::TaskComment,
        }
    }

    pub fn document(&self) -> &'static str {
        match self {
            Mutation::CreateOrganization(_) => CREATE_ORGANIZATION,
            Mutation::CreateProject(_) => CREATE_PROJECT,
            Mutation::UpdateProject(_) => UPDATE_PROJECT,
            Mutation::CreateTask(_) => CREATE_TASK,
            Mutation::UpdateTask(_) => UPDATE_TASK,
            Mutation::AddTaskComment(_) => ADD_TASK_COMMENT,
        }
    }

    pub fn variables(&self) -> Value {
        match self {
            Mutation::CreateOrganization(i) => ser(i),
            Mutation::CreateProject(i) => ser(i),
            Mutation::UpdateProject(i) => ser(i),
            Mutation::CreateTask(i) => ser(i),
            Mutation::UpdateTask(i) => ser(i),
            Mutation::AddTaskComment(i) => ser(i),
        }
    }

    pub fn to_operation(&self) -> Operation {
        Operation::new(self.operation_name(), self.document(), self.variables())
    }

    /// Check required inputs and formats. Collects every problem found.
    pub fn validate(&self) -> Result<(), ErrorList> {
        let mut errors = ErrorList::new();
        match self {
            Mutation::CreateOrganization(i) => {
                check_required(&mut errors, "name", &i.name, ORGANIZATION_NAME_MAX);
                check_email(&mut errors, "contactEmail", &i.contact_email);
            }
            Mutation::CreateProject(i) => {
                check_required(&mut errors, "name", &i.name, PROJECT_NAME_MAX);
                if let Some(due) = &i.due_date {
                    check_date(&mut errors, "dueDate", due);
                }
                if let Some(slug) = &i.organization_slug {
                    if let Err(e) = TenantSlug::new(slug.clone()) {
                        errors.push(e);
                    }
                }
            }
            Mutation::UpdateProject(i) => {
                check_id(&mut errors, "id", &i.id);
                if let Some(name) = &i.name {
                    check_required(&mut errors, "name", name, PROJECT_NAME_MAX);
                }
                if let Some(due) = &i.due_date {
                    check_date(&mut errors, "dueDate", due);
                }
            }
            Mutation::CreateTask(i) => {
                check_id(&mut errors, "projectId", &i.project_id);
                check_required(&mut errors, "title", &i.title, TASK_TITLE_MAX);
                check_optional_email(&mut errors, "assigneeEmail", i.assignee_email.as_deref());
            }
            Mutation::UpdateTask(i) => {
                check_id(&mut errors, "id", &i.id);
                if let Some(title) = &i.title {
                    check_required(&mut errors, "title", title, TASK_TITLE_MAX);
                }
                check_optional_email(&mut errors, "assigneeEmail", i.assignee_email.as_deref());
            }
            Mutation::AddTaskComment(i) => {
                check_id(&mut errors, "taskId", &i.task_id);
                check_required(&mut errors, "content", &i.content, usize::MAX);
                check_email(&mut errors, "authorEmail", &i.author_email);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Build a mutation from a dynamic operation name and JSON variables.
    ///
    /// Accepts either the field name (`createTask`) or the operation name
    /// (`CreateTask`). Unknown names, wrongly typed variables, and status
    /// strings outside the defined set are validation errors.
    pub fn from_variables(name: &str, variables: &Value) -> Result<Self, ErrorList> {
        let empty = Map::new();
        let vars = match variables {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return Err(TrackerError::validation("variables", "must be a JSON object").into())
            }
        };
        let mut r = VarReader::new(vars);

        let mutation = match name {
            "createOrganization" | "CreateOrganization" => {
                Mutation::CreateOrganization(CreateOrganization {
                    name: r.required("name"),
                    contact_email: r.required("contactEmail"),
                })
            }
            "createProject" | "CreateProject" => Mutation::CreateProject(CreateProject {
                name: r.required("name"),
                description: r.optional("description"),
                due_date: r.optional("dueDate"),
                organization_slug: r.optional("organizationSlug"),
            }),
            "updateProject" | "UpdateProject" => Mutation::UpdateProject(UpdateProject {
                id: r.required("id"),
                name: r.optional("name"),
                description: r.optional("description"),
                status: r.optional_parsed("status"),
                due_date: r.optional("dueDate"),
            }),
            "createTask" | "CreateTask" => Mutation::CreateTask(CreateTask {
                project_id: r.required("projectId"),
                title: r.required("title"),
                description: r.optional("description"),
                assignee_email: r.optional("assigneeEmail"),
            }),
            "updateTask" | "UpdateTask" => Mutation::UpdateTask(UpdateTask {
                id: r.required("id"),
                title: r.optional("title"),
                description: r.optional("description"),
                status: r.optional_parsed("status"),
                assignee_email: r.optional("assigneeEmail"),
            }),
            "addTaskComment" | "AddTaskComment" => Mutation::AddTaskComment(AddTaskComment {
                task_id: r.required("taskId"),
                content: r.required("content"),
                author_email: r.required("authorEmail"),
            }),
            other => {
                return Err(TrackerError::validation(
                    "operation",
                    format!("unknown mutation '{other}'"),
                )
                .into())
            }
        };

        r.finish()?;
        Ok(mutation)
    }
}

// ── Documents ────────────────────────────────────────────────────

pub const CREATE_ORGANIZATION: &str = r#"
mutation CreateOrganization($name: String!, $contactEmail: String!) {
  createOrganization(name: $name, contactEmail: $contactEmail) {
    organization {
      __typename
      id
      name
      slug
      contactEmail
      createdAt
    }
  }
}"#;

pub const CREATE_PROJECT: &str = r#"
mutation CreateProject($name: String!, $description: String, $dueDate: Date, $organizationSlug: String) {
  createProject(name: $name, description: $description, dueDate: $dueDate, organizationSlug: $organizationSlug) {
    project {
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
  }
}"#;

pub const UPDATE_PROJECT: &str = r#"
mutation UpdateProject($id: ID!, $name: String, $description: String, $status: String, $dueDate: Date) {
  updateProject(id: $id, name: $name, description: $description, status: $status, dueDate: $dueDate) {
    project {
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
  }
}"#;

pub const CREATE_TASK: &str = r#"
mutation CreateTask($projectId: ID!, $title: String!, $description: String, $assigneeEmail: String) {
  createTask(projectId: $projectId, title: $title, description: $description, assigneeEmail: $assigneeEmail) {
    task {
      __typename
      id
      title
      status
      description
      assigneeEmail
      createdAt
      project {
        __typename
        id
        name
      }
    }
  }
}"#;

pub const UPDATE_TASK: &str = r#"
mutation UpdateTask($id: ID!, $title: String, $description: String, $status: String, $assigneeEmail: String) {
  updateTask(id: $id, title: $title, description: $description, status: $status, assigneeEmail: $assigneeEmail) {
    task {
      __typename
      id
      title
      status
      description
      assigneeEmail
      createdAt
      project {
        __typename
        id
        name
      }
    }
  }
}"#;

pub const ADD_TASK_COMMENT: &str = r#"
mutation AddTaskComment($taskId: ID!, $content: String!, $authorEmail: String!) {
  addTaskComment(taskId: $taskId, content: $content, authorEmail: $authorEmail) {
    comment {
      __typename
      id
      content
      authorEmail
      timestamp
      task {
        __typename
        id
        title
      }
    }
  }
}"#;

// ── Helpers ──────────────────────────────────────────────────────

/// Reads typed values out of a variables map, collecting every problem.
struct VarReader<'a> {
    vars: &'a Map<String, Value>,
    errors: ErrorList,
}

impl<'a> VarReader<'a> {
    fn new(vars: &'a Map<String, Value>) -> Self {
        Self {
            vars,
            errors: ErrorList::new(),
        }
    }

    fn required(&mut self, key: &str) -> String {
        match self.vars.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => {
                self.errors
                    .push(TrackerError::validation(key, "is required"));
                String::new()
            }
            Some(_) => {
                self.errors
                    .push(TrackerError::validation(key, "must be a string"));
                String::new()
            }
        }
    }

    fn optional(&mut self, key: &str) -> Option<String> {
        match self.vars.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(_) => {
                self.errors
                    .push(TrackerError::validation(key, "must be a string"));
                None
            }
        }
    }

    fn optional_parsed<T>(&mut self, key: &str) -> Option<T>
    where
        T: std::str::FromStr<Err = TrackerError>,
    {
        let raw = self.optional(key)?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn finish(self) -> Result<(), ErrorList> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

fn check_required(errors: &mut ErrorList, field: &str, value: &str, max_len: usize) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(TrackerError::validation(field, "is required"));
    } else if trimmed.chars().count() > max_len {
        errors.push(TrackerError::validation(
            field,
            format!("must be at most {max_len} characters"),
        ));
    }
}

fn check_id(errors: &mut ErrorList, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(TrackerError::validation(field, "is required"));
    }
}

fn check_email(errors: &mut ErrorList, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(TrackerError::validation(field, "is required"));
    } else if !looks_like_email(value) {
        errors.push(TrackerError::validation(
            field,
            format!("'{value}' is not a valid e-mail address"),
        ));
    }
}

/// The server stores an unset assignee as an empty string, so empty is allowed.
fn check_optional_email(errors: &mut ErrorList, field: &str, value: Option<&str>) {
    if let Some(v) = value {
        if !v.is_empty() && !looks_like_email(v) {
            errors.push(TrackerError::validation(
                field,
                format!("'{v}' is not a valid e-mail address"),
            ));
        }
    }
}

fn check_date(errors: &mut ErrorList, field: &str, value: &str) {
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        errors.push(TrackerError::validation(
            field,
            format!("'{value}' is not a YYYY-MM-DD date"),
        ));
    }
}

fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn ser<T: Serialize>(val: &T) -> Value {
    serde_json::to_value(val).unwrap_or_default()
}
