//! Shared fixtures: an in-process server scripted per operation name.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;
use uuid::Uuid;

use tracker_core::{TenantSlug, TrackerError};
use tracker_graph::queries::Operation;
use tracker_graph::transport::ErrorEntry;
use tracker_graph::{GraphResponse, Transport};
use tracker_sync::SyncClient;

pub enum Step {
    Reply(Result<GraphResponse, TrackerError>),
    /// Reply once the gate is opened.
    Gated(Arc<Notify>, Result<GraphResponse, TrackerError>),
    Hang,
}

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub tenant: String,
    pub operation: &'static str,
    pub variables: Value,
}

#[derive(Default)]
pub struct ScriptedServer {
    routes: Mutex<HashMap<&'static str, VecDeque<Step>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, operation: &'static str, step: Step) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(step);
        self
    }

    pub fn reply(&self, operation: &'static str, data: Value) -> &Self {
        self.on(operation, Step::Reply(Ok(ok(data))))
    }

    /// Reply with `data`, held back until the returned gate is opened.
    pub fn gated(&self, operation: &'static str, data: Value) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.on(operation, Step::Gated(gate.clone(), Ok(ok(data))));
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| c.operation == operation).count()
    }
}

#[async_trait]
impl Transport for ScriptedServer {
    async fn send(
        &self,
        tenant: &TenantSlug,
        _request_id: Uuid,
        operation: &Operation,
    ) -> Result<GraphResponse, TrackerError> {
        self.calls.lock().unwrap().push(Call {
            tenant: tenant.to_string(),
            operation: operation.operation_name,
            variables: operation.variables.clone(),
        });
        let step = self
            .routes
            .lock()
            .unwrap()
            .get_mut(operation.operation_name)
            .and_then(VecDeque::pop_front);
        match step {
            Some(Step::Reply(r)) => r,
            Some(Step::Gated(gate, r)) => {
                gate.notified().await;
                r
            }
            Some(Step::Hang) => std::future::pending().await,
            None => Err(TrackerError::Unreachable(format!(
                "no scripted reply for {}",
                operation.operation_name
            ))),
        }
    }
}

pub fn client(server: &Arc<ScriptedServer>) -> SyncClient {
    SyncClient::with_transport(server.clone(), Duration::from_secs(2))
}

pub fn client_with_timeout(server: &Arc<ScriptedServer>, timeout: Duration) -> SyncClient {
    SyncClient::with_transport(server.clone(), timeout)
}

// ── Responses ────────────────────────────────────────────────────

pub fn ok(data: Value) -> GraphResponse {
    GraphResponse {
        data: Some(data),
        errors: Vec::new(),
    }
}

pub fn with_errors(data: Value, messages: &[&str]) -> GraphResponse {
    GraphResponse {
        data: Some(data),
        errors: messages
            .iter()
            .map(|m| ErrorEntry {
                message: m.to_string(),
                ..Default::default()
            })
            .collect(),
    }
}

pub fn errors_only(messages: &[&str]) -> GraphResponse {
    GraphResponse {
        data: None,
        ..with_errors(Value::Null, messages)
    }
}

// ── Entities ─────────────────────────────────────────────────────

pub fn project(id: &str, name: &str, task_count: u32, completed: u32) -> Value {
    let rate = if task_count > 0 {
        100.0 * completed as f64 / task_count as f64
    } else {
        0.0
    };
    json!({
        "__typename": "ProjectType",
        "id": id,
        "name": name,
        "status": "ACTIVE",
        "description": "",
        "dueDate": null,
        "taskCount": task_count,
        "completedTaskCount": completed,
        "completionRate": rate,
        "createdAt": "2024-05-01T09:00:00+00:00"
    })
}

pub fn project_with_tasks(id: &str, name: &str, tasks: Vec<Value>) -> Value {
    let done = tasks.iter().filter(|t| t["status"] == "DONE").count() as u32;
    let mut value = project(id, name, tasks.len() as u32, done);
    value["tasks"] = Value::Array(tasks);
    value
}

pub fn task(id: &str, title: &str, status: &str) -> Value {
    json!({
        "__typename": "TaskType",
        "id": id,
        "title": title,
        "status": status,
        "description": "",
        "assigneeEmail": "",
        "dueDate": null,
        "createdAt": "2024-05-01T10:00:00+00:00"
    })
}

pub fn task_detail(id: &str, title: &str, project_id: &str, comments: Vec<Value>) -> Value {
    let mut value = task(id, title, "TODO");
    value["project"] = json!({"__typename": "ProjectType", "id": project_id, "name": "Launch"});
    value["comments"] = Value::Array(comments);
    value
}

pub fn comment(id: &str, content: &str) -> Value {
    json!({
        "__typename": "TaskCommentType",
        "id": id,
        "content": content,
        "authorEmail": "ana@example.com",
        "timestamp": "2024-05-02T08:00:00+00:00"
    })
}

pub fn organization(id: &str, slug: &str) -> Value {
    json!({
        "__typename": "OrganizationType",
        "id": id,
        "name": slug.to_uppercase(),
        "slug": slug,
        "contactEmail": format!("admin@{slug}.test"),
        "createdAt": "2024-01-01T00:00:00+00:00"
    })
}

pub fn stats(total_projects: u32, total_tasks: u32, completed_tasks: u32) -> Value {
    let rate = if total_tasks > 0 {
        100.0 * completed_tasks as f64 / total_tasks as f64
    } else {
        0.0
    };
    json!({
        "totalProjects": total_projects,
        "activeProjects": total_projects,
        "completedProjects": 0,
        "totalTasks": total_tasks,
        "completedTasks": completed_tasks,
        "overallCompletionRate": rate
    })
}
