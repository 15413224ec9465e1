//! Mutation layer behaviour against a scripted server.

mod common;

use std::sync::{Arc, Mutex};

use serde_json::json;

use common::*;
use tracker_core::{
    AnyEntity, ErrorKind, Project, ProjectStatus, Task, TaskStatus, TrackerError,
};
use tracker_graph::mutations::{
    AddTaskComment, CreateProject, CreateTask, UpdateProject, UpdateTask,
};
use tracker_graph::Mutation;
use tracker_sync::{MutationHooks, ProjectById, ProjectStatsQuery, QueryState, TaskById};

/// Records which hooks fired, in order.
fn recording_hooks() -> (MutationHooks, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (s, f) = (log.clone(), log.clone());
    let hooks = MutationHooks::new()
        .on_success(move |entity| s.lock().unwrap().push(format!("success:{}", entity.id())))
        .on_failure(move |errors| f.lock().unwrap().push(format!("failure:{errors}")));
    (hooks, log)
}

fn created_task(id: &str, title: &str, project_id: &str) -> serde_json::Value {
    let mut value = task(id, title, "TODO");
    value["project"] = json!({"__typename": "ProjectType", "id": project_id, "name": "Launch"});
    value
}

fn create_task(project_id: &str, title: &str) -> Mutation {
    Mutation::CreateTask(CreateTask {
        project_id: project_id.into(),
        title: title.into(),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_created_task_is_readable_when_on_success_fires() {
    let server = ScriptedServer::new();
    server.reply(
        "CreateTask",
        json!({"createTask": {"task": created_task("t1", "Write spec", "p1")}}),
    );
    let client = client(&server);

    let seen: Arc<Mutex<Option<Task>>> = Arc::new(Mutex::new(None));
    let (slot, reader) = (seen.clone(), client.clone());
    let hooks = MutationHooks::new().on_success(move |_| {
        *slot.lock().unwrap() = reader.get::<Task>("t1");
    });

    let entity = client.mutate(create_task("p1", "Write spec"), hooks).await.unwrap();
    assert_eq!(entity.id(), "t1");

    let task = seen.lock().unwrap().clone().expect("task cached before on_success");
    assert_eq!(task.title, "Write spec");
    assert_eq!(task.status, TaskStatus::Todo);
    assert!(!task.created_at.is_empty());

    assert_eq!(
        server.calls()[0].variables,
        json!({"projectId": "p1", "title": "Write spec"})
    );
}

#[tokio::test]
async fn test_project_updates_keep_omitted_fields() {
    let server = ScriptedServer::new();
    let mut launch = project_with_tasks("p1", "Launch", vec![]);
    launch["description"] = json!("Ship it");
    server.reply("GetProject", json!({"project": launch}));
    server.reply(
        "UpdateProject",
        json!({"updateProject": {"project": {"__typename": "ProjectType", "id": "p1", "status": "ON_HOLD"}}}),
    );
    server.reply(
        "UpdateProject",
        json!({"updateProject": {"project": {"__typename": "ProjectType", "id": "p1", "name": "Launch v2"}}}),
    );
    let client = client(&server);
    client.fetch(ProjectById("p1".into())).await;

    client
        .mutate(
            Mutation::UpdateProject(UpdateProject {
                id: "p1".into(),
                status: Some(ProjectStatus::OnHold),
                ..Default::default()
            }),
            MutationHooks::new(),
        )
        .await
        .unwrap();
    let entity = client
        .mutate(
            Mutation::UpdateProject(UpdateProject {
                id: "p1".into(),
                name: Some("Launch v2".into()),
                ..Default::default()
            }),
            MutationHooks::new(),
        )
        .await
        .unwrap();

    // The returned entity is the merged record, not the sparse payload.
    let AnyEntity::Project(returned) = entity else {
        panic!("expected a project");
    };
    assert_eq!(returned.status, ProjectStatus::OnHold);

    let cached = client.get::<Project>("p1").unwrap();
    assert_eq!(cached.name, "Launch v2");
    assert_eq!(cached.status, ProjectStatus::OnHold);
    assert_eq!(cached.description, "Ship it");
    assert_eq!(cached, returned);
}

#[tokio::test]
async fn test_create_project_uses_server_defaults_and_resolved_tenant() {
    let server = ScriptedServer::new();
    server.reply(
        "CreateProject",
        json!({"createProject": {"project": project("p7", "Launch", 0, 0)}}),
    );
    let client = client(&server);

    client
        .mutate(
            Mutation::CreateProject(CreateProject {
                name: "Launch".into(),
                description: Some(String::new()),
                due_date: None,
                organization_slug: None,
            }),
            MutationHooks::new(),
        )
        .await
        .unwrap();

    let cached = client.get::<Project>("p7").unwrap();
    assert_eq!(cached.status, ProjectStatus::Active);
    assert_eq!(cached.task_count, Some(0));
    assert_eq!(
        server.calls()[0].variables,
        json!({"name": "Launch", "description": "", "organizationSlug": "demo-org"})
    );
}

#[tokio::test]
async fn test_update_task_changes_only_status() {
    let server = ScriptedServer::new();
    server.reply(
        "CreateTask",
        json!({"createTask": {"task": created_task("t1", "Write spec", "p1")}}),
    );
    server.reply(
        "UpdateTask",
        json!({"updateTask": {"task": {"__typename": "TaskType", "id": "t1", "status": "DONE"}}}),
    );
    let client = client(&server);

    client.mutate(create_task("p1", "Write spec"), MutationHooks::new()).await.unwrap();
    let before = client.get::<Task>("t1").unwrap();

    client
        .mutate(
            Mutation::UpdateTask(UpdateTask {
                id: "t1".into(),
                status: Some(TaskStatus::Done),
                ..Default::default()
            }),
            MutationHooks::new(),
        )
        .await
        .unwrap();

    let after = client.get::<Task>("t1").unwrap();
    assert_eq!(after.status, TaskStatus::Done);
    assert_eq!(after.title, before.title);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.assignee_email, before.assignee_email);
}

#[tokio::test]
async fn test_comments_append_in_arrival_order() {
    let server = ScriptedServer::new();
    server.reply("GetTask", json!({"task": task_detail("t1", "Write spec", "p1", vec![])}));
    for (id, content) in [("c1", "first"), ("c2", "second")] {
        let mut c = comment(id, content);
        c["task"] = json!({"__typename": "TaskType", "id": "t1", "title": "Write spec"});
        server.reply("AddTaskComment", json!({"addTaskComment": {"comment": c}}));
    }
    let client = client(&server);

    let mut view = client.watch(TaskById("t1".into()));
    view.settled().await;

    for content in ["first", "second"] {
        client
            .mutate(
                Mutation::AddTaskComment(AddTaskComment {
                    task_id: "t1".into(),
                    content: content.into(),
                    author_email: "ana@example.com".into(),
                }),
                MutationHooks::new(),
            )
            .await
            .unwrap();
    }

    let state = view.settled().await;
    let ids: Vec<&str> = state
        .data()
        .unwrap()
        .comments
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(ids, vec!["c1", "c2"]);
    assert_eq!(server.count("GetTask"), 1);
}

#[tokio::test]
async fn test_task_write_marks_parent_stale_until_refetched() {
    let server = ScriptedServer::new();
    server.reply("GetProject", json!({"project": project_with_tasks("p1", "Launch", vec![])}));
    server.reply("GetProjectStats", json!({"projectStats": stats(1, 0, 0)}));
    server.reply(
        "CreateTask",
        json!({"createTask": {"task": created_task("t1", "Write spec", "p1")}}),
    );
    server.reply(
        "GetProject",
        json!({"project": project_with_tasks("p1", "Launch", vec![task("t1", "Write spec", "TODO")])}),
    );
    server.reply("GetProjectStats", json!({"projectStats": stats(1, 1, 0)}));
    let client = client(&server);

    let mut project_view = client.watch(ProjectById("p1".into()));
    project_view.settled().await;
    let mut stats_view = client.watch(ProjectStatsQuery);
    stats_view.settled().await;

    client.mutate(create_task("p1", "Write spec"), MutationHooks::new()).await.unwrap();

    // The new task is linked at once, but aggregates are not recomputed
    // locally: the view says so until the refetch lands.
    match project_view.changed().await {
        QueryState::Loaded { data, stale, .. } => {
            assert!(stale);
            assert_eq!(data.tasks.len(), 1);
            assert_eq!(data.project.task_count, Some(0));
        }
        other => panic!("expected stale data, got {other:?}"),
    }

    match project_view.settled().await {
        QueryState::Loaded { data, stale, .. } => {
            assert!(!stale);
            assert_eq!(data.project.task_count, Some(1));
        }
        other => panic!("expected fresh data, got {other:?}"),
    }
    assert_eq!(stats_view.settled().await.data().unwrap().total_tasks, Some(1));
    assert_eq!(server.count("GetProject"), 2);
    assert_eq!(server.count("GetProjectStats"), 2);
}

#[tokio::test]
async fn test_write_during_refetch_does_not_join_older_request() {
    let server = ScriptedServer::new();
    server.reply("GetProject", json!({"project": project_with_tasks("p1", "Launch", vec![])}));
    // Issued before the write; never released.
    server.gated("GetProject", json!({"project": project_with_tasks("p1", "Launch", vec![])}));
    server.reply(
        "CreateTask",
        json!({"createTask": {"task": created_task("t1", "Write spec", "p1")}}),
    );
    server.reply(
        "GetProject",
        json!({"project": project_with_tasks("p1", "Launch", vec![task("t1", "Write spec", "TODO")])}),
    );
    let client = client(&server);

    let mut view = client.watch(ProjectById("p1".into()));
    view.settled().await;
    view.refetch();
    assert!(view.is_fetching());
    while server.count("GetProject") < 2 {
        tokio::task::yield_now().await;
    }

    client.mutate(create_task("p1", "Write spec"), MutationHooks::new()).await.unwrap();

    match view.settled().await {
        QueryState::Loaded { data, stale, .. } => {
            assert!(!stale);
            assert_eq!(data.project.task_count, Some(1));
            assert_eq!(data.tasks.len(), 1);
        }
        other => panic!("expected fresh data, got {other:?}"),
    }
    assert!(!view.is_fetching());
    assert_eq!(server.count("GetProject"), 3);
}

#[tokio::test]
async fn test_validation_failure_never_reaches_transport() {
    let server = ScriptedServer::new();
    let client = client(&server);
    let (hooks, log) = recording_hooks();

    let errors = client.mutate(create_task("p1", "   "), hooks).await.unwrap_err();
    assert!(errors.has_kind(ErrorKind::Validation));
    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(log.lock().unwrap()[0].starts_with("failure:"));
    assert!(server.calls().is_empty());
}

#[tokio::test]
async fn test_server_errors_are_surfaced_verbatim() {
    let server = ScriptedServer::new();
    server.on("UpdateTask", Step::Reply(Ok(errors_only(&["Task not found"]))));
    let client = client(&server);
    let (hooks, log) = recording_hooks();

    let errors = client
        .mutate(
            Mutation::UpdateTask(UpdateTask {
                id: "t404".into(),
                status: Some(TaskStatus::Done),
                ..Default::default()
            }),
            hooks,
        )
        .await
        .unwrap_err();

    assert_eq!(errors.to_string(), "Task not found");
    assert_eq!(*log.lock().unwrap(), vec!["failure:Task not found".to_string()]);
    assert!(client.get::<Task>("t404").is_none());
    assert_eq!(server.count("UpdateTask"), 1);
}

#[tokio::test]
async fn test_transport_failure_runs_failure_hook_once() {
    let server = ScriptedServer::new();
    server.on(
        "CreateTask",
        Step::Reply(Err(TrackerError::Unreachable("connection refused".into()))),
    );
    let client = client(&server);
    let (hooks, log) = recording_hooks();

    let errors = client.mutate(create_task("p1", "Write spec"), hooks).await.unwrap_err();
    assert!(errors.is_network());
    assert_eq!(log.lock().unwrap().len(), 1);
    // Exactly one attempt, no retry.
    assert_eq!(server.count("CreateTask"), 1);
}

#[tokio::test]
async fn test_tenant_change_during_mutation_skips_cache() {
    let server = ScriptedServer::new();
    let gate = server.gated(
        "CreateProject",
        json!({"createProject": {"project": project("p7", "Launch", 0, 0)}}),
    );
    let client = client(&server);

    let switcher = async {
        while server.count("CreateProject") == 0 {
            tokio::task::yield_now().await;
        }
        client.switch_tenant("acme").unwrap();
        gate.notify_one();
    };
    let mutation = client.mutate(
        Mutation::CreateProject(CreateProject {
            name: "Launch".into(),
            ..Default::default()
        }),
        MutationHooks::new(),
    );
    let (result, ()) = tokio::join!(mutation, switcher);

    assert_eq!(result.unwrap().id(), "p7");
    assert!(client.get::<Project>("p7").is_none());
    assert_eq!(server.calls()[0].tenant, "demo-org");
}

#[tokio::test]
async fn test_named_mutations_validate_variables() {
    let server = ScriptedServer::new();
    let mut c = comment("c1", "hello");
    c["task"] = json!({"__typename": "TaskType", "id": "t1", "title": "Write spec"});
    server.reply("AddTaskComment", json!({"addTaskComment": {"comment": c}}));
    let client = client(&server);

    let entity = client
        .mutate_named(
            "addTaskComment",
            &json!({"taskId": "t1", "content": "hello", "authorEmail": "ana@example.com"}),
            MutationHooks::new(),
        )
        .await
        .unwrap();
    assert!(matches!(entity, AnyEntity::TaskComment(ref c) if c.content == "hello"));

    let (hooks, log) = recording_hooks();
    let errors = client
        .mutate_named("updateTask", &json!({"id": "t1", "status": "FINISHED"}), hooks)
        .await
        .unwrap_err();
    assert!(errors.has_kind(ErrorKind::Validation));
    assert_eq!(log.lock().unwrap().len(), 1);
    assert_eq!(server.calls().len(), 1);
}
