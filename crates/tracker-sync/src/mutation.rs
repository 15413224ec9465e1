//! Writes: validate, send once, merge the result, invalidate dependents.

use serde_json::json;

use tracker_cache::normalize::ref_key;
use tracker_cache::{normalize, EntityCache, RootKey};
use tracker_core::{AnyEntity, EntityKey, EntityType, ErrorList, TrackerError};
use tracker_graph::Mutation;

use crate::{fetch, SyncInner};

type SuccessHook = Box<dyn FnOnce(&AnyEntity) + Send>;
type FailureHook = Box<dyn FnOnce(&ErrorList) + Send>;

/// Callbacks for one mutation. Consumed on completion, so each fires at
/// most once and never both.
#[derive(Default)]
pub struct MutationHooks {
    on_success: Option<SuccessHook>,
    on_failure: Option<FailureHook>,
}

impl MutationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, hook: impl FnOnce(&AnyEntity) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn on_failure(mut self, hook: impl FnOnce(&ErrorList) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(hook));
        self
    }

    fn succeed(self, entity: &AnyEntity) {
        if let Some(hook) = self.on_success {
            hook(entity);
        }
    }

    pub(crate) fn fail(self, errors: &ErrorList) {
        if let Some(hook) = self.on_failure {
            hook(errors);
        }
    }
}

pub(crate) async fn run(
    inner: &SyncInner,
    mutation: Mutation,
    hooks: MutationHooks,
) -> Result<AnyEntity, ErrorList> {
    match execute(inner, mutation).await {
        Ok(entity) => {
            hooks.succeed(&entity);
            Ok(entity)
        }
        Err(errors) => {
            hooks.fail(&errors);
            Err(errors)
        }
    }
}

async fn execute(inner: &SyncInner, mut mutation: Mutation) -> Result<AnyEntity, ErrorList> {
    mutation.validate()?;

    if let Mutation::CreateProject(input) = &mut mutation {
        if input.organization_slug.is_none() {
            input.organization_slug = Some(inner.graph.tenant().resolve_tenant().to_string());
        }
    }

    let operation = mutation.to_operation();
    let payload = inner.graph.execute(&operation).await?;

    let value = payload
        .field(mutation.field())
        .and_then(|root| root.get(mutation.payload_field()))
        .filter(|v| !v.is_null())
        .cloned();
    let Some(value) = value else {
        if payload.is_partial() {
            return Err(payload.errors);
        }
        return Err(TrackerError::application(format!(
            "{} returned no {}",
            mutation.field(),
            mutation.payload_field()
        ))
        .into());
    };
    if payload.is_partial() {
        tracing::warn!(
            operation = mutation.operation_name(),
            errors = %payload.errors,
            "Partial success: applying returned data"
        );
    }

    let normalized = normalize(value.clone());
    let key = ref_key(&normalized.value)
        .filter(|k| k.entity_type == mutation.entity_type())
        .ok_or_else(|| {
            TrackerError::MalformedResponse(format!(
                "{} did not return an identifiable {}",
                mutation.field(),
                mutation.entity_type()
            ))
        })?;
    let decode = |value| {
        AnyEntity::from_value(key.entity_type, value)
            .map_err(|e| TrackerError::MalformedResponse(format!("{}: {e}", mutation.field())))
    };

    let mut cache = inner.cache.lock().unwrap_or_else(|e| e.into_inner());
    let current = inner.graph.tenant().epoch();
    if payload.scope.epoch != current {
        tracing::warn!(
            operation = mutation.operation_name(),
            entity = %key,
            "Tenant changed during mutation; result not cached"
        );
        return decode(value).map_err(ErrorList::from);
    }
    cache.ensure_epoch(current);
    cache.put(normalized.records);

    let parent = link_parent(&mut cache, &mutation, &key);
    let stale = dependents(&mutation, parent.as_ref());
    fetch::detach(inner, &stale);
    cache.mark_stale(&stale);

    // Read back the canonical merged record.
    let merged = cache.resolve(&key, &[]).map(|r| r.value).unwrap_or(value);
    drop(cache);
    let entity = decode(merged)?;

    tracing::info!(
        operation = mutation.operation_name(),
        entity = %key,
        stale_roots = stale.len(),
        "Mutation applied"
    );
    Ok(entity)
}

/// Append new children to their parent's relation list. Returns the
/// parent's key when there is one.
fn link_parent(cache: &mut EntityCache, mutation: &Mutation, key: &EntityKey) -> Option<EntityKey> {
    match mutation {
        Mutation::CreateTask(input) => {
            let parent = EntityKey::new(EntityType::Project, input.project_id.clone());
            cache.append_ref(&parent, "tasks", key);
            Some(parent)
        }
        Mutation::UpdateTask(_) => cache
            .get(key)
            .and_then(|record| record.get("project"))
            .and_then(ref_key),
        Mutation::AddTaskComment(input) => {
            let parent = EntityKey::new(EntityType::Task, input.task_id.clone());
            cache.append_ref(&parent, "comments", key);
            Some(parent)
        }
        _ => None,
    }
}

/// Roots whose server-derived contents a mutation invalidates.
fn dependents(mutation: &Mutation, parent: Option<&EntityKey>) -> Vec<RootKey> {
    let project_root = |parent: Option<&EntityKey>| {
        parent
            .filter(|p| p.entity_type == EntityType::Project)
            .map(|p| RootKey::new("project", &json!({ "id": p.id })))
    };

    match mutation {
        Mutation::CreateOrganization(_) => vec![RootKey::bare("organizations")],
        Mutation::CreateProject(_) => {
            vec![RootKey::bare("projects"), RootKey::bare("projectStats")]
        }
        Mutation::UpdateProject(_) => vec![RootKey::bare("projectStats")],
        Mutation::CreateTask(_) | Mutation::UpdateTask(_) => {
            let mut roots = vec![RootKey::bare("projects"), RootKey::bare("projectStats")];
            roots.extend(project_root(parent));
            roots
        }
        Mutation::AddTaskComment(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracker_graph::mutations::{CreateTask, UpdateProject};

    #[test]
    fn hooks_fire_at_most_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (s, f) = (calls.clone(), calls.clone());
        let hooks = MutationHooks::new()
            .on_success(move |_| s.lock().unwrap().push("success"))
            .on_failure(move |_| f.lock().unwrap().push("failure"));

        hooks.fail(&ErrorList::single(TrackerError::application("Access denied")));
        assert_eq!(*calls.lock().unwrap(), vec!["failure"]);
    }

    #[test]
    fn task_writes_invalidate_parent_and_aggregates() {
        let mutation = Mutation::CreateTask(CreateTask {
            project_id: "p1".into(),
            title: "Write spec".into(),
            ..Default::default()
        });
        let parent = EntityKey::new(EntityType::Project, "p1");
        let roots: Vec<String> = dependents(&mutation, Some(&parent))
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(roots, vec!["projects", "projectStats", r#"project({"id":"p1"})"#]);
    }

    #[test]
    fn project_updates_only_invalidate_stats() {
        let mutation = Mutation::UpdateProject(UpdateProject {
            id: "p1".into(),
            ..Default::default()
        });
        assert_eq!(dependents(&mutation, None), vec![RootKey::bare("projectStats")]);
    }
}
