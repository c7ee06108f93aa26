use tracing::info;
use uuid::Uuid;

use super::Backend;
use crate::api::NewInstance;
use crate::error::{Error, Result, ValidationError};
use crate::model::{App, Instance, Project};

const DEFAULT_INSTANCE_PREFIX: &str = "brainlife";

/// `<app tags joined by '.'>.<random suffix>`, falling back to a generic
/// prefix for untagged apps.
pub fn instance_name(app: &App) -> String {
    let tags: Vec<&str> = app
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    let prefix = if tags.is_empty() {
        DEFAULT_INSTANCE_PREFIX.to_string()
    } else {
        tags.join(".")
    };
    format!("{prefix}.{}", Uuid::new_v4().simple())
}

/// Reuse the caller's instance when given one, otherwise create a fresh
/// instance in the project's group.
pub fn select_instance<B: Backend + ?Sized>(
    backend: &B,
    app: &App,
    project: &Project,
    instance_id: Option<&str>,
) -> Result<Instance> {
    if let Some(id) = instance_id {
        let instance = backend
            .fetch_instance(id)?
            .ok_or_else(|| Error::not_found("instance", id))?;
        if instance.is_removing() {
            return Err(ValidationError::InstanceRemoving { id: id.to_string() }.into());
        }
        info!(instance = %instance.id, "reusing instance");
        return Ok(instance);
    }

    let new = NewInstance::for_group(
        instance_name(app),
        Some(format!("{} run", app.name.trim())),
        project.group,
    );
    backend.create_instance(&new)
}
