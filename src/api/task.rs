use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::find::{is_id, regex, Find};
use super::{take_list, ApiClient};
use crate::config::Service;
use crate::error::Result;
use crate::model::{Instance, Task};

#[derive(Debug, Clone, Default)]
pub struct InstanceQuery {
    pub id: Option<String>,
    pub name: Option<String>,
    pub group: Option<i64>,
    pub search: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl InstanceQuery {
    pub fn to_find(&self) -> Find {
        let mut find = Find::new().sort("id").page(self.skip, self.limit);
        if let Some(search) = &self.search {
            if is_id(search) {
                find.set("_id", search.as_str());
            } else {
                find.set("name", search.as_str());
            }
        } else {
            if let Some(id) = &self.id {
                find.set("_id", id.as_str());
            }
            if let Some(name) = &self.name {
                find.set("name", regex(name));
            }
        }
        if let Some(group) = self.group {
            find.set("group_id", group);
        }
        find
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewInstance {
    pub name: String,
    #[serde(rename = "desc")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
}

impl NewInstance {
    /// An instance visible from the project's group on the web UI.
    pub fn for_group(name: impl Into<String>, description: Option<String>, group: i64) -> Self {
        NewInstance {
            name: name.into(),
            description,
            config: Some(json!({"brainlife": true})),
            group_id: Some(group),
        }
    }
}

impl ApiClient {
    pub fn query_instances(&self, query: &InstanceQuery) -> Result<Vec<Instance>> {
        let envelope: Option<Value> =
            self.get_json_opt(Service::Amaretti, "/instance", &query.to_find().to_params())?;
        match envelope {
            Some(envelope) => take_list(envelope, "instances"),
            None => Ok(Vec::new()),
        }
    }

    pub fn fetch_instance(&self, id: &str) -> Result<Option<Instance>> {
        let query = InstanceQuery {
            id: Some(id.to_string()),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.query_instances(&query)?.into_iter().next())
    }

    pub fn create_instance(&self, instance: &NewInstance) -> Result<Instance> {
        let created: Instance = self.send_json(Method::POST, Service::Amaretti, "/instance", instance)?;
        info!(instance = %created.id, name = %instance.name, "created instance");
        Ok(created)
    }

    /// Tasks matching `find`; the wait loops use `{"_id": id}`.
    pub fn query_tasks(&self, find: &Find) -> Result<Vec<Task>> {
        let envelope: Value = self.get_json(Service::Amaretti, "/task", &find.to_params())?;
        take_list(envelope, "tasks")
    }

    pub fn fetch_task(&self, id: &str) -> Result<Vec<Task>> {
        self.query_tasks(&Find::new().with("_id", id))
    }

    /// Submit a task document as-is. `body` needs at least `instance_id`,
    /// `name`, `service` and `config`.
    pub fn submit_task<B: Serialize + ?Sized>(&self, body: &B) -> Result<Task> {
        let mut envelope: Value = self.send_json(Method::POST, Service::Amaretti, "/task", body)?;
        let task: Task = match envelope.get_mut("task").map(Value::take) {
            Some(task) => serde_json::from_value(task)?,
            None => serde_json::from_value(envelope)?,
        };
        info!(task = %task.id, name = %task.name, "submitted task");
        Ok(task)
    }

    /// Run `service` under `instance` with a plain config.
    pub fn run_task(&self, instance: &str, name: &str, service: &str, config: Value) -> Result<Task> {
        self.submit_task(&json!({
            "instance_id": instance,
            "name": name,
            "service": service,
            "config": config,
        }))
    }

    /// Product documents (`product.errors` etc.) of a finished task.
    pub fn task_products(&self, id: &str) -> Result<Vec<Value>> {
        self.get_json(Service::Amaretti, "/task/product", &[("ids", id.to_string())])
    }

    /// Ask the warehouse to stage datasets into a new task under
    /// `instance`. The returned task's `_outputs` lists one entry per
    /// staged dataset.
    pub fn stage_datasets(&self, instance: &str, dataset_ids: &[String]) -> Result<Task> {
        let mut envelope: Value = self.send_json(
            Method::POST,
            Service::Warehouse,
            "/dataset/stage",
            &json!({"instance_id": instance, "dataset_ids": dataset_ids}),
        )?;
        let task: Task = serde_json::from_value(envelope.get_mut("task").map(Value::take).unwrap_or_default())?;
        info!(task = %task.id, datasets = dataset_ids.len(), "staging datasets");
        Ok(task)
    }

    /// Upload a gzipped tarball into `task`'s working directory at `path`,
    /// unpacking it there.
    pub fn upload_to_task(&self, task: &str, path: &str, body: Vec<u8>) -> Result<Value> {
        let res = self
            .upload_request(Service::Amaretti, &format!("/task/upload/{task}"))?
            .query(&[("p", path), ("untar", "true")])
            .body(body)
            .send()?;
        super::parse(res)
    }
}
