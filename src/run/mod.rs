// App-run orchestration
// ---------------------
// Running an app means: resolve and validate the user's input bindings,
// pick an instance, stage the input datasets into a helper task, build
// the new task's config and output descriptors from the staged copies,
// and submit. Every step before staging is pure validation, so a bad
// input never creates anything remotely. Nothing is rolled back when a
// later step fails.
//
// Remote access goes through `Backend`, which `ApiClient` implements.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::api::{ApiClient, DatasetQuery, DatatypeQuery, NewInstance};
use crate::error::{Error, Result};
use crate::model::{App, DataType, Dataset, Instance, Project, Resource, Task};

mod config;
mod inputs;
mod instance;
mod outputs;
mod staging;


pub use config::{materialize, staged_path};
pub use inputs::{check_missing, check_tags, resolve, unique_dataset_ids, InputBinding, ResolvedInputs};
pub use instance::{instance_name, select_instance};
pub use outputs::{compile_metadata, output_specs, staged_metadata, Archive, OutputSpec, META_KEYS};
pub use staging::{stage_inputs, StagedInput};

/// Group whose resources are shared with every project that allows it.
pub const PUBLIC_RESOURCES_GID: i64 = 1;

/// The remote operations an app run needs.
pub trait Backend {
    fn fetch_project(&self, id: &str) -> Result<Option<Project>>;
    fn fetch_app(&self, id: &str) -> Result<App>;
    /// The branch to run, checked to exist in the app's repository.
    fn validate_branch(&self, repo: &str, branch: Option<&str>) -> Result<String>;
    fn datatypes(&self, ids: &[String]) -> Result<Vec<DataType>>;
    fn datasets(&self, ids: &[String]) -> Result<Vec<Dataset>>;
    fn fetch_instance(&self, id: &str) -> Result<Option<Instance>>;
    fn create_instance(&self, instance: &NewInstance) -> Result<Instance>;
    fn stage_datasets(&self, instance_id: &str, dataset_ids: &[String]) -> Result<Task>;
    fn find_resource(&self, reference: &str) -> Result<Resource>;
    fn submit(&self, submission: &Submission) -> Result<Task>;
}

impl Backend for ApiClient {
    fn fetch_project(&self, id: &str) -> Result<Option<Project>> {
        ApiClient::fetch_project(self, id)
    }

    fn fetch_app(&self, id: &str) -> Result<App> {
        ApiClient::fetch_app(self, id)
    }

    fn validate_branch(&self, repo: &str, branch: Option<&str>) -> Result<String> {
        ApiClient::validate_branch(self, repo, branch)
    }

    fn datatypes(&self, ids: &[String]) -> Result<Vec<DataType>> {
        self.query_datatypes(&DatatypeQuery {
            ids: ids.to_vec(),
            limit: Some(ids.len().max(1) as u32),
            ..Default::default()
        })
    }

    fn datasets(&self, ids: &[String]) -> Result<Vec<Dataset>> {
        self.query_datasets(&DatasetQuery {
            ids: ids.to_vec(),
            limit: Some(ids.len().max(1) as u32),
            ..Default::default()
        })
    }

    fn fetch_instance(&self, id: &str) -> Result<Option<Instance>> {
        ApiClient::fetch_instance(self, id)
    }

    fn create_instance(&self, instance: &NewInstance) -> Result<Instance> {
        ApiClient::create_instance(self, instance)
    }

    fn stage_datasets(&self, instance_id: &str, dataset_ids: &[String]) -> Result<Task> {
        ApiClient::stage_datasets(self, instance_id, dataset_ids)
    }

    fn find_resource(&self, reference: &str) -> Result<Resource> {
        ApiClient::find_resource(self, reference)
    }

    fn submit(&self, submission: &Submission) -> Result<Task> {
        self.submit_task(submission)
    }
}

/// What to run, where, and with which inputs.
#[derive(Debug, Clone, Default)]
pub struct AppRun {
    pub app_id: String,
    pub project_id: String,
    pub inputs: Vec<InputBinding>,
    /// Values for the app's non-input config keys.
    pub config: Map<String, Value>,
    /// Id or name of a resource to prefer.
    pub resource: Option<String>,
    /// Tags put on every archived output.
    pub tags: Vec<String>,
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dependency {
    pub task: String,
    pub subdirs: Vec<String>,
}

/// The task document posted to the job service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub instance_id: String,
    pub gids: Vec<i64>,
    pub name: String,
    pub service: String,
    pub service_branch: String,
    pub config: Map<String, Value>,
    pub deps_config: Vec<Dependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_resource_id: Option<String>,
}

/// Groups whose resources may run the task.
pub fn group_ids(project: &Project) -> Vec<i64> {
    let mut gids = vec![project.group];
    if project.has_public_resource() {
        gids.push(PUBLIC_RESOURCES_GID);
    }
    gids
}

/// Validate, stage and submit an app run. Returns the submitted task.
pub fn run_app<B: Backend + ?Sized>(backend: &B, run: &AppRun) -> Result<Task> {
    let project = backend
        .fetch_project(&run.project_id)?
        .ok_or_else(|| Error::not_found("project", &run.project_id))?;
    let app = backend.fetch_app(&run.app_id)?;
    let branch = backend.validate_branch(&app.github, app.github_branch.as_deref())?;
    let gids = group_ids(&project);

    let datatype_ids: Vec<String> = app.inputs.iter().map(|i| i.datatype.to_string()).collect();
    let datatypes: HashMap<String, DataType> = backend
        .datatypes(&datatype_ids)?
        .into_iter()
        .map(|d| (d.id.clone(), d))
        .collect();

    let dataset_ids = unique_dataset_ids(&run.inputs);
    let datasets: HashMap<String, Dataset> = if dataset_ids.is_empty() {
        HashMap::new()
    } else {
        backend
            .datasets(&dataset_ids)?
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect()
    };

    let resolved = resolve(&app, &datatypes, &datasets, &run.inputs)?;
    check_missing(&app, &resolved)?;

    let instance = select_instance(backend, &app, &project, run.instance_id.as_deref())?;
    let staging = backend.stage_datasets(&instance.id, &dataset_ids)?;
    let (staged, subdirs) = stage_inputs(&app, &resolved, &staging)?;

    let meta = staged_metadata(&staged);
    let outputs = output_specs(&app, &run.tags, &resolved, &project.id, &meta);

    let mut config = materialize(&app, &run.config, &staging.id, &resolved, &datatypes);
    let tid = staging.tid().unwrap_or_else(|| {
        warn!(task = %staging.id, "staging task carries no _tid, assuming 0");
        0
    });
    config.insert("_app".into(), Value::String(app.id.clone()));
    config.insert("_tid".into(), Value::from(tid + 1));
    config.insert("_inputs".into(), serde_json::to_value(&staged)?);
    config.insert("_outputs".into(), serde_json::to_value(&outputs)?);

    let preferred_resource_id = match &run.resource {
        Some(reference) => Some(backend.find_resource(reference)?.id),
        None => None,
    };

    let submission = Submission {
        instance_id: instance.id.clone(),
        gids,
        name: app.name.trim().to_string(),
        service: app.github.clone(),
        service_branch: branch,
        config,
        deps_config: vec![Dependency {
            task: staging.id.clone(),
            subdirs,
        }],
        preferred_resource_id,
    };

    info!(app = %app.id, instance = %instance.id, staging = %staging.id, "submitting app run");
    backend.submit(&submission)
}
