// Library root
// -----------
// Client library for the brainlife platform, plus the pieces the `bl`
// binary is built from.
//
// Module responsibilities:
// - `config` / `auth`: service URL table, login and token persistence.
// - `api`: the blocking HTTP client and per-resource queries.
// - `model`: warehouse and job-service records.
// - `run`: app-run orchestration (validate, stage, submit).
// - `wait`: polling a task until its outputs are archived.
// - `upload`: packing and registering local files as a dataset.
// - `cli` / `ui` / `logging`: the command line front end.
pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod run;
pub mod ui;
pub mod upload;
pub mod wait;

pub use api::ApiClient;
pub use config::{Service, ServiceConfig};
pub use error::{Error, Result, ValidationError};
pub use run::{run_app, AppRun, Backend, InputBinding};
pub use wait::{wait_datasets, wait_task, CancelToken, WaitOptions};
