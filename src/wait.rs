// Task polling
// ------------
// Blocking waits for a task to finish and for its outputs to be archived.
// Both loops poll on a fixed interval; callers bound them with a deadline
// and/or a `CancelToken` that another thread can trip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::model::{Dataset, Task};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);
/// Name the warehouse gives its datatype-validator tasks.
pub const VALIDATOR_TASK: &str = "__dtv";

const SLICE: Duration = Duration::from_millis(100);

/// Shared flag that aborts a wait at its next check.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub interval: Duration,
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelToken>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        WaitOptions {
            interval: DEFAULT_INTERVAL,
            deadline: None,
            cancel: None,
        }
    }
}

impl WaitOptions {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancel_with(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check(&self, what: &str) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(Error::WaitCancelled(what.to_string()));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::WaitTimedOut(what.to_string()));
        }
        Ok(())
    }

    /// Sleep one interval, in slices so cancellation and the deadline are
    /// noticed promptly.
    fn pause(&self, what: &str) -> Result<()> {
        let until = Instant::now() + self.interval;
        loop {
            self.check(what)?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            let mut step = (until - now).min(SLICE);
            if let Some(deadline) = self.deadline {
                step = step.min(deadline.saturating_duration_since(now));
            }
            thread::sleep(step);
        }
    }
}

/// The remote lookups the wait loops poll.
pub trait TaskSource {
    fn tasks(&self, id: &str) -> Result<Vec<Task>>;
    fn task_products(&self, id: &str) -> Result<Vec<Value>>;
    fn task_datasets(&self, id: &str) -> Result<Vec<Dataset>>;
}

impl TaskSource for ApiClient {
    fn tasks(&self, id: &str) -> Result<Vec<Task>> {
        self.fetch_task(id)
    }

    fn task_products(&self, id: &str) -> Result<Vec<Value>> {
        ApiClient::task_products(self, id)
    }

    fn task_datasets(&self, id: &str) -> Result<Vec<Dataset>> {
        ApiClient::task_datasets(self, id)
    }
}

fn products_ok(products: &[Value]) -> bool {
    !products.is_empty()
        && products.iter().all(|p| {
            p.pointer("/product/errors")
                .and_then(Value::as_array)
                .map_or(true, Vec::is_empty)
        })
}

/// Wait for task `id` to finish, then for the datasets it archives.
/// Returns those datasets; empty when the task archives nothing.
pub fn wait_task<S: TaskSource + ?Sized>(source: &S, id: &str, opts: &WaitOptions) -> Result<Vec<Dataset>> {
    loop {
        let mut tasks = source.tasks(id)?;
        if tasks.len() != 1 {
            return Err(Error::TaskInvalidState {
                id: id.to_string(),
                tasks,
            });
        }
        let task = tasks.remove(0);
        debug!(task = %task.id, status = %task.status, "polled task");

        if task.is_failed() {
            return Err(Error::TaskFailed(Box::new(task)));
        }

        if task.is_finished() {
            let Some(outputs) = task.outputs() else {
                return Ok(Vec::new());
            };
            let archived = outputs
                .iter()
                .filter(|o| o.get("archive").is_some_and(|a| !a.is_null() && a != &Value::Bool(false)))
                .count();
            if archived == 0 {
                return Ok(Vec::new());
            }

            if task.name == VALIDATOR_TASK {
                let products = source.task_products(&task.id)?;
                if !products_ok(&products) {
                    return Err(Error::ProductArchiveFailed {
                        task_id: task.id.clone(),
                        task: Some(Box::new(task)),
                    });
                }
            }

            info!(task = %task.id, outputs = archived, "task finished, waiting for archival");
            return wait_datasets(source, id, opts).map_err(|e| match e {
                Error::ProductArchiveFailed { task_id, task: None } => Error::ProductArchiveFailed {
                    task_id,
                    task: Some(Box::new(task)),
                },
                e => e,
            });
        }

        opts.pause(id)?;
    }
}

/// Wait until every dataset produced by task `id` is stored.
pub fn wait_datasets<S: TaskSource + ?Sized>(source: &S, id: &str, opts: &WaitOptions) -> Result<Vec<Dataset>> {
    loop {
        let datasets = source.task_datasets(id)?;
        if datasets.is_empty() {
            return Ok(datasets);
        }
        if datasets.iter().any(Dataset::is_failed) {
            return Err(Error::ProductArchiveFailed {
                task_id: id.to_string(),
                task: None,
            });
        }
        if datasets.iter().all(Dataset::is_stored) {
            return Ok(datasets);
        }
        debug!(task = %id, pending = datasets.iter().filter(|d| !d.is_stored()).count(), "archival pending");
        opts.pause(id)?;
    }
}
