// Error types
// -----------
// Every fallible library call returns `brainlife::Result<T>`. Remote
// failures carry the service's own `message`, validation failures name
// the offending field and dataset, and task lifecycle failures keep the
// task document so callers can inspect it.

use thiserror::Error;

use crate::model::Task;

pub type Result<T> = std::result::Result<T, Error>;

/// Rejections raised while checking app-run inputs, before anything is
/// staged or submitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no dataset with id '{id}'")]
    DatasetNotFound { id: String },

    #[error(
        "input data object {field}: {id} has storage status \"{status}\" and cannot be used until it has been successfully stored"
    )]
    NotStored {
        field: String,
        id: String,
        status: String,
    },

    #[error("input data object {field}: {id} has been removed and cannot be used")]
    Removed { field: String, id: String },

    #[error("this app's config does not include \"{field}\"")]
    UnknownInput { field: String },

    #[error("given input of datatype {given} but expected {expected} when checking {field}: {id}")]
    DatatypeMismatch {
        field: String,
        id: String,
        given: String,
        expected: String,
    },

    #[error(
        "this app requires that the input data object for \"{field}\" have datatype tag \"{tag}\", but it is not set on \"{id}\""
    )]
    MissingTag {
        field: String,
        id: String,
        tag: String,
    },

    #[error(
        "this app requires that the input data object for \"{field}\" should NOT have datatype tag \"{tag}\" but found it in \"{id}\""
    )]
    ForbiddenTag {
        field: String,
        id: String,
        tag: String,
    },

    #[error("some required inputs are missing: {}", .0.join(", "))]
    MissingInputs(Vec<String>),

    #[error("instance {id} is being removed and cannot be reused")]
    InstanceRemoving { id: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{message} (HTTP {status})")]
    Remote { status: u16, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{matches} {kind}s are named \"{reference}\"; pin one by id")]
    Ambiguous {
        kind: &'static str,
        reference: String,
        matches: usize,
    },

    #[error("task {} failed: {}", .0.id, .0.status_msg.as_deref().unwrap_or("no status message"))]
    TaskFailed(Box<Task>),

    #[error("task lookup for {} returned {} matches", .id, .tasks.len())]
    TaskInvalidState { id: String, tasks: Vec<Task> },

    #[error("archiving the products of task {task_id} failed")]
    ProductArchiveFailed {
        task_id: String,
        task: Option<Box<Task>>,
    },

    #[error("gave up waiting on {0}: deadline reached")]
    WaitTimedOut(String),

    #[error("wait on {0} was cancelled")]
    WaitCancelled(String),

    #[error("branch \"{branch}\" does not exist in {repo}")]
    BranchNotFound { repo: String, branch: String },

    #[error("not authenticated; run `bl login` or set BL_TOKEN")]
    NotAuthenticated,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// The task attached to a lifecycle error, if any. An ambiguous
    /// lookup yields the first of the returned tasks.
    pub fn task(&self) -> Option<&Task> {
        match self {
            Error::TaskFailed(task) => Some(task),
            Error::ProductArchiveFailed { task, .. } => task.as_deref(),
            Error::TaskInvalidState { tasks, .. } => tasks.first(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_inputs_lists_every_field() {
        let err = ValidationError::MissingInputs(vec!["t1".into(), "dwi".into()]);
        assert_eq!(err.to_string(), "some required inputs are missing: t1, dwi");
    }

    #[test]
    fn validation_errors_name_field_and_dataset() {
        let err = Error::from(ValidationError::Removed {
            field: "t1".into(),
            id: "65b030124ce5ac2907f81c48".into(),
        });
        let text = err.to_string();
        assert!(text.contains("t1"));
        assert!(text.contains("65b030124ce5ac2907f81c48"));
    }

    #[test]
    fn remote_error_surfaces_message() {
        let err = Error::Remote {
            status: 403,
            message: "not authorized".into(),
        };
        assert_eq!(err.to_string(), "not authorized (HTTP 403)");
    }
}
