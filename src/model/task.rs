use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STATUS_FINISHED: &str = "finished";
pub const STATUS_FAILED: &str = "failed";

/// A logical session under which tasks run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "desc", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub group_id: Option<i64>,
}

impl Instance {
    pub fn is_removing(&self) -> bool {
        self.config
            .as_ref()
            .and_then(|c| c.get("removing"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// A unit of remote computation. `config` doubles as the scratchpad that
/// carries `_tid`, `_inputs` and `_outputs` between tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_msg: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl Task {
    pub fn is_finished(&self) -> bool {
        self.status == STATUS_FINISHED
    }

    pub fn is_failed(&self) -> bool {
        self.status == STATUS_FAILED
    }

    pub fn tid(&self) -> Option<i64> {
        self.config.get("_tid").and_then(Value::as_i64)
    }

    /// Output descriptors under `config._outputs`; `None` when the task
    /// declares none at all.
    pub fn outputs(&self) -> Option<&[Value]> {
        self.config
            .get("_outputs")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }
}
