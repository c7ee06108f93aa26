// Matching resolved inputs to the copies the staging task made of them.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use super::inputs::ResolvedInputs;
use crate::error::ValidationError;
use crate::model::{App, Task};

/// A resolved input as the submitted task will see it: the staging
/// descriptor for the dataset, re-labelled with the input field.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedInput {
    pub field: String,
    /// Directory under the staging task the dataset was copied into.
    pub subdir: String,
    pub dataset_id: String,
    pub task_id: String,
    /// Config keys filled from this input.
    pub keys: Vec<String>,
    pub descriptor: Map<String, Value>,
}

impl StagedInput {
    pub fn meta(&self) -> Option<&Map<String, Value>> {
        self.descriptor.get("meta").and_then(Value::as_object)
    }
}

impl Serialize for StagedInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let overridden = ["id", "task_id", "keys"];
        let mut map = serializer.serialize_map(None)?;
        for (k, v) in &self.descriptor {
            if !overridden.contains(&k.as_str()) {
                map.serialize_entry(k, v)?;
            }
        }
        map.serialize_entry("id", &self.field)?;
        map.serialize_entry("task_id", &self.task_id)?;
        map.serialize_entry("keys", &self.keys)?;
        map.end()
    }
}

/// Pair each resolved dataset with its staging descriptor, in app input
/// order, and collect the subdirectories the new task depends on.
pub fn stage_inputs(
    app: &App,
    resolved: &ResolvedInputs,
    staging: &Task,
) -> Result<(Vec<StagedInput>, Vec<String>), ValidationError> {
    let descriptors = staging.outputs().unwrap_or_default();
    let mut staged = Vec::new();
    let mut subdirs = Vec::new();

    for input in &app.inputs {
        let Some(datasets) = resolved.get(&input.field) else {
            continue;
        };
        let keys = app.config_keys_for(&input.field);

        for dataset in datasets {
            let descriptor = descriptors
                .iter()
                .filter_map(Value::as_object)
                .find(|d| d.get("dataset_id").and_then(Value::as_str) == Some(dataset.id.as_str()))
                .ok_or_else(|| {
                    ValidationError::Other(format!(
                        "staging task {} has no copy of dataset {} for input \"{}\"",
                        staging.id, dataset.id, input.field
                    ))
                })?;

            let subdir = descriptor
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(dataset.id.as_str())
                .to_string();

            let patterns = input.include_patterns();
            if patterns.is_empty() {
                subdirs.push(subdir.clone());
            } else {
                subdirs.extend(patterns.iter().map(|p| format!("include:{subdir}/{p}")));
            }

            staged.push(StagedInput {
                field: input.field.clone(),
                subdir,
                dataset_id: dataset.id.clone(),
                task_id: staging.id.clone(),
                keys: keys.clone(),
                descriptor: descriptor.clone(),
            });
        }
    }

    Ok((staged, subdirs))
}
