// Config materialization: fill the app's config schema from user values,
// schema defaults and paths into the staging task's working directory.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::inputs::ResolvedInputs;
use crate::model::{App, ConfigParam, DataType, Dataset};

/// Path of one datatype file of a staged dataset, relative to the working
/// directory of the task that consumes it.
pub fn staged_path(staging_task_id: &str, dataset_id: &str, name: &str) -> String {
    format!("../{staging_task_id}/{dataset_id}/{name}")
}

fn input_path(
    param: &ConfigParam,
    dataset: &Dataset,
    staging_task_id: &str,
    datatypes: &HashMap<String, DataType>,
) -> Option<String> {
    let file_id = param.file_id.as_deref()?;
    let file = datatypes.get(dataset.datatype.as_str())?.file(file_id)?;
    Some(staged_path(staging_task_id, &dataset.id, &file.name))
}

/// Build the task config. `input` keys point at staged files (a list for
/// multi inputs) and are left out when nothing is bound to them; other
/// keys take the user's value or the schema default.
pub fn materialize(
    app: &App,
    user: &Map<String, Value>,
    staging_task_id: &str,
    resolved: &ResolvedInputs,
    datatypes: &HashMap<String, DataType>,
) -> Map<String, Value> {
    let mut config = Map::new();

    for (key, param) in &app.config {
        if !param.is_input() {
            let value = match user.get(key) {
                Some(v) if !v.is_null() => v.clone(),
                _ => param.default.clone().unwrap_or(Value::Null),
            };
            config.insert(key.clone(), value);
            continue;
        }

        let Some(input_id) = param.input_id.as_deref() else {
            continue;
        };
        let Some(datasets) = resolved.get(input_id).filter(|d| !d.is_empty()) else {
            continue;
        };
        let multi = app.input(input_id).map(|i| i.multi).unwrap_or(false);

        if multi {
            let paths: Vec<Value> = datasets
                .iter()
                .filter_map(|d| input_path(param, d, staging_task_id, datatypes))
                .map(Value::String)
                .collect();
            config.insert(key.clone(), Value::Array(paths));
        } else if let Some(path) = input_path(param, &datasets[0], staging_task_id, datatypes) {
            config.insert(key.clone(), Value::String(path));
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> (App, HashMap<String, DataType>) {
        let app: App = serde_json::from_value(json!({
            "_id": "app",
            "name": "app",
            "github": "x/y",
            "inputs": [
                {"id": "t1", "datatype": "anat"},
                {"id": "dwis", "datatype": "dwi", "multi": true},
                {"id": "mask", "datatype": "anat", "optional": true},
            ],
            "config": {
                "t1": {"type": "input", "input_id": "t1", "file_id": "t1"},
                "dwi": {"type": "input", "input_id": "dwis", "file_id": "dwi"},
                "mask": {"type": "input", "input_id": "mask", "file_id": "t1"},
                "reorient": {"type": "boolean", "default": false},
                "crop": {"type": "boolean", "default": true},
                "label": {"type": "string"},
            },
        }))
        .unwrap();
        let datatypes = [
            json!({"_id": "anat", "name": "neuro/anat/t1w", "files": [{"id": "t1", "filename": "t1.nii.gz"}]}),
            json!({"_id": "dwi", "name": "neuro/dwi", "files": [{"id": "dwi", "dirname": "dwi"}]}),
        ]
        .into_iter()
        .map(|v| {
            let dt: DataType = serde_json::from_value(v).unwrap();
            (dt.id.clone(), dt)
        })
        .collect();
        (app, datatypes)
    }

    fn dataset(id: &str, datatype: &str) -> Dataset {
        serde_json::from_value(json!({"_id": id, "project": "p", "datatype": datatype, "status": "stored"})).unwrap()
    }

    #[test]
    fn fills_paths_values_and_defaults() {
        let (app, datatypes) = fixture();
        let mut resolved = ResolvedInputs::new();
        resolved.insert("t1".into(), vec![dataset("d1", "anat")]);
        resolved.insert("dwis".into(), vec![dataset("d2", "dwi"), dataset("d3", "dwi")]);
        let user = json!({"reorient": true, "crop": null, "unknown": 1});

        let config = materialize(&app, user.as_object().unwrap(), "stage1", &resolved, &datatypes);

        assert_eq!(config["t1"], json!("../stage1/d1/t1.nii.gz"));
        assert_eq!(config["dwi"], json!(["../stage1/d2/dwi", "../stage1/d3/dwi"]));
        assert!(!config.contains_key("mask"));
        assert_eq!(config["reorient"], json!(true));
        assert_eq!(config["crop"], json!(true));
        assert_eq!(config["label"], Value::Null);
        assert!(!config.contains_key("unknown"));
    }
}
