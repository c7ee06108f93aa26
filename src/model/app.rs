use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DataTypeTag, IdRef};

/// An application registered in the warehouse: its input/output contract,
/// its config schema and the repository the job service executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "desc", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AppInput>,
    #[serde(default)]
    pub outputs: Vec<AppOutput>,
    #[serde(default)]
    pub config: BTreeMap<String, ConfigParam>,
    pub github: String,
    #[serde(default)]
    pub github_branch: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub doi: Option<String>,
}

impl App {
    pub fn input(&self, field: &str) -> Option<&AppInput> {
        self.inputs.iter().find(|i| i.field == field)
    }

    /// Config keys whose value is filled from the given input field.
    pub fn config_keys_for(&self, field: &str) -> Vec<String> {
        self.config
            .iter()
            .filter(|(_, param)| param.input_id.as_deref() == Some(field))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// A declared input slot. `field` is the user-facing id (`t1`, `dwi`);
/// `id` is the document id the service assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInput {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "id")]
    pub field: String,
    pub datatype: IdRef,
    #[serde(default)]
    pub datatype_tags: Vec<DataTypeTag>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub advanced: bool,
    /// Newline separated include patterns; only these paths get staged.
    #[serde(default)]
    pub includes: Option<String>,
}

impl AppInput {
    pub fn include_patterns(&self) -> Vec<&str> {
        self.includes
            .as_deref()
            .map(|s| s.lines().map(str::trim).filter(|l| !l.is_empty()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppOutput {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "id")]
    pub field: String,
    pub datatype: IdRef,
    #[serde(default)]
    pub datatype_tags: Vec<DataTypeTag>,
    /// Input field whose datatype tags (and metadata) are carried onto
    /// this output.
    #[serde(default)]
    pub datatype_tags_pass: Option<String>,
    #[serde(default)]
    pub output_on_root: bool,
    #[serde(default = "default_archive")]
    pub archive: bool,
    #[serde(rename = "desc", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Option<Value>,
}

fn default_archive() -> bool {
    true
}

/// One entry of an app's config schema: either a plain value with a
/// default, or `type: "input"` bound to a file of an input's datatype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigParam {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl ConfigParam {
    pub fn is_input(&self) -> bool {
        self.kind == "input"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_app_document() {
        let app: App = serde_json::from_value(json!({
            "_id": "59714d376c3b7e0029153f53",
            "name": "FreeSurfer Deface",
            "desc": "deface t1",
            "github": "brainlife/app-deface",
            "github_branch": "1.0",
            "tags": ["deface"],
            "inputs": [{
                "_id": "i1",
                "id": "t1",
                "datatype": "58c33bcee13a50849b25879a",
                "datatype_tags": ["!defaced"],
                "includes": "t1.nii.gz\n\nmask.nii.gz\n",
            }],
            "outputs": [{
                "_id": "o1",
                "id": "defaced",
                "datatype": "58c33bcee13a50849b25879a",
                "datatype_tags": ["defaced"],
                "datatype_tags_pass": "t1",
            }],
            "config": {
                "t1": {"type": "input", "input_id": "t1", "file_id": "t1"},
                "reorient": {"type": "boolean", "default": false},
            },
        }))
        .unwrap();

        let input = app.input("t1").unwrap();
        assert!(!input.optional);
        assert!(!input.multi);
        assert_eq!(input.datatype_tags, vec![DataTypeTag::negated("defaced")]);
        assert_eq!(input.include_patterns(), vec!["t1.nii.gz", "mask.nii.gz"]);

        let output = &app.outputs[0];
        assert!(output.archive);
        assert!(!output.output_on_root);
        assert_eq!(output.datatype_tags_pass.as_deref(), Some("t1"));

        assert!(app.config["t1"].is_input());
        assert_eq!(app.config["reorient"].default, Some(json!(false)));
        assert_eq!(app.config_keys_for("t1"), vec!["t1".to_string()]);
    }
}
