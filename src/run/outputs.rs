// Run metadata and the output descriptors the job service archives once
// the task finishes.

use serde::Serialize;
use serde_json::{Map, Value};

use super::inputs::ResolvedInputs;
use super::staging::StagedInput;
use crate::model::App;

/// Metadata keys carried from inputs onto outputs, in priority order.
pub const META_KEYS: [&str; 3] = ["subject", "session", "run"];

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// First non-empty value per key across the inputs, in scan order.
pub fn compile_metadata<'a, I>(metas: I) -> Map<String, Value>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut meta = Map::new();
    for source in metas {
        for key in META_KEYS {
            if meta.contains_key(key) {
                continue;
            }
            if let Some(value) = source.get(key).filter(|v| !is_blank(v)) {
                meta.insert(key.to_string(), value.clone());
            }
        }
    }
    meta
}

/// Metadata of the staged inputs, in app input order.
pub fn staged_metadata(staged: &[StagedInput]) -> Map<String, Value> {
    compile_metadata(staged.iter().filter_map(StagedInput::meta))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Archive {
    pub project: String,
    pub desc: String,
}

/// One `_outputs` entry of the submitted task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSpec {
    pub id: String,
    pub datatype: String,
    pub desc: String,
    pub tags: Vec<String>,
    pub meta: Map<String, Value>,
    pub datatype_tags: Vec<String>,
    pub archive: Archive,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Describe every declared output. Outputs that pass datatype tags through
/// from an input also pick up that input's metadata.
pub fn output_specs(
    app: &App,
    tags: &[String],
    resolved: &ResolvedInputs,
    project_id: &str,
    meta: &Map<String, Value>,
) -> Vec<OutputSpec> {
    app.outputs
        .iter()
        .map(|output| {
            let mut meta = meta.clone();
            let mut datatype_tags = Vec::new();

            let passed = output
                .datatype_tags_pass
                .as_deref()
                .and_then(|field| resolved.get(field))
                .map(Vec::as_slice)
                .unwrap_or_default();
            for dataset in passed {
                for tag in &dataset.datatype_tags {
                    push_unique(&mut datatype_tags, tag.to_string());
                }
                for (k, v) in &dataset.metadata {
                    meta.insert(k.clone(), v.clone());
                }
            }
            for tag in &output.datatype_tags {
                push_unique(&mut datatype_tags, tag.to_string());
            }

            let (files, subdir) = if output.output_on_root {
                (
                    Some(output.files.clone().unwrap_or_else(|| Value::Array(Vec::new()))),
                    None,
                )
            } else {
                (None, Some(output.field.clone()))
            };

            OutputSpec {
                id: output.field.clone(),
                datatype: output.datatype.to_string(),
                desc: output.description.clone().unwrap_or_else(|| app.name.clone()),
                tags: tags.to_vec(),
                meta,
                datatype_tags,
                archive: Archive {
                    project: project_id.to_string(),
                    desc: format!("{} from {}", output.field, app.name),
                },
                files,
                subdir,
            }
        })
        .collect()
}
