// Resource models
// ---------------
// Typed views over the JSON documents returned by the warehouse and
// amaretti services. Each model is a plain `serde` mapping: `_id` becomes
// `id`, and references that the services sometimes populate and
// sometimes leave as bare ids deserialize into `IdRef`. Fetching by id is
// never done here; that lives on `ApiClient`.

use serde::{Deserialize, Serialize};

mod app;
mod datalad;
mod dataset;
mod datatype;
mod project;
mod resource;
mod task;

pub use app::{App, AppInput, AppOutput, ConfigParam};
pub use datalad::{DatasetDescription, DlDataset, DlItem, DlItemDataset, DlStats};
pub use dataset::Dataset;
pub use datatype::{DataType, DataTypeFile, DataTypeTag, FileKind};
pub use project::Project;
pub use resource::{BestResource, Resource};
pub use task::{Instance, Task};

/// A reference to another document, given either as its id string or as
/// the populated document itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawIdRef", into = "String")]
pub struct IdRef(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdRef {
    Id(String),
    Doc {
        #[serde(rename = "_id")]
        id: String,
    },
}

impl From<RawIdRef> for IdRef {
    fn from(raw: RawIdRef) -> Self {
        match raw {
            RawIdRef::Id(id) | RawIdRef::Doc { id } => IdRef(id),
        }
    }
}

impl From<IdRef> for String {
    fn from(id: IdRef) -> Self {
        id.0
    }
}

impl IdRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdRef {
    fn from(id: &str) -> Self {
        IdRef(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_ref_accepts_id_or_document() {
        let bare: IdRef = serde_json::from_value(json!("58c33bcee13a50849b25879a")).unwrap();
        let doc: IdRef = serde_json::from_value(json!({
            "_id": "58c33bcee13a50849b25879a",
            "name": "neuro/anat/t1w",
        }))
        .unwrap();
        assert_eq!(bare, doc);
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!("58c33bcee13a50849b25879a"));
    }
}
