use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::IdRef;

/// A datalad (OpenNeuro style) dataset indexed by the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlDataset {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(rename = "__v", default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub dataset_description: DatasetDescription,
    #[serde(default)]
    pub participants: Vec<Map<String, Value>>,
    #[serde(default)]
    pub stats: Option<DlStats>,
    #[serde(default)]
    pub import_count: i64,
    #[serde(default)]
    pub create_date: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

/// BIDS `dataset_description.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DatasetDescription {
    pub name: String,
    #[serde(rename = "BIDSVersion")]
    pub bids_version: String,
    pub license: String,
    pub authors: Vec<String>,
    pub acknowledgements: Value,
    pub how_to_acknowledge: String,
    pub funding: Value,
    pub references_and_links: Vec<String>,
    #[serde(rename = "DatasetDOI")]
    pub dataset_doi: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DlStats {
    pub subjects: i64,
    pub sessions: i64,
    pub datatypes: Map<String, Value>,
}

/// Preview of one importable object in a datalad dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub dataset: DlItemDataset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlItemDataset {
    pub datatype: IdRef,
    #[serde(default)]
    pub datatype_tags: Vec<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}
