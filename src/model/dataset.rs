use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DataTypeTag, IdRef};

pub const STATUS_STORED: &str = "stored";
pub const STATUS_FAILED: &str = "failed";

/// A data object stored in the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(rename = "_id")]
    pub id: String,
    pub project: IdRef,
    pub datatype: IdRef,
    #[serde(default)]
    pub datatype_tags: Vec<DataTypeTag>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "desc", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "create_date", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub removed: bool,
    #[serde(rename = "meta", default)]
    pub metadata: Map<String, Value>,
}

impl Dataset {
    pub fn is_stored(&self) -> bool {
        self.status == STATUS_STORED
    }

    pub fn is_failed(&self) -> bool {
        self.status == STATUS_FAILED
    }

    /// Only stored, non-removed datasets can feed an app.
    pub fn is_usable(&self) -> bool {
        self.is_stored() && !self.removed
    }

    pub fn has_datatype_tag(&self, name: &str) -> bool {
        self.datatype_tags.iter().any(|t| t.to_string() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_dataset_document() {
        let dataset: Dataset = serde_json::from_value(json!({
            "_id": "65b030124ce5ac2907f81c48",
            "project": {"_id": "65b022f04ce5ac2907f7d4a1", "name": "test"},
            "datatype": "58c33bcee13a50849b25879a",
            "datatype_tags": ["defaced"],
            "tags": ["sub-01"],
            "desc": "t1",
            "storage": "wrangler",
            "size": 1024,
            "status": "stored",
            "create_date": "2024-01-23T20:19:30.221Z",
            "meta": {"subject": "01", "session": "1"},
        }))
        .unwrap();

        assert_eq!(dataset.project.as_str(), "65b022f04ce5ac2907f7d4a1");
        assert_eq!(dataset.datatype.as_str(), "58c33bcee13a50849b25879a");
        assert!(dataset.is_usable());
        assert!(dataset.has_datatype_tag("defaced"));
        assert!(dataset.created_at.is_some());
        assert_eq!(dataset.metadata["subject"], json!("01"));
    }

    #[test]
    fn removed_dataset_is_not_usable() {
        let dataset: Dataset = serde_json::from_value(json!({
            "_id": "d",
            "project": "p",
            "datatype": "t",
            "status": "stored",
            "removed": true,
        }))
        .unwrap();
        assert!(dataset.is_stored());
        assert!(!dataset.is_usable());
    }
}
