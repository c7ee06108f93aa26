use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::{json, Value};

use super::find::{any_of, is_id, regex, tag_filter, Find};
use super::{take_list, ApiClient};
use crate::config::Service;
use crate::error::Result;
use crate::model::{DataTypeTag, Dataset};

/// Filters for `GET /dataset`.
#[derive(Debug, Clone, Default)]
pub struct DatasetQuery {
    pub id: Option<String>,
    pub ids: Vec<String>,
    pub datatype: Option<String>,
    pub datatype_tags: Vec<DataTypeTag>,
    pub tags: Vec<DataTypeTag>,
    pub project: Option<String>,
    pub publication: Option<String>,
    pub metadata: BTreeMap<String, Value>,
    /// An id, or a substring of the name/description.
    pub search: Option<String>,
    /// Provenance: datasets archived by this task.
    pub task: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl DatasetQuery {
    pub fn to_find(&self) -> Find {
        let mut find = Find::new().page(self.skip, self.limit);
        if let Some(search) = &self.search {
            if is_id(search) {
                find.set("_id", search.as_str());
            } else {
                find.set(
                    "$or",
                    json!([{"name": regex(search)}, {"desc": regex(search)}]),
                );
            }
        } else if !self.ids.is_empty() {
            find.set("_id", any_of(&self.ids));
        } else if let Some(id) = &self.id {
            find.set("_id", id.as_str());
        }

        if let Some(datatype) = &self.datatype {
            find.set("datatype", datatype.as_str());
        }
        if let Some(tags) = tag_filter(&self.tags) {
            find.set("tags", tags);
        }
        if let Some(tags) = tag_filter(&self.datatype_tags) {
            find.set("datatype_tags", tags);
        }
        if let Some(project) = &self.project {
            find.set("project", project.as_str());
        }
        if let Some(publication) = &self.publication {
            find.set("publications", publication.as_str());
        }
        if let Some(task) = &self.task {
            find.set("prov.task_id", task.as_str());
        }
        for (key, value) in &self.metadata {
            find.set(&format!("meta.{key}"), value.clone());
        }
        find
    }
}

impl ApiClient {
    pub fn query_datasets(&self, query: &DatasetQuery) -> Result<Vec<Dataset>> {
        let envelope: Value =
            self.get_json(Service::Warehouse, "/dataset", &query.to_find().to_params())?;
        take_list(envelope, "datasets")
    }

    pub fn fetch_dataset(&self, id: &str) -> Result<Option<Dataset>> {
        let query = DatasetQuery {
            id: Some(id.to_string()),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.query_datasets(&query)?.into_iter().next())
    }

    /// Datasets archived from a task's outputs.
    pub fn task_datasets(&self, task_id: &str) -> Result<Vec<Dataset>> {
        let query = DatasetQuery {
            task: Some(task_id.to_string()),
            ..Default::default()
        };
        self.query_datasets(&query)
    }

    /// Register the uploaded contents of `task_id`'s `subdir` as a dataset.
    /// The answer may carry a `validator_task` to wait on.
    pub fn finalize_upload(&self, body: &Value) -> Result<Value> {
        self.send_json(Method::POST, Service::Warehouse, "/dataset/finalize-upload", body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_text_matches_name_or_desc() {
        let query = DatasetQuery {
            search: Some("t1".into()),
            ..Default::default()
        };
        let find = query.to_find();
        assert_eq!(
            find.filter["$or"],
            json!([
                {"name": {"$regex": "t1", "$options": "ig"}},
                {"desc": {"$regex": "t1", "$options": "ig"}},
            ])
        );
    }

    #[test]
    fn builds_full_filter() {
        let mut metadata = BTreeMap::new();
        metadata.insert("subject".to_string(), json!("01"));
        let query = DatasetQuery {
            ids: vec!["a".into(), "b".into()],
            datatype: Some("dt".into()),
            datatype_tags: vec![DataTypeTag::new("defaced"), DataTypeTag::negated("raw")],
            tags: vec![DataTypeTag::new("sub-01")],
            project: Some("p".into()),
            task: Some("t".into()),
            metadata,
            ..Default::default()
        };
        let find = query.to_find();
        assert_eq!(find.filter["_id"], json!({"$in": ["a", "b"]}));
        assert_eq!(find.filter["datatype"], json!("dt"));
        assert_eq!(
            find.filter["datatype_tags"],
            json!({"$all": ["defaced"], "$nin": ["raw"]})
        );
        assert_eq!(find.filter["tags"], json!({"$all": ["sub-01"]}));
        assert_eq!(find.filter["project"], json!("p"));
        assert_eq!(find.filter["prov.task_id"], json!("t"));
        assert_eq!(find.filter["meta.subject"], json!("01"));
        assert!(find.sort.is_none());
    }
}
