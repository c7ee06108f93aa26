use reqwest::Method;
use serde_json::{json, Value};

use super::find::{is_id, regex, Find};
use super::ApiClient;
use crate::config::Service;
use crate::error::Result;
use crate::model::{DlDataset, DlItem};

const ITEM_FIELDS: &str =
    "dataset.meta.subject dataset.meta.session dataset.desc dataset.datatype dataset.datatype_tags dataset.tags";

/// Filters for the datalad dataset index.
#[derive(Debug, Clone, Default)]
pub struct DlDatasetQuery {
    pub id: Option<String>,
    pub path: Option<String>,
    pub commit_id: Option<String>,
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub datatype: Option<String>,
    pub datatype_tags: Vec<String>,
    pub project: Option<String>,
    pub search: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl DlDatasetQuery {
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
        } else if let Some(id) = &self.id {
            find.set("_id", id.as_str());
        }
        if let Some(path) = &self.path {
            find.set("path", path.as_str());
        }
        if let Some(commit) = &self.commit_id {
            find.set("commit_id", commit.as_str());
        }
        if let Some(name) = &self.name {
            find.set("name", name.as_str());
        }
        if !self.tags.is_empty() {
            find.set("tags", json!({"$all": self.tags}));
        }
        if let Some(datatype) = &self.datatype {
            find.set("datatype", datatype.as_str());
        }
        if !self.datatype_tags.is_empty() {
            find.set("datatype_tags", json!({"$all": self.datatype_tags}));
        }
        if let Some(project) = &self.project {
            find.set("project", project.as_str());
        }
        find
    }
}

impl ApiClient {
    pub fn query_dl_datasets(&self, query: &DlDatasetQuery) -> Result<Vec<DlDataset>> {
        let found: Option<Vec<DlDataset>> = self.get_json_opt(
            Service::Warehouse,
            "/datalad/datasets",
            &query.to_find().to_params(),
        )?;
        Ok(found.unwrap_or_default())
    }

    /// First importable item of a datalad dataset, for previewing.
    pub fn dl_dataset_item(&self, id: &str) -> Result<Option<DlItem>> {
        let params = [
            ("find", json!({"dldataset": id}).to_string()),
            ("select", ITEM_FIELDS.to_string()),
            ("limit", "1".to_string()),
        ];
        let items: Vec<DlItem> = self.get_json(Service::Warehouse, "/datalad/items", &params)?;
        Ok(items.into_iter().next())
    }

    /// Import a datalad dataset's objects of the given datatypes into a
    /// project.
    pub fn import_dl_dataset(&self, id: &str, project: &str, datatypes: &[String]) -> Result<Value> {
        self.send_json(
            Method::POST,
            Service::Warehouse,
            &format!("/datalad/import/{id}"),
            &json!({"project": project, "datatypes": datatypes}),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_path_and_tags() {
        let query = DlDatasetQuery {
            path: Some("OpenNeuroDatasets/ds000001".into()),
            datatype_tags: vec!["defaced".into()],
            ..Default::default()
        };
        let find = query.to_find();
        assert_eq!(find.filter["path"], json!("OpenNeuroDatasets/ds000001"));
        assert_eq!(find.filter["datatype_tags"], json!({"$all": ["defaced"]}));
        assert!(!find.filter.contains_key("tags"));
    }
}
