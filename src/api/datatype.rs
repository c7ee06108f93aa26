use serde_json::Value;

use super::find::{any_of, is_id, Find};
use super::{take_list, ApiClient};
use crate::config::Service;
use crate::error::Result;
use crate::model::DataType;

#[derive(Debug, Clone, Default)]
pub struct DatatypeQuery {
    pub id: Option<String>,
    pub ids: Vec<String>,
    pub name: Option<String>,
    /// An id, or an exact datatype name such as `neuro/anat/t1w`.
    pub search: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl DatatypeQuery {
    pub fn to_find(&self) -> Find {
        let mut find = Find::new().sort("name").page(self.skip, self.limit);
        if let Some(search) = &self.search {
            if is_id(search) {
                find.set("_id", search.as_str());
            } else {
                find.set("name", search.as_str());
            }
            return find;
        }
        if let Some(id) = &self.id {
            find.set("_id", id.as_str());
        } else if !self.ids.is_empty() {
            find.set("_id", any_of(&self.ids));
        }
        if let Some(name) = &self.name {
            find.set("name", name.as_str());
        }
        find
    }
}

impl ApiClient {
    pub fn query_datatypes(&self, query: &DatatypeQuery) -> Result<Vec<DataType>> {
        let envelope: Option<Value> =
            self.get_json_opt(Service::Warehouse, "/datatype", &query.to_find().to_params())?;
        match envelope {
            Some(envelope) => take_list(envelope, "datatypes"),
            None => Ok(Vec::new()),
        }
    }

    pub fn fetch_datatype(&self, id: &str) -> Result<Option<DataType>> {
        let query = DatatypeQuery {
            id: Some(id.to_string()),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.query_datatypes(&query)?.into_iter().next())
    }
}
