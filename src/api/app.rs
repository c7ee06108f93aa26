use serde_json::{json, Value};

use super::datatype::DatatypeQuery;
use super::find::{regex, Find};
use super::{take_list, ApiClient};
use crate::config::Service;
use crate::error::{Error, Result, ValidationError};
use crate::model::App;

/// Filters for `GET /app`. Input and output datatypes are given by name
/// and resolved to ids before querying.
#[derive(Debug, Clone, Default)]
pub struct AppQuery {
    pub id: Option<String>,
    pub name: Option<String>,
    pub input_datatypes: Vec<String>,
    pub output_datatypes: Vec<String>,
    pub doi: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl AppQuery {
    /// Build the filter once datatype names are resolved to ids: every
    /// listed datatype must appear among the app's inputs (outputs).
    pub fn to_find(&self, input_ids: &[String], output_ids: &[String]) -> Find {
        let mut find = Find::new().sort("name").page(self.skip, self.limit);
        if let Some(id) = &self.id {
            find.set("_id", id.as_str());
        }
        if let Some(name) = &self.name {
            find.set("name", regex(name));
        }
        let clauses: Vec<Value> = input_ids
            .iter()
            .map(|id| json!({"inputs": {"$elemMatch": {"datatype": id}}}))
            .chain(
                output_ids
                    .iter()
                    .map(|id| json!({"outputs": {"$elemMatch": {"datatype": id}}})),
            )
            .collect();
        if !clauses.is_empty() {
            find.set("$and", clauses);
        }
        if let Some(doi) = &self.doi {
            find.set("doi", doi.as_str());
        }
        find
    }
}

impl ApiClient {
    pub fn query_apps(&self, query: &AppQuery) -> Result<Vec<App>> {
        let input_ids = self.datatype_ids(&query.input_datatypes, "input")?;
        let output_ids = self.datatype_ids(&query.output_datatypes, "output")?;
        let find = query.to_find(&input_ids, &output_ids);
        let envelope: Value = self.get_json(Service::Warehouse, "/app", &find.to_params())?;
        take_list(envelope, "apps")
    }

    pub fn fetch_app(&self, id: &str) -> Result<App> {
        let query = AppQuery {
            id: Some(id.to_string()),
            limit: Some(1),
            ..Default::default()
        };
        self.query_apps(&query)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("app", id))
    }

    fn datatype_ids(&self, names: &[String], role: &str) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(names.len());
        let mut invalid = Vec::new();
        for name in names {
            let query = DatatypeQuery {
                name: Some(name.clone()),
                limit: Some(1),
                ..Default::default()
            };
            match self.query_datatypes(&query)?.into_iter().next() {
                Some(datatype) => ids.push(datatype.id),
                None => invalid.push(name.as_str()),
            }
        }
        if !invalid.is_empty() {
            return Err(ValidationError::Other(format!(
                "invalid {role} datatypes: {}",
                invalid.join(", ")
            ))
            .into());
        }
        Ok(ids)
    }
}
