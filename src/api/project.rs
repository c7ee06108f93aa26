use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::find::{is_id, regex, Find};
use super::{take_list, ApiClient};
use crate::config::Service;
use crate::error::{Error, Result};
use crate::model::Project;

/// Filters for `GET /project`. `search` takes precedence over `id`/`name`
/// and matches an exact id or an exact name.
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    pub id: Option<String>,
    pub name: Option<String>,
    pub search: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl ProjectQuery {
    pub fn by_id(id: &str) -> Self {
        ProjectQuery {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    pub fn to_find(&self) -> Find {
        let mut find = Find::new().sort("name").page(self.skip, self.limit);
        if let Some(search) = &self.search {
            if is_id(search) {
                find.set("_id", search.as_str());
            } else {
                find.set("name", search.as_str());
            }
        } else {
            if let Some(id) = &self.id {
                find.set("_id", id.as_str());
            }
            if let Some(name) = &self.name {
                find.set("name", regex(name));
            }
        }
        find
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub name: String,
    #[serde(rename = "desc")]
    pub description: Option<String>,
    #[serde(rename = "group_id", skip_serializing_if = "Option::is_none")]
    pub group: Option<i64>,
}

impl ApiClient {
    pub fn query_projects(&self, query: &ProjectQuery) -> Result<Vec<Project>> {
        let envelope: Option<Value> =
            self.get_json_opt(Service::Warehouse, "/project", &query.to_find().to_params())?;
        match envelope {
            Some(envelope) => take_list(envelope, "projects"),
            None => Ok(Vec::new()),
        }
    }

    pub fn fetch_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.query_projects(&ProjectQuery::by_id(id))?.into_iter().next())
    }

    /// Fetch a project by id or exact name, failing when there is none.
    pub fn find_project(&self, id_or_name: &str) -> Result<Project> {
        let query = ProjectQuery {
            search: Some(id_or_name.to_string()),
            limit: Some(1),
            ..Default::default()
        };
        self.query_projects(&query)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("project", id_or_name))
    }

    pub fn create_project(&self, project: &NewProject) -> Result<Project> {
        self.send_json(Method::POST, Service::Warehouse, "/project", project)
    }

    /// Marks the project removed; the warehouse keeps the document.
    pub fn delete_project(&self, id: &str) -> Result<Value> {
        let res = self
            .request(Method::DELETE, Service::Warehouse, &format!("/project/{id}"))?
            .send()?;
        super::parse(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_by_id_or_name() {
        let by_id = ProjectQuery {
            search: Some("65b022f04ce5ac2907f7d4a1".into()),
            ..Default::default()
        };
        assert_eq!(by_id.to_find().filter["_id"], json!("65b022f04ce5ac2907f7d4a1"));

        let by_name = ProjectQuery {
            search: Some("My Project".into()),
            id: Some("ignored".into()),
            ..Default::default()
        };
        let find = by_name.to_find();
        assert_eq!(find.filter["name"], json!("My Project"));
        assert!(!find.filter.contains_key("_id"));
    }

    #[test]
    fn name_filter_is_a_regex() {
        let query = ProjectQuery {
            name: Some("test".into()),
            ..Default::default()
        };
        assert_eq!(
            query.to_find().filter["name"],
            json!({"$regex": "test", "$options": "ig"})
        );
    }

    #[test]
    fn new_project_omits_missing_group() {
        let body = serde_json::to_value(NewProject {
            name: "test".into(),
            description: Some("test".into()),
            group: None,
        })
        .unwrap();
        assert_eq!(body, json!({"name": "test", "desc": "test"}));
    }
}
