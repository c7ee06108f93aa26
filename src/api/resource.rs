use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};

use super::find::{is_id, regex, Find};
use super::{take_list, ApiClient};
use crate::config::Service;
use crate::error::{Error, Result};
use crate::model::{BestResource, Resource};

#[derive(Debug, Clone, Default)]
pub struct ResourceQuery {
    pub id: Option<String>,
    /// Name pattern (case-insensitive substring).
    pub name: Option<String>,
    /// Name, matched verbatim.
    pub exact_name: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl ResourceQuery {
    /// Id when the reference looks like one, exact name otherwise.
    pub fn by_reference(reference: &str) -> Self {
        if is_id(reference) {
            ResourceQuery {
                id: Some(reference.to_string()),
                ..Default::default()
            }
        } else {
            ResourceQuery {
                exact_name: Some(reference.to_string()),
                ..Default::default()
            }
        }
    }

    pub fn to_find(&self) -> Find {
        let mut find = Find::new().sort("name").page(self.skip, self.limit);
        if let Some(id) = &self.id {
            find.set("_id", id.as_str());
        }
        if let Some(name) = &self.name {
            find.set("name", regex(name));
        }
        if let Some(name) = &self.exact_name {
            find.set("name", name.as_str());
        }
        find
    }
}

/// Body for creating or updating a resource. Unset fields are left out.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envs: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gids: Option<Vec<i64>>,
}

impl ApiClient {
    pub fn query_resources(&self, query: &ResourceQuery) -> Result<Vec<Resource>> {
        let envelope: Value =
            self.get_json(Service::Amaretti, "/resource", &query.to_find().to_params())?;
        take_list(envelope, "resources")
    }

    /// Resolve a resource by id or exact name. No match, or several
    /// resources sharing the name, is an error.
    pub fn find_resource(&self, reference: &str) -> Result<Resource> {
        let mut found: Vec<Resource> = self
            .query_resources(&ResourceQuery::by_reference(reference))?
            .into_iter()
            .filter(|r| r.id == reference || r.name == reference)
            .collect();
        match found.len() {
            0 => Err(Error::not_found("resource", reference)),
            1 => Ok(found.remove(0)),
            matches => Err(Error::Ambiguous {
                kind: "resource",
                reference: reference.to_string(),
                matches,
            }),
        }
    }

    pub fn create_resource(&self, resource: &NewResource) -> Result<Resource> {
        self.send_json(Method::POST, Service::Amaretti, "/resource", resource)
    }

    pub fn update_resource(&self, id: &str, resource: &NewResource) -> Result<Value> {
        self.send_json(Method::PUT, Service::Amaretti, &format!("/resource/{id}"), resource)
    }

    pub fn delete_resource(&self, id: &str) -> Result<Value> {
        let res = self
            .request(Method::DELETE, Service::Amaretti, &format!("/resource/{id}"))?
            .send()?;
        super::parse(res)
    }

    /// The resource amaretti would pick to run `service` for these groups.
    pub fn best_resource(&self, service: &str, gids: &[i64]) -> Result<BestResource> {
        let mut params = vec![("service", service.to_string())];
        params.extend(gids.iter().map(|gid| ("gids[]", gid.to_string())));
        self.get_json(Service::Amaretti, "/resource/best", &params)
    }

    /// Ask amaretti to test connectivity; returns the resulting status.
    pub fn test_resource(&self, id: &str) -> Result<String> {
        let res = self
            .request(Method::PUT, Service::Amaretti, &format!("/resource/test/{id}"))?
            .send()?;
        let body: Value = super::parse(res)?;
        Ok(body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }
}
