// API client module: a blocking HTTP session against the brainlife
// services. `ApiClient` holds the reqwest client, the service URL table
// and an optional bearer token; the per-resource query functions live in
// the submodules as further `impl ApiClient` blocks.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::auth::{AuthRequest, AuthResponse, LoginMethod, TokenStore};
use crate::config::{Service, ServiceConfig};
use crate::error::{Error, Result};

mod app;
mod datalad;
mod dataset;
mod datatype;
pub mod find;
mod github;
mod project;
mod resource;
mod task;

pub use app::AppQuery;
pub use datalad::DlDatasetQuery;
pub use dataset::DatasetQuery;
pub use datatype::DatatypeQuery;
pub use find::{is_id, Find};
pub use project::{NewProject, ProjectQuery};
pub use resource::{NewResource, ResourceQuery};
pub use task::{InstanceQuery, NewInstance};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Deadline for ordinary JSON calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Deadline for streaming a dataset tarball into a task.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);

/// Blocking API client for one brainlife host. Cloning is cheap; clones
/// share the underlying connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    services: ServiceConfig,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(services: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("brainlife-cli/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .build()?;
        Ok(ApiClient {
            client,
            services,
            token: None,
        })
    }

    /// Create a client for `host` (else `BL_HOST`) with `BL_<SERVICE>_URL`
    /// overrides applied, and pick up the session token from `BL_TOKEN` or
    /// the host's token file.
    pub fn for_host(host: Option<&str>) -> Result<Self> {
        let services = ServiceConfig::from_env(host);
        let token = TokenStore::for_host(services.host()).resolve()?;
        Ok(ApiClient::new(services)?.with_token(token))
    }

    pub fn services(&self) -> &ServiceConfig {
        &self.services
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Fail early for commands that need a session.
    pub fn ensure_auth(&self) -> Result<()> {
        if self.has_token() {
            Ok(())
        } else {
            Err(Error::NotAuthenticated)
        }
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(t) = &self.token {
            let val = HeaderValue::from_str(&format!("Bearer {t}"))
                .map_err(|e| Error::InvalidToken(e.to_string()))?;
            headers.insert(AUTHORIZATION, val);
        }
        Ok(headers)
    }

    /// Start a request against one of the brainlife services, with the
    /// bearer token attached.
    pub(crate) fn request(&self, method: Method, service: Service, path: &str) -> Result<RequestBuilder> {
        self.request_with_timeout(method, service, path, REQUEST_TIMEOUT)
    }

    /// POST a raw body that may take far longer than a JSON call.
    pub(crate) fn upload_request(&self, service: Service, path: &str) -> Result<RequestBuilder> {
        self.request_with_timeout(Method::POST, service, path, UPLOAD_TIMEOUT)
    }

    fn request_with_timeout(
        &self,
        method: Method,
        service: Service,
        path: &str,
        timeout: Duration,
    ) -> Result<RequestBuilder> {
        let url = self.services.endpoint(service, path);
        debug!(%method, %url, "request");
        let req = self.client.request(method, url).timeout(timeout);
        // the token is only meant for brainlife, never for third parties
        if service == Service::Github {
            return Ok(req);
        }
        Ok(req.headers(self.auth_headers()?))
    }

    pub(crate) fn get_json<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let res = self.request(Method::GET, service, path)?.query(params).send()?;
        parse(res)
    }

    /// GET that treats 404 as "nothing there".
    pub(crate) fn get_json_opt<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        let res = self.request(Method::GET, service, path)?.query(params).send()?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse(res).map(Some)
    }

    pub(crate) fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let res = self.request(method, service, path)?.json(body).send()?;
        parse(res)
    }

    /// Perform login and return the issued JWT. The token is not stored;
    /// callers decide whether to persist it.
    pub fn login(&self, method: LoginMethod, req: &AuthRequest) -> Result<String> {
        let url = self.services.endpoint(Service::Auth, method.path());
        debug!(%url, username = %req.username, "login");
        let res = self.client.post(&url).timeout(REQUEST_TIMEOUT).json(req).send()?;
        let resp: AuthResponse = parse(res)?;
        Ok(resp.jwt)
    }
}

/// Check the status and decode the body. Non-2xx responses become
/// `Error::Remote` with the service's `message` when it sent one.
pub(crate) fn parse<T: DeserializeOwned>(res: Response) -> Result<T> {
    let status = res.status();
    if !status.is_success() {
        let txt = res.text().unwrap_or_default();
        return Err(remote_error(status, &txt));
    }
    let body = res.bytes()?;
    Ok(serde_json::from_slice(&body)?)
}

pub(crate) fn remote_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.trim().to_string()
            }
        });
    Error::Remote {
        status: status.as_u16(),
        message,
    }
}

/// Pull a list out of a `{"<key>": [...]}` envelope.
pub(crate) fn take_list<T: DeserializeOwned>(mut envelope: Value, key: &str) -> Result<Vec<T>> {
    match envelope.get_mut(key).map(Value::take) {
        Some(list) => Ok(serde_json::from_value(list)?),
        None => Ok(Vec::new()),
    }
}
