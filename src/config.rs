// Service configuration
// ---------------------
// All remote endpoints hang off one host. `ServiceConfig` derives the
// per-service base URLs from it and lets individual services be pointed
// elsewhere (a staging warehouse, a local amaretti, a mock server in
// tests). The value is owned by an `ApiClient`; nothing here is global.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "brainlife.io";
pub const GITHUB_API: &str = "https://api.github.com";

/// Remote services the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    Auth,
    Amaretti,
    Warehouse,
    Main,
    Github,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Service::Auth,
        Service::Amaretti,
        Service::Warehouse,
        Service::Main,
        Service::Github,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Auth => "auth",
            Service::Amaretti => "amaretti",
            Service::Warehouse => "warehouse",
            Service::Main => "main",
            Service::Github => "github",
        }
    }

    /// Environment variable that overrides this service's base URL.
    pub fn env_var(&self) -> String {
        format!("BL_{}_URL", self.as_str().to_uppercase())
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Service::ALL
            .into_iter()
            .find(|svc| svc.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown service \"{s}\"")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    host: String,
    urls: BTreeMap<Service, String>,
}

impl ServiceConfig {
    /// Build the URL table for `host`.
    pub fn for_host(host: &str) -> Self {
        let host = host.trim_end_matches('/').to_string();
        let mut urls = BTreeMap::new();
        urls.insert(Service::Auth, format!("https://{host}/api/auth"));
        urls.insert(Service::Amaretti, format!("https://{host}/api/amaretti"));
        urls.insert(Service::Warehouse, format!("https://{host}/api/warehouse"));
        urls.insert(Service::Main, format!("https://{host}"));
        urls.insert(Service::Github, GITHUB_API.to_string());
        ServiceConfig { host, urls }
    }

    /// URL table for `host`, else `BL_HOST`, else `brainlife.io`, with any
    /// `BL_<SERVICE>_URL` overrides from the environment applied on top.
    pub fn from_env(host: Option<&str>) -> Self {
        let host = match host {
            Some(host) => host.to_string(),
            None => std::env::var("BL_HOST").unwrap_or_else(|_| DEFAULT_HOST.into()),
        };
        let mut config = ServiceConfig::for_host(&host);
        config.apply_overrides(|var| std::env::var(var).ok());
        config
    }

    /// Replace service URLs for which `lookup` knows the service's
    /// `BL_<SERVICE>_URL` variable.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for service in Service::ALL {
            if let Some(url) = lookup(&service.env_var()) {
                self.set_service(service, url);
            }
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Point one service at a different base URL.
    pub fn set_service(&mut self, service: Service, url: impl Into<String>) {
        let url = url.into();
        self.urls
            .insert(service, url.trim_end_matches('/').to_string());
    }

    pub fn with_service(mut self, service: Service, url: impl Into<String>) -> Self {
        self.set_service(service, url);
        self
    }

    pub fn url(&self, service: Service) -> &str {
        // for_host fills every service, so the lookup cannot miss
        self.urls.get(&service).map(String::as_str).unwrap_or_default()
    }

    /// Join a path onto a service base URL.
    pub fn endpoint(&self, service: Service, path: &str) -> String {
        format!("{}/{}", self.url(service), path.trim_start_matches('/'))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig::for_host(DEFAULT_HOST)
    }
}
