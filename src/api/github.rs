// App repositories live on GitHub; before submitting we make sure the
// branch the app pins actually exists there.

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::{parse, remote_error, ApiClient};
use crate::config::Service;
use crate::error::{Error, Result};

impl ApiClient {
    /// Return the branch to run `repo` at: `branch` when it exists, the
    /// repository's default branch when none is pinned.
    pub fn validate_branch(&self, repo: &str, branch: Option<&str>) -> Result<String> {
        let branch = match branch.map(str::trim).filter(|b| !b.is_empty()) {
            Some(branch) => branch.to_string(),
            None => self.default_branch(repo)?,
        };
        let res = self
            .request(Method::GET, Service::Github, &format!("/repos/{repo}/branches/{branch}"))?
            .send()?;
        match res.status() {
            s if s.is_success() => {
                debug!(%repo, %branch, "branch exists");
                Ok(branch)
            }
            StatusCode::NOT_FOUND => Err(Error::BranchNotFound {
                repo: repo.to_string(),
                branch,
            }),
            s => Err(remote_error(s, &res.text().unwrap_or_default())),
        }
    }

    fn default_branch(&self, repo: &str) -> Result<String> {
        let res = self
            .request(Method::GET, Service::Github, &format!("/repos/{repo}"))?
            .send()?;
        let info: Value = parse(res)?;
        info.get("default_branch")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::BranchNotFound {
                repo: repo.to_string(),
                branch: "(default)".into(),
            })
    }
}
