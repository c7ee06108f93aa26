// Authentication
// --------------
// Login payloads, JWT persistence and claim decoding. The token is kept
// per host under `~/.config/<host>/.jwt` so logging into a dev instance
// does not clobber the production session; `BL_TOKEN` wins over the file.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

pub const TOKEN_ENV: &str = "BL_TOKEN";
const DAY_MS: u64 = 1000 * 60 * 60 * 24;

/// Login request payload. `ttl` is in milliseconds on the wire.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
    pub ttl: u64,
}

impl AuthRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>, ttl_days: u64) -> Self {
        AuthRequest {
            username: username.into(),
            password: password.into(),
            ttl: ttl_days * DAY_MS,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub jwt: String,
}

/// Which login backend the auth service should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMethod {
    #[default]
    Local,
    Ldap,
}

impl LoginMethod {
    pub fn path(&self) -> &'static str {
        match self {
            LoginMethod::Local => "/local/auth",
            LoginMethod::Ldap => "/ldap/auth",
        }
    }
}

/// Where tokens are read from and written to.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// The default location for `host`: `~/.config/<host>/.jwt`.
    pub fn for_host(host: &str) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        TokenStore {
            path: home.join(".config").join(host).join(".jwt"),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the session token: `BL_TOKEN` first, then the token file.
    pub fn resolve(&self) -> Result<Option<String>> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                debug!("using token from {TOKEN_ENV}");
                return Ok(Some(token.trim().to_string()));
            }
        }
        self.load()
    }

    /// Read the token file, `None` when it does not exist.
    pub fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(data) => {
                debug!(path = %self.path.display(), "loaded token file");
                Ok(Some(data.trim().to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the token, readable and writable by the owner only.
    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        restrict_permissions(&self.path)?;
        debug!(path = %self.path.display(), "saved token file");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// The claims of a brainlife JWT that the client cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Value,
    #[serde(default)]
    pub gids: Vec<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub profile: Map<String, Value>,
    #[serde(default)]
    pub scopes: Map<String, Value>,
}

impl Claims {
    /// Decode the payload segment. The signature is not verified; the
    /// services do that.
    pub fn decode(token: &str) -> Result<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| Error::InvalidToken("expected three dot separated segments".into()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| Error::InvalidToken(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn username(&self) -> Option<&str> {
        self.profile.get("username").and_then(Value::as_str)
    }
}
