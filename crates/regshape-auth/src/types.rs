//! Credential records, token responses and engine configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AuthError, AuthResult};

/// Username and secret presented to a registry or authorization server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Record exchanged with a credential helper (`get` response, `store` request).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Canonical registry host, the store's lookup key.
    #[serde(rename = "ServerURL")]
    pub server_url: String,

    #[serde(rename = "Username")]
    pub username: String,

    #[serde(rename = "Secret")]
    pub secret: String,
}

impl StoredCredential {
    /// Build a record; the server URL must not be empty.
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> AuthResult<Self> {
        let credential = Self {
            server_url: server_url.into(),
            username: username.into(),
            secret: secret.into(),
        };
        credential.validate()?;
        Ok(credential)
    }

    pub(crate) fn validate(&self) -> AuthResult<()> {
        if self.server_url.trim().is_empty() {
            return Err(AuthError::InvalidCredential {
                message: "server URL must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.secret.clone())
    }
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Entry returned by `list` (no secret).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialListEntry {
    pub server_url: String,
    pub username: String,
}

/// Response from the authorization server's token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for the registry.
    #[serde(default)]
    pub token: String,

    /// Lifetime in seconds; `None` when absent or not a non-negative integer.
    #[serde(default, deserialize_with = "lenient")]
    pub expires_in: Option<u64>,

    /// When the token was issued; `None` when absent or not RFC 3339.
    #[serde(default, deserialize_with = "lenient")]
    pub issued_at: Option<DateTime<Utc>>,

    /// Remaining fields, passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Decode an optional field, treating a value of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Credential store identifier (e.g. `desktop`, `osxkeychain`).
    #[serde(default)]
    pub store: Option<String>,

    /// Prefix joined with the store identifier to name the helper executable.
    #[serde(default = "default_helper_prefix")]
    pub helper_prefix: String,

    /// Upper bound for a single helper invocation, in seconds.
    #[serde(default = "default_helper_timeout")]
    pub helper_timeout_secs: u64,

    /// Optional timeout for token requests, in seconds.
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,

    /// Log execution time of resolution steps.
    #[serde(default)]
    pub track_execution_time: bool,

    /// Alternate client config file.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
}

fn default_helper_prefix() -> String {
    crate::credstore::DEFAULT_HELPER_PREFIX.to_string()
}

fn default_helper_timeout() -> u64 {
    30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            store: None,
            helper_prefix: default_helper_prefix(),
            helper_timeout_secs: default_helper_timeout(),
            http_timeout_secs: None,
            track_execution_time: false,
            config_path: None,
        }
    }
}

impl AuthConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `REGSHAPE_CREDENTIAL_STORE` | Credential store identifier |
    /// | `REGSHAPE_HELPER_PREFIX` | Helper executable prefix (default `credential-`) |
    /// | `REGSHAPE_HELPER_TIMEOUT` | Helper timeout in seconds (default: 30) |
    /// | `REGSHAPE_HTTP_TIMEOUT` | Token request timeout in seconds |
    /// | `REGSHAPE_TRACK_EXECUTION_TIME` | Log execution time of each step |
    /// | `REGSHAPE_CONFIG` | Alternate client config file |
    pub fn from_env() -> Self {
        Self {
            store: std::env::var("REGSHAPE_CREDENTIAL_STORE")
                .ok()
                .filter(|v| !v.is_empty()),
            helper_prefix: std::env::var("REGSHAPE_HELPER_PREFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_helper_prefix),
            helper_timeout_secs: std::env::var("REGSHAPE_HELPER_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_helper_timeout),
            http_timeout_secs: std::env::var("REGSHAPE_HTTP_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok()),
            track_execution_time: std::env::var("REGSHAPE_TRACK_EXECUTION_TIME")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            config_path: std::env::var_os("REGSHAPE_CONFIG").map(PathBuf::from),
        }
    }

    /// Set the credential store identifier.
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    /// Set the helper executable prefix.
    pub fn with_helper_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.helper_prefix = prefix.into();
        self
    }

    /// Set the alternate client config file.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Enable or disable execution-time tracking.
    pub fn with_track_execution_time(mut self, enabled: bool) -> Self {
        self.track_execution_time = enabled;
        self
    }

    pub fn helper_timeout(&self) -> Duration {
        Duration::from_secs(self.helper_timeout_secs)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}
