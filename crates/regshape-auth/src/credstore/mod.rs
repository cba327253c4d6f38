//! Credential store client speaking the credential-helper protocol.
//!
//! A helper is an external executable named `<prefix><store>` (by default
//! `credential-desktop`, `credential-osxkeychain`, ...) invoked once per
//! operation as `<program> <verb>`:
//!
//! | Verb | stdin | stdout |
//! |------|-------|--------|
//! | `list` | nothing | `{"<ServerURL>": "<Username>", ...}` |
//! | `get` | server URL | `{"ServerURL", "Username", "Secret"}` or not-found |
//! | `store` | `{"ServerURL", "Username", "Secret"}` | nothing |
//! | `erase` | server URL | nothing |
//!
//! Every request is written in a single write, then stdin is closed.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::telemetry::Instrumentation;
use crate::types::{AuthConfig, CredentialListEntry, StoredCredential};

mod helper;

use helper::{run_helper, HelperOutput};

/// Prefix joined with the store identifier to name the helper executable.
pub const DEFAULT_HELPER_PREFIX: &str = "credential-";

/// Message helpers print (with a non-zero exit) when `get` finds nothing.
const NOT_FOUND_MESSAGE: &str = "credentials not found";

/// Protocol verb passed as the helper's only argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperVerb {
    List,
    Get,
    Store,
    Erase,
}

impl HelperVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Store => "store",
            Self::Erase => "erase",
        }
    }
}

impl fmt::Display for HelperVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named credential helper backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreBackend {
    id: String,
    prefix: String,
}

impl StoreBackend {
    /// Backend with the default `credential-` prefix.
    pub fn new(id: impl Into<String>) -> AuthResult<Self> {
        Self::with_prefix(id, DEFAULT_HELPER_PREFIX)
    }

    /// Backend with a custom prefix (e.g. `docker-credential-`, or an absolute
    /// directory path ending in `credential-`).
    pub fn with_prefix(id: impl Into<String>, prefix: impl Into<String>) -> AuthResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AuthError::Config {
                message: "credential store identifier must not be empty".to_string(),
            });
        }
        if id.contains(['/', '\\']) {
            return Err(AuthError::Config {
                message: format!("credential store identifier {:?} must not be a path", id),
            });
        }
        Ok(Self {
            id,
            prefix: prefix.into(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Executable name, resolved through `PATH` unless the prefix is a path.
    pub fn program(&self) -> String {
        format!("{}{}", self.prefix, self.id)
    }
}

/// Credential store operations, one per protocol verb.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// All stored entries, sorted by server URL.
    async fn list(&self) -> AuthResult<Vec<CredentialListEntry>>;

    /// Credential for `server_url`; `Ok(None)` when the store has none.
    async fn get(&self, server_url: &str) -> AuthResult<Option<StoredCredential>>;

    /// Create or replace the credential for `credential.server_url`.
    async fn store(&self, credential: &StoredCredential) -> AuthResult<()>;

    /// Remove the credential for `server_url`.
    async fn erase(&self, server_url: &str) -> AuthResult<()>;
}

/// Credential store backed by an external helper executable.
#[derive(Debug, Clone)]
pub struct HelperStore {
    backend: StoreBackend,
    timeout: Duration,
    instrumentation: Instrumentation,
}

/// Raw `get` response; fields are checked explicitly.
#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(rename = "ServerURL", default)]
    server_url: Option<String>,
    #[serde(rename = "Username", default)]
    username: Option<String>,
    #[serde(rename = "Secret", default)]
    secret: Option<String>,
}

impl HelperStore {
    pub fn new(backend: StoreBackend) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(30),
            instrumentation: Instrumentation::default(),
        }
    }

    /// Store for `store_id` using the prefix, timeout and instrumentation in `config`.
    pub fn from_config(store_id: &str, config: &AuthConfig) -> AuthResult<Self> {
        let backend = StoreBackend::with_prefix(store_id, config.helper_prefix.clone())?;
        Ok(Self::new(backend)
            .with_timeout(config.helper_timeout())
            .with_instrumentation(Instrumentation::new(config.track_execution_time)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_instrumentation(mut self, instrumentation: Instrumentation) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    pub fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    async fn run(&self, verb: HelperVerb, input: Option<&[u8]>) -> AuthResult<HelperOutput> {
        self.instrumentation
            .timed(verb.as_str(), run_helper(&self.backend, verb, input, self.timeout))
            .await
    }

    fn protocol_error(&self, verb: HelperVerb, message: impl Into<String>) -> AuthError {
        AuthError::Protocol {
            store: self.backend.id().to_string(),
            verb,
            message: message.into(),
        }
    }

    fn execution_error(&self, verb: HelperVerb, output: &HelperOutput) -> AuthError {
        let text = output.combined_text();
        let message = if output.status.success() {
            format!("unexpected output: {}", text)
        } else if text.is_empty() {
            format!("exited with {}", output.status)
        } else {
            format!("exited with {}: {}", output.status, text)
        };
        AuthError::HelperExecution {
            store: self.backend.id().to_string(),
            verb,
            message,
        }
    }

    /// Success with empty stdout; stderr text is logged, not fatal.
    fn expect_json_output<'a>(
        &self,
        verb: HelperVerb,
        output: &'a HelperOutput,
    ) -> AuthResult<&'a [u8]> {
        if !output.status.success() {
            return Err(self.execution_error(verb, output));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(store = %self.backend.id(), verb = %verb, stderr = %stderr.trim(), "credential helper wrote to stderr");
        }
        Ok(&output.stdout)
    }

    /// Success with no output at all.
    fn expect_silence(&self, verb: HelperVerb, output: &HelperOutput) -> AuthResult<()> {
        if !output.status.success() || !output.combined_text().is_empty() {
            return Err(self.execution_error(verb, output));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for HelperStore {
    async fn list(&self) -> AuthResult<Vec<CredentialListEntry>> {
        let verb = HelperVerb::List;
        let output = self.run(verb, None).await?;
        let stdout = self.expect_json_output(verb, &output)?;

        let entries: BTreeMap<String, String> = serde_json::from_slice(stdout)
            .map_err(|e| self.protocol_error(verb, format!("expected a JSON object: {}", e)))?;

        debug!(store = %self.backend.id(), count = entries.len(), "listed credentials");
        Ok(entries
            .into_iter()
            .map(|(server_url, username)| CredentialListEntry {
                server_url,
                username,
            })
            .collect())
    }

    async fn get(&self, server_url: &str) -> AuthResult<Option<StoredCredential>> {
        let verb = HelperVerb::Get;
        let output = self.run(verb, Some(server_url.as_bytes())).await?;

        if !output.status.success() && output.combined_text().contains(NOT_FOUND_MESSAGE) {
            debug!(store = %self.backend.id(), server_url, "no stored credentials");
            return Ok(None);
        }

        let stdout = self.expect_json_output(verb, &output)?;
        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_slice(stdout)
            .map_err(|e| self.protocol_error(verb, format!("invalid JSON: {}", e)))?;
        if value.as_object().is_some_and(|o| o.is_empty()) {
            debug!(store = %self.backend.id(), server_url, "no stored credentials");
            return Ok(None);
        }

        let response: GetResponse = serde_json::from_value(value)
            .map_err(|e| self.protocol_error(verb, format!("unexpected JSON shape: {}", e)))?;

        let username = response
            .username
            .ok_or_else(|| self.protocol_error(verb, "response is missing Username"))?;
        let secret = response
            .secret
            .ok_or_else(|| self.protocol_error(verb, "response is missing Secret"))?;
        let server_url = response
            .server_url
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| server_url.to_string());

        Ok(Some(StoredCredential {
            server_url,
            username,
            secret,
        }))
    }

    async fn store(&self, credential: &StoredCredential) -> AuthResult<()> {
        let verb = HelperVerb::Store;
        credential.validate()?;

        let payload = serde_json::to_vec(credential)
            .map_err(|e| self.protocol_error(verb, format!("failed to encode request: {}", e)))?;

        let output = self.run(verb, Some(&payload)).await?;
        self.expect_silence(verb, &output)?;

        debug!(store = %self.backend.id(), server_url = %credential.server_url, "stored credentials");
        Ok(())
    }

    async fn erase(&self, server_url: &str) -> AuthResult<()> {
        let verb = HelperVerb::Erase;
        let output = self.run(verb, Some(server_url.as_bytes())).await?;
        self.expect_silence(verb, &output)?;

        debug!(store = %self.backend.id(), server_url, "erased credentials");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_naming() {
        let backend = StoreBackend::new("desktop").unwrap();
        assert_eq!(backend.program(), "credential-desktop");

        let backend = StoreBackend::with_prefix("osxkeychain", "docker-credential-").unwrap();
        assert_eq!(backend.program(), "docker-credential-osxkeychain");
    }

    #[test]
    fn test_backend_rejects_empty_or_path_identifier() {
        assert!(matches!(
            StoreBackend::new(""),
            Err(AuthError::Config { .. })
        ));
        assert!(matches!(
            StoreBackend::new("../evil"),
            Err(AuthError::Config { .. })
        ));
    }

    #[test]
    fn test_verb_strings() {
        assert_eq!(HelperVerb::List.to_string(), "list");
        assert_eq!(HelperVerb::Get.to_string(), "get");
        assert_eq!(HelperVerb::Store.to_string(), "store");
        assert_eq!(HelperVerb::Erase.to_string(), "erase");
    }

    #[test]
    fn test_from_config_uses_prefix_and_timeout() {
        let config = AuthConfig {
            helper_prefix: "docker-credential-".to_string(),
            helper_timeout_secs: 3,
            ..AuthConfig::default()
        };
        let store = HelperStore::from_config("pass", &config).unwrap();
        assert_eq!(store.backend().program(), "docker-credential-pass");
        assert_eq!(store.timeout, Duration::from_secs(3));
    }
}
