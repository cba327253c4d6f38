//! Discovery of the Docker-compatible client config file.
//!
//! Search order (first existing file wins):
//!
//! 1. explicit alternate path
//! 2. `$DOCKER_CONFIG/config.json`
//! 3. `~/.docker/config.json`
//!
//! Only the credential-store settings are read (`credsStore`, `credHelpers`);
//! everything else in the file is ignored.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Store used when nothing else names one.
pub const DEFAULT_STORE: &str = "desktop";

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_DIR_NAME: &str = ".docker";

/// Credential-store settings from the client config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfigFile {
    /// File the settings were read from; `None` when no file was found.
    #[serde(skip)]
    pub path: Option<PathBuf>,

    /// Default store for every registry.
    #[serde(rename = "credsStore", default)]
    pub creds_store: Option<String>,

    /// Per-registry store overrides.
    #[serde(rename = "credHelpers", default)]
    pub cred_helpers: HashMap<String, String>,
}

impl ClientConfigFile {
    /// Find and load the client config file from the standard locations.
    ///
    /// A missing file is not an error; an unreadable or invalid one is.
    pub fn discover(alternate: Option<&Path>) -> AuthResult<Self> {
        let candidates = candidate_paths(
            alternate,
            std::env::var_os("DOCKER_CONFIG"),
            dirs::home_dir(),
        );

        for path in candidates {
            debug!(path = %path.display(), "trying client config path");
            if path.is_file() {
                debug!(path = %path.display(), "found client config file");
                return Self::load(&path);
            }
        }

        debug!("client config file not found");
        Ok(Self::default())
    }

    /// Load a specific file.
    pub fn load(path: &Path) -> AuthResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AuthError::Config {
            message: format!("cannot read client config {}: {}", path.display(), e),
        })?;

        let mut config: Self = serde_json::from_str(&contents).map_err(|e| AuthError::Config {
            message: format!("cannot parse client config {}: {}", path.display(), e),
        })?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Store identifier for `registry`.
    ///
    /// Precedence: `explicit` → `credHelpers[registry]` → `credsStore` → `desktop`.
    pub fn store_for(&self, explicit: Option<&str>, registry: Option<&str>) -> String {
        explicit
            .filter(|s| !s.is_empty())
            .or_else(|| {
                registry
                    .and_then(|r| self.cred_helpers.get(r))
                    .map(String::as_str)
            })
            .or(self.creds_store.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(DEFAULT_STORE)
            .to_string()
    }
}

/// Candidate locations in search order.
fn candidate_paths(
    alternate: Option<&Path>,
    docker_config_dir: Option<OsString>,
    home: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(alternate) = alternate {
        paths.push(alternate.to_path_buf());
    }
    if let Some(dir) = docker_config_dir.filter(|d| !d.is_empty()) {
        paths.push(PathBuf::from(dir).join(CONFIG_FILE_NAME));
    }
    if let Some(home) = home {
        paths.push(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_candidate_order() {
        let paths = candidate_paths(
            Some(Path::new("/tmp/alt.json")),
            Some(OsString::from("/etc/docker-cfg")),
            Some(PathBuf::from("/home/alice")),
        );
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/tmp/alt.json"),
                PathBuf::from("/etc/docker-cfg/config.json"),
                PathBuf::from("/home/alice/.docker/config.json"),
            ]
        );
    }

    #[test]
    fn test_candidate_skips_empty_docker_config() {
        let paths = candidate_paths(None, Some(OsString::new()), None);
        assert!(paths.is_empty());
    }

    #[test]
    fn test_load_reads_store_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"auths":{},"credsStore":"osxkeychain","credHelpers":{"gcr.io":"gcloud"}}"#,
        )
        .unwrap();

        let config = ClientConfigFile::load(&path).unwrap();
        assert_eq!(config.path.as_deref(), Some(path.as_path()));
        assert_eq!(config.creds_store.as_deref(), Some("osxkeychain"));
        assert_eq!(config.store_for(None, Some("gcr.io")), "gcloud");
        assert_eq!(config.store_for(None, Some("ghcr.io")), "osxkeychain");
        assert_eq!(config.store_for(Some("pass"), Some("gcr.io")), "pass");
    }

    #[test]
    fn test_load_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            ClientConfigFile::load(&path),
            Err(AuthError::Config { .. })
        ));
    }

    #[test]
    fn test_default_store() {
        assert_eq!(ClientConfigFile::default().store_for(None, None), "desktop");
        assert_eq!(
            ClientConfigFile::default().store_for(Some(""), None),
            "desktop"
        );
    }

    #[test]
    #[serial]
    fn test_discover_prefers_alternate_path() {
        let dir = tempfile::tempdir().unwrap();
        let alternate = dir.path().join("alt.json");
        std::fs::write(&alternate, r#"{"credsStore":"secretservice"}"#).unwrap();

        let env_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            env_dir.path().join("config.json"),
            r#"{"credsStore":"desktop"}"#,
        )
        .unwrap();
        std::env::set_var("DOCKER_CONFIG", env_dir.path());

        let config = ClientConfigFile::discover(Some(&alternate));
        let from_env = ClientConfigFile::discover(Some(&dir.path().join("missing.json")));
        std::env::remove_var("DOCKER_CONFIG");

        assert_eq!(config.unwrap().creds_store.as_deref(), Some("secretservice"));
        assert_eq!(from_env.unwrap().creds_store.as_deref(), Some("desktop"));
    }
}
