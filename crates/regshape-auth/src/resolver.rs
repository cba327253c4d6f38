//! Resolution of a challenge into an `Authorization` header value.

use std::sync::Arc;

use base64::Engine;
use tracing::debug;

use crate::challenge::{Challenge, Scheme};
use crate::credstore::{CredentialStore, HelperStore};
use crate::dockerconfig::ClientConfigFile;
use crate::error::{AuthError, AuthResult};
use crate::telemetry::Instrumentation;
use crate::token::BearerTokenExchanger;
use crate::types::{AuthConfig, Credentials};

/// RFC 7617 encoding of `username:password` (standard alphabet, padded).
pub fn get_basic_auth(username: &str, password: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password))
}

/// Turns challenges into ready-to-use `Authorization` header values.
///
/// Holds no per-call state: every call parses, optionally consults the
/// credential store, and exchanges afresh. Token reuse is up to the caller.
#[derive(Clone)]
pub struct AuthResolver {
    exchanger: BearerTokenExchanger,
    store: Option<Arc<dyn CredentialStore>>,
    instrumentation: Instrumentation,
}

impl std::fmt::Debug for AuthResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResolver")
            .field("exchanger", &self.exchanger)
            .field("has_store", &self.store.is_some())
            .field("instrumentation", &self.instrumentation)
            .finish()
    }
}

impl AuthResolver {
    /// Resolver without a credential store.
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let instrumentation = Instrumentation::new(config.track_execution_time);
        let exchanger = BearerTokenExchanger::new(config.http_timeout(), instrumentation)?;
        Ok(Self::with_exchanger(exchanger, instrumentation))
    }

    pub fn with_exchanger(exchanger: BearerTokenExchanger, instrumentation: Instrumentation) -> Self {
        Self {
            exchanger,
            store: None,
            instrumentation,
        }
    }

    /// Resolver whose store is the helper named by `config.store`, or else by
    /// the client config file (`credHelpers` for `registry`, then
    /// `credsStore`), or else `desktop`.
    pub fn from_config(config: &AuthConfig, registry: Option<&str>) -> AuthResult<Self> {
        let client_config = ClientConfigFile::discover(config.config_path.as_deref())?;
        let store_id = client_config.store_for(config.store.as_deref(), registry);
        debug!(store = %store_id, registry = ?registry, "using credential store");

        let store = HelperStore::from_config(&store_id, config)?;
        Ok(Self::new(config)?.with_store(Arc::new(store)))
    }

    /// Attach a credential store consulted by [`AuthResolver::resolve_for`].
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> Option<&Arc<dyn CredentialStore>> {
        self.store.as_ref()
    }

    /// Resolve `header` with the supplied credentials only.
    pub async fn resolve(
        &self,
        header: &str,
        credentials: Option<&Credentials>,
    ) -> AuthResult<String> {
        self.instrumentation
            .timed("resolve", self.resolve_inner(header, credentials))
            .await
    }

    /// Resolve `header` for `server_url`, falling back to the credential store
    /// when no credentials are supplied.
    pub async fn resolve_for(
        &self,
        server_url: &str,
        header: &str,
        credentials: Option<&Credentials>,
    ) -> AuthResult<String> {
        let challenge = Challenge::parse(header)?;
        if let Scheme::Unknown(scheme) = challenge.scheme() {
            return Err(AuthError::UnsupportedScheme {
                scheme: scheme.clone(),
            });
        }

        match (credentials, &self.store) {
            (Some(credentials), _) => self.resolve(header, Some(credentials)).await,
            (None, Some(store)) => {
                let stored = store.get(server_url).await?;
                debug!(server_url, found = stored.is_some(), "consulted credential store");
                let credentials = stored.map(|s| s.credentials());
                self.resolve(header, credentials.as_ref()).await
            }
            (None, None) => self.resolve(header, None).await,
        }
    }

    async fn resolve_inner(
        &self,
        header: &str,
        credentials: Option<&Credentials>,
    ) -> AuthResult<String> {
        let challenge = Challenge::parse(header)?;

        match challenge.scheme() {
            Scheme::Basic => {
                let credentials = credentials.ok_or_else(|| AuthError::MissingCredentials {
                    scheme: Scheme::Basic.to_string(),
                })?;
                debug!(username = %credentials.username, "resolved basic authorization");
                Ok(format!(
                    "Basic {}",
                    get_basic_auth(&credentials.username, &credentials.secret)
                ))
            }
            Scheme::Bearer => {
                let response = self.exchanger.exchange(&challenge, credentials).await?;
                debug!(expires_in = ?response.expires_in, "resolved bearer authorization");
                Ok(format!("Bearer {}", response.token))
            }
            Scheme::Unknown(scheme) => Err(AuthError::UnsupportedScheme {
                scheme: scheme.clone(),
            }),
        }
    }
}
