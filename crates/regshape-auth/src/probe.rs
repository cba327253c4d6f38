//! Registry probe: the first request of the token-auth flow.
//!
//! `GET <url>` anonymously; a 401 carrying `WWW-Authenticate` is handed to the
//! resolver, a 2xx means no authentication is needed, anything else fails.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::challenge::{Challenge, Scheme};
use crate::error::{AuthError, AuthResult};
use crate::resolver::AuthResolver;
use crate::token::{build_client, excerpt};
use crate::types::Credentials;

/// Canonical `host[:port]` of a registry reference, used as the credential
/// store key.
///
/// Accepts `https://host:port/path`, `host:port/path` and bare hosts.
pub fn registry_host(reference: &str) -> AuthResult<String> {
    let reference = reference.trim();
    let invalid = |reason: &str| AuthError::Config {
        message: format!("invalid registry reference {:?}: {}", reference, reason),
    };

    if reference.contains("://") {
        let url = Url::parse(reference).map_err(|e| invalid(&e.to_string()))?;
        let host = url.host_str().ok_or_else(|| invalid("no host"))?;
        return Ok(match url.port() {
            Some(port) => format!("{}:{}", host.to_ascii_lowercase(), port),
            None => host.to_ascii_lowercase(),
        });
    }

    let host = reference.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(invalid("no host"));
    }
    Ok(host.to_ascii_lowercase())
}

/// API base URL (`https://<host>/v2/`) for a registry reference.
pub fn registry_api_url(reference: &str) -> AuthResult<String> {
    Ok(format!("https://{}/v2/", registry_host(reference)?))
}

/// Probes registry endpoints and resolves their challenges.
#[derive(Debug, Clone)]
pub struct RegistryProbe {
    client: reqwest::Client,
    resolver: AuthResolver,
}

impl RegistryProbe {
    pub fn new(resolver: AuthResolver, timeout: Option<Duration>) -> AuthResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            resolver,
        })
    }

    pub fn resolver(&self) -> &AuthResolver {
        &self.resolver
    }

    /// Probe `url`; `Ok(None)` when the registry needs no authentication,
    /// otherwise the `Authorization` value answering its challenge.
    pub async fn authenticate(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> AuthResult<Option<String>> {
        let server_url = registry_host(url)?;
        debug!(url, server_url = %server_url, "probing registry");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(url, status = status.as_u16(), "registry allows anonymous access");
            return Ok(None);
        }

        if status != StatusCode::UNAUTHORIZED {
            let body = read_body(response).await;
            return Err(AuthError::TokenExchangeFailed {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("unexpected probe status {}: {}", status.as_u16(), excerpt(&body)),
            });
        }

        let header = select_challenge(response.headers()).ok_or_else(|| {
            AuthError::MalformedChallenge {
                header: String::new(),
                reason: format!("{} answered 401 without a usable WWW-Authenticate header", url),
            }
        })?;

        let value = self
            .resolver
            .resolve_for(&server_url, &header, credentials)
            .await?;
        Ok(Some(value))
    }

    /// Retry `url` with `authorization` attached; succeeds on 2xx.
    pub async fn verify(&self, url: &str, authorization: &str) -> AuthResult<()> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let body = read_body(response).await;
        let message = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                format!("registry rejected credentials: {}", excerpt(&body))
            }
            _ => format!("HTTP {}: {}", status.as_u16(), excerpt(&body)),
        };
        Err(AuthError::TokenExchangeFailed {
            url: url.to_string(),
            status: Some(status.as_u16()),
            message,
        })
    }
}

/// Body text for an error message; empty when it cannot be read.
async fn read_body(response: reqwest::Response) -> String {
    let url = response.url().to_string();
    response.text().await.unwrap_or_else(|e| {
        debug!(url = %url, error = %e, "failed to read registry response body");
        String::new()
    })
}

/// First challenge with a resolvable scheme, else the first one present.
fn select_challenge(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let values: Vec<String> = headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(String::from)
        .collect();

    values
        .iter()
        .find(|v| {
            Challenge::parse(v)
                .map(|c| !matches!(c.scheme(), Scheme::Unknown(_)))
                .unwrap_or(false)
        })
        .or_else(|| values.first())
        .cloned()
}
