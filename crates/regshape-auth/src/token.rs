//! Bearer token exchange against a challenge's realm.
//!
//! Implements the token request of the distribution token-auth flow:
//! `GET <realm>?service=<service>[&scope=<scope>]`, with the client's
//! credentials as HTTP Basic auth when available.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::challenge::{Challenge, Scheme};
use crate::error::{AuthError, AuthResult};
use crate::telemetry::Instrumentation;
use crate::types::{Credentials, TokenResponse};

/// User agent sent on every outbound request.
pub const REGSHAPE_USER_AGENT: &str = concat!("regshape/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt kept in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

/// Performs the realm/service/scope token request.
#[derive(Debug, Clone)]
pub struct BearerTokenExchanger {
    client: reqwest::Client,
    instrumentation: Instrumentation,
}

impl BearerTokenExchanger {
    pub fn new(timeout: Option<Duration>, instrumentation: Instrumentation) -> AuthResult<Self> {
        Ok(Self::with_client(build_client(timeout)?, instrumentation))
    }

    pub fn with_client(client: reqwest::Client, instrumentation: Instrumentation) -> Self {
        Self {
            client,
            instrumentation,
        }
    }

    /// Request a token for `challenge`.
    ///
    /// Anonymous when `credentials` is `None`. Nothing is retried.
    pub async fn exchange(
        &self,
        challenge: &Challenge,
        credentials: Option<&Credentials>,
    ) -> AuthResult<TokenResponse> {
        if challenge.scheme() != &Scheme::Bearer {
            return Err(AuthError::UnsupportedScheme {
                scheme: challenge.scheme().to_string(),
            });
        }

        let realm = challenge.realm().ok_or(AuthError::MissingRealm)?;
        let service = challenge.service().ok_or(AuthError::MissingService)?;

        self.instrumentation
            .timed(
                "token_exchange",
                self.request_token(realm, service, challenge.scope(), credentials),
            )
            .await
    }

    async fn request_token(
        &self,
        realm: &str,
        service: &str,
        scope: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> AuthResult<TokenResponse> {
        let url = Url::parse(realm).map_err(|e| AuthError::TokenExchangeFailed {
            url: realm.to_string(),
            status: None,
            message: format!("invalid realm URL: {}", e),
        })?;

        let mut query = vec![("service", service)];
        if let Some(scope) = scope {
            query.push(("scope", scope));
        }

        debug!(realm = %url, service, scope = ?scope, authenticated = credentials.is_some(), "requesting bearer token");

        let mut request = self.client.get(url).query(&query);
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.secret));
        }

        let response = request.send().await.map_err(|e| AuthError::TokenExchangeFailed {
            url: realm.to_string(),
            status: None,
            message: e.to_string(),
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed {
                url: realm.to_string(),
                status: Some(status.as_u16()),
                message: format!("failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            return Err(AuthError::TokenExchangeFailed {
                url: realm.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status.as_u16(), excerpt(&body)),
            });
        }

        decode_token_response(realm, &body)
    }
}

pub(crate) fn build_client(timeout: Option<Duration>) -> AuthResult<reqwest::Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(USER_AGENT, HeaderValue::from_static(REGSHAPE_USER_AGENT));

    let mut builder = reqwest::Client::builder().default_headers(default_headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder.build().map_err(|e| AuthError::Config {
        message: format!("failed to create HTTP client: {}", e),
    })
}

/// Decode a token endpoint body; the `token` field must be present and non-empty.
pub(crate) fn decode_token_response(realm: &str, body: &str) -> AuthResult<TokenResponse> {
    let response: TokenResponse =
        serde_json::from_str(body).map_err(|e| AuthError::TokenDecode {
            realm: realm.to_string(),
            message: format!("invalid JSON: {}", e),
        })?;

    if response.token.is_empty() {
        return Err(AuthError::TokenDecode {
            realm: realm.to_string(),
            message: "response has no token".to_string(),
        });
    }

    Ok(response)
}

pub(crate) fn excerpt(body: &str) -> String {
    if body.is_empty() {
        "empty body".to_string()
    } else {
        body.chars().take(BODY_EXCERPT_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_token_response() {
        let response =
            decode_token_response("https://auth.example/token", r#"{"token":"abc123"}"#).unwrap();
        assert_eq!(response.token, "abc123");
    }

    #[test]
    fn test_decode_rejects_missing_or_empty_token() {
        for body in [r#"{}"#, r#"{"token":""}"#, r#"{"access_token":"x"}"#] {
            let result = decode_token_response("https://auth.example/token", body);
            assert!(
                matches!(result, Err(AuthError::TokenDecode { .. })),
                "body {} should be rejected",
                body
            );
        }
    }

    #[tokio::test]
    async fn test_exchange_accepts_loosely_typed_fields() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"token":"abc","expires_in":"300"}"#),
            )
            .mount(&server)
            .await;

        let exchanger = BearerTokenExchanger::new(None, Instrumentation::default()).unwrap();
        let challenge = Challenge::parse(&format!(
            "Bearer realm=\"{}/token\",service=\"svc\"",
            server.uri()
        ))
        .unwrap();

        let response = exchanger.exchange(&challenge, None).await.unwrap();
        assert_eq!(response.token, "abc");
        assert_eq!(response.expires_in, None);
    }

    #[test]
    fn test_decode_tolerates_bad_issued_at() {
        let response = decode_token_response(
            "https://auth.example/token",
            r#"{"token":"abc","expires_in":-1,"issued_at":"2024-01-01 00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(response.token, "abc");
        assert!(response.issued_at.is_none());
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let result = decode_token_response("https://auth.example/token", "<html>oops</html>");
        assert!(matches!(result, Err(AuthError::TokenDecode { .. })));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(1000);
        assert_eq!(excerpt(&long).len(), BODY_EXCERPT_CHARS);
        assert_eq!(excerpt(""), "empty body");
    }

    #[tokio::test]
    async fn test_exchange_requires_realm_and_service() {
        let exchanger = BearerTokenExchanger::new(None, Instrumentation::default()).unwrap();

        let no_realm = Challenge::parse("Bearer service=\"svc\"").unwrap();
        assert!(matches!(
            exchanger.exchange(&no_realm, None).await,
            Err(AuthError::MissingRealm)
        ));

        let no_service = Challenge::parse("Bearer realm=\"https://auth.example/token\"").unwrap();
        assert!(matches!(
            exchanger.exchange(&no_service, None).await,
            Err(AuthError::MissingService)
        ));
    }

    #[tokio::test]
    async fn test_exchange_rejects_basic_challenge() {
        let exchanger = BearerTokenExchanger::new(None, Instrumentation::default()).unwrap();
        let challenge = Challenge::parse("Basic realm=\"Registry\"").unwrap();
        assert!(matches!(
            exchanger.exchange(&challenge, None).await,
            Err(AuthError::UnsupportedScheme { .. })
        ));
    }

    #[tokio::test]
    async fn test_exchange_invalid_realm_url() {
        let exchanger = BearerTokenExchanger::new(None, Instrumentation::default()).unwrap();
        let challenge = Challenge::parse("Bearer realm=\"not a url\",service=\"svc\"").unwrap();
        assert!(matches!(
            exchanger.exchange(&challenge, None).await,
            Err(AuthError::TokenExchangeFailed { status: None, .. })
        ));
    }
}
