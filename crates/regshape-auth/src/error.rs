//! Error types for authentication resolution.

use std::fmt;

use crate::credstore::HelperVerb;

/// Stage of resolution an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Interpreting the `WWW-Authenticate` challenge or picking a scheme.
    Parsing,
    /// Talking to the authorization server (or probing the registry).
    TokenExchange,
    /// Running the external credential helper.
    CredentialStore,
    /// Loading configuration.
    Configuration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parsing => "challenge parsing",
            Self::TokenExchange => "token exchange",
            Self::CredentialStore => "credential store",
            Self::Configuration => "configuration",
        };
        f.write_str(s)
    }
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `WWW-Authenticate` header could not be parsed.
    #[error("malformed challenge {header:?}: {reason}")]
    MalformedChallenge { header: String, reason: String },

    /// Bearer challenge without a `realm` parameter.
    #[error("bearer challenge is missing the realm parameter")]
    MissingRealm,

    /// Bearer challenge without a `service` parameter.
    #[error("bearer challenge is missing the service parameter")]
    MissingService,

    /// Token endpoint answered with something other than a usable token.
    #[error("invalid token response from {realm}: {message}")]
    TokenDecode { realm: String, message: String },

    /// Token endpoint (or registry probe) could not be reached or refused.
    #[error("token exchange with {url} failed: {message}")]
    TokenExchangeFailed {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Scheme requires credentials but none were supplied or stored.
    #[error("{scheme} authentication requires credentials")]
    MissingCredentials { scheme: String },

    /// Scheme the engine cannot resolve (e.g. `Digest`).
    #[error("unsupported authentication scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    /// Credential helper executable does not exist.
    #[error("credential helper {program} not found (store {store}, {verb})")]
    HelperNotFound {
        store: String,
        verb: HelperVerb,
        program: String,
    },

    /// Credential helper output did not have the expected shape.
    #[error("credential store {store} returned invalid output for {verb}: {message}")]
    Protocol {
        store: String,
        verb: HelperVerb,
        message: String,
    },

    /// Credential helper failed, timed out or printed diagnostics.
    #[error("credential store {store} failed during {verb}: {message}")]
    HelperExecution {
        store: String,
        verb: HelperVerb,
        message: String,
    },

    /// Credential record cannot be handed to a store.
    #[error("invalid credential: {message}")]
    InvalidCredential { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl AuthError {
    /// Stage of resolution that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::MalformedChallenge { .. }
            | Self::MissingRealm
            | Self::MissingService
            | Self::MissingCredentials { .. }
            | Self::UnsupportedScheme { .. } => Stage::Parsing,

            Self::TokenDecode { .. } | Self::TokenExchangeFailed { .. } => Stage::TokenExchange,

            Self::HelperNotFound { .. }
            | Self::Protocol { .. }
            | Self::HelperExecution { .. }
            | Self::InvalidCredential { .. } => Stage::CredentialStore,

            Self::Config { .. } => Stage::Configuration,
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Registry misconfigured
            Self::MalformedChallenge { .. } => 3,
            Self::MissingRealm => 3,
            Self::MissingService => 3,
            Self::UnsupportedScheme { .. } => 3,

            // Credentials missing or rejected
            Self::MissingCredentials { .. } => 4,
            Self::TokenDecode { .. } => 4,
            Self::TokenExchangeFailed { status: Some(401 | 403), .. } => 4,

            // Network/transient
            Self::TokenExchangeFailed { .. } => 5,

            // Helper problems
            Self::HelperNotFound { .. } => 6,
            Self::Protocol { .. } => 6,
            Self::HelperExecution { .. } => 6,
            Self::InvalidCredential { .. } => 6,

            Self::Config { .. } => 2,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::TokenExchangeFailed {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
