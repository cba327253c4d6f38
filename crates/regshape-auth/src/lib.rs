//! Authentication resolution for OCI registries.
//!
//! This crate turns a registry's `WWW-Authenticate` challenge into a ready
//! `Authorization` header value:
//!
//! - Challenge parsing (`Basic`, `Bearer`, anything else is rejected)
//! - Bearer token exchange against the challenge's realm
//! - Basic auth encoding
//! - Credential lookup through external credential helpers
//!   (`credential-<store> list|get|store|erase`)
//!
//! # Quick Start
//!
//! ```no_run
//! use regshape_auth::{AuthConfig, AuthResolver, Credentials};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let resolver = AuthResolver::new(&AuthConfig::from_env())?;
//!
//! let challenge = r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/alpine:pull""#;
//! let authorization = resolver.resolve(challenge, None).await?;
//! println!("Authorization: {}", authorization);
//!
//! let basic = resolver
//!     .resolve(r#"Basic realm="Registry""#, Some(&Credentials::new("u", "p")))
//!     .await?;
//! assert_eq!(basic, "Basic dTpw");
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `REGSHAPE_CREDENTIAL_STORE` | Credential store identifier (default: client config, then `desktop`) |
//! | `REGSHAPE_HELPER_PREFIX` | Helper executable prefix (default: `credential-`) |
//! | `REGSHAPE_HELPER_TIMEOUT` | Helper timeout in seconds (default: 30) |
//! | `REGSHAPE_HTTP_TIMEOUT` | Token request timeout in seconds (default: none) |
//! | `REGSHAPE_TRACK_EXECUTION_TIME` | Log execution time of each step |
//! | `REGSHAPE_CONFIG` | Alternate client config file |

pub mod challenge;
pub mod credstore;
pub mod dockerconfig;
pub mod error;
pub mod probe;
pub mod resolver;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main types
pub use challenge::{Challenge, Scheme};
pub use credstore::{CredentialStore, HelperStore, HelperVerb, StoreBackend, DEFAULT_HELPER_PREFIX};
pub use dockerconfig::{ClientConfigFile, DEFAULT_STORE};
pub use error::{AuthError, AuthResult, Stage};
pub use probe::{registry_api_url, registry_host, RegistryProbe};
pub use resolver::{get_basic_auth, AuthResolver};
pub use telemetry::Instrumentation;
pub use token::{BearerTokenExchanger, REGSHAPE_USER_AGENT};
pub use types::{AuthConfig, CredentialListEntry, Credentials, StoredCredential, TokenResponse};
