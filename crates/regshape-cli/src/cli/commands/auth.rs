use clap::Args;
use regshape_auth::{AuthConfig, AuthResolver, Credentials, RegistryProbe};

use super::registry_target;
use crate::exit_codes::SUCCESS;

#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Registry host or reference
    pub registry: String,

    /// Endpoint to probe instead of `/v2/`
    #[arg(long)]
    pub url: Option<String>,

    /// Username (skips the credential store; requires --password)
    #[arg(short, long, requires = "password")]
    pub username: Option<String>,

    /// Password or token
    #[arg(short, long, requires = "username")]
    pub password: Option<String>,

    /// Talk to the registry over plain HTTP
    #[arg(long)]
    pub plain_http: bool,
}

/// Print the `Authorization` value the registry's challenge resolves to.
pub async fn run(args: AuthArgs, config: &AuthConfig) -> anyhow::Result<i32> {
    let (host, api_url) = registry_target(&args.registry, args.plain_http)?;
    let url = args.url.unwrap_or(api_url);

    let credentials = match (args.username, args.password) {
        (Some(username), Some(password)) => Some(Credentials::new(username, password)),
        _ => None,
    };

    let resolver = AuthResolver::from_config(config, Some(&host))?;
    let probe = RegistryProbe::new(resolver, config.http_timeout())?;

    match probe.authenticate(&url, credentials.as_ref()).await? {
        Some(authorization) => println!("{}", authorization),
        None => eprintln!("{} does not require authentication", host),
    }
    Ok(SUCCESS)
}
