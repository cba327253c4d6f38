use std::io::BufRead;

use anyhow::Context;
use clap::Args;
use regshape_auth::{
    AuthConfig, AuthResolver, CredentialStore, Credentials, RegistryProbe, StoredCredential,
};

use super::{open_store, registry_target};
use crate::exit_codes::SUCCESS;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Registry host or reference (e.g. ghcr.io, localhost:5000)
    pub registry: String,

    /// Username
    #[arg(short, long)]
    pub username: String,

    /// Password or token (prompted when omitted)
    #[arg(short, long, conflicts_with = "password_stdin")]
    pub password: Option<String>,

    /// Read the password from stdin
    #[arg(long)]
    pub password_stdin: bool,

    /// Talk to the registry over plain HTTP
    #[arg(long)]
    pub plain_http: bool,
}

pub async fn run(args: LoginArgs, config: &AuthConfig) -> anyhow::Result<i32> {
    let (host, api_url) = registry_target(&args.registry, args.plain_http)?;
    let password = read_password(&args)?;
    let credentials = Credentials::new(&args.username, password.as_str());

    // Explicit credentials: the probe must not fall back to stored ones.
    let resolver = AuthResolver::new(config)?;
    let probe = RegistryProbe::new(resolver, config.http_timeout())?;

    match probe
        .authenticate(&api_url, Some(&credentials))
        .await
        .with_context(|| format!("login to {} failed", host))?
    {
        Some(authorization) => probe
            .verify(&api_url, &authorization)
            .await
            .with_context(|| format!("login to {} failed", host))?,
        None => tracing::warn!(registry = %host, "registry did not ask for authentication"),
    }

    let store = open_store(config, Some(&host))?;
    let credential = StoredCredential::new(host.clone(), args.username.clone(), password)?;
    store
        .store(&credential)
        .await
        .with_context(|| format!("cannot save credentials for {}", host))?;

    eprintln!("Login succeeded ({} via {})", host, store.backend().program());
    Ok(SUCCESS)
}

fn read_password(args: &LoginArgs) -> anyhow::Result<String> {
    if let Some(password) = &args.password {
        tracing::warn!("--password is visible in the process list; prefer --password-stdin");
        return Ok(password.clone());
    }

    if args.password_stdin {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read password from stdin")?;
        let password = line.trim_end_matches(['\r', '\n']).to_string();
        if password.is_empty() {
            anyhow::bail!("empty password on stdin");
        }
        return Ok(password);
    }

    dialoguer::Password::new()
        .with_prompt(format!("Password for {}", args.username))
        .interact()
        .context("failed to read password")
}
