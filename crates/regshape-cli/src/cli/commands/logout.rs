use anyhow::Context;
use clap::Args;
use regshape_auth::{registry_host, AuthConfig, CredentialStore};

use super::open_store;
use crate::exit_codes::SUCCESS;

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Registry host or reference
    pub registry: String,
}

pub async fn run(args: LogoutArgs, config: &AuthConfig) -> anyhow::Result<i32> {
    let host = registry_host(&args.registry)?;
    let store = open_store(config, Some(&host))?;

    store
        .erase(&host)
        .await
        .with_context(|| format!("cannot remove credentials for {}", host))?;

    eprintln!("Removed credentials for {}", host);
    Ok(SUCCESS)
}
