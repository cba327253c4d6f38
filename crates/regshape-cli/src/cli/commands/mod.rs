use super::args::*;

pub mod auth;
pub mod credentials;
pub mod login;
pub mod logout;

use regshape_auth::{registry_host, AuthConfig, ClientConfigFile, HelperStore};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = build_config(&cli.global);
    match cli.cmd {
        Command::Login(args) => login::run(args, &config).await,
        Command::Logout(args) => logout::run(args, &config).await,
        Command::Credentials(args) => credentials::run(args.cmd, &config).await,
        Command::Auth(args) => auth::run(args, &config).await,
    }
}

/// Environment settings overlaid with the global flags.
pub(crate) fn build_config(global: &GlobalArgs) -> AuthConfig {
    let mut config = AuthConfig::from_env();
    if let Some(store) = &global.store {
        config = config.with_store(store.clone());
    }
    if let Some(path) = &global.config {
        config = config.with_config_path(path);
    }
    if global.track_time {
        config = config.with_track_execution_time(true);
    }
    config
}

/// Credential store that holds `registry`'s credentials.
pub(crate) fn open_store(config: &AuthConfig, registry: Option<&str>) -> anyhow::Result<HelperStore> {
    let client_config = ClientConfigFile::discover(config.config_path.as_deref())?;
    let store_id = client_config.store_for(config.store.as_deref(), registry);
    tracing::debug!(store = %store_id, registry = ?registry, "selected credential store");
    Ok(HelperStore::from_config(&store_id, config)?)
}

/// `(host, api_url)` for a registry argument.
pub(crate) fn registry_target(registry: &str, plain_http: bool) -> anyhow::Result<(String, String)> {
    let host = registry_host(registry)?;
    let scheme = if plain_http { "http" } else { "https" };
    let api_url = format!("{}://{}/v2/", scheme, host);
    Ok((host, api_url))
}
