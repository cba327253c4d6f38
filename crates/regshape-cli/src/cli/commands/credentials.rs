use clap::Subcommand;
use regshape_auth::{AuthConfig, CredentialStore};

use super::open_store;
use crate::exit_codes::SUCCESS;

#[derive(Subcommand, Debug)]
pub enum CredentialsCmd {
    /// List registries with saved credentials
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(cmd: CredentialsCmd, config: &AuthConfig) -> anyhow::Result<i32> {
    match cmd {
        CredentialsCmd::List { json } => list(config, json).await,
    }
}

async fn list(config: &AuthConfig, json: bool) -> anyhow::Result<i32> {
    let store = open_store(config, None)?;
    let entries = store.list().await?;

    if json {
        let map: serde_json::Map<String, serde_json::Value> = entries
            .into_iter()
            .map(|e| (e.server_url, serde_json::Value::String(e.username)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(SUCCESS);
    }

    if entries.is_empty() {
        eprintln!("No credentials in store {}", store.backend().id());
        return Ok(SUCCESS);
    }

    let width = entries
        .iter()
        .map(|e| e.server_url.len())
        .max()
        .unwrap_or(0)
        .max("REGISTRY".len());
    println!("{:<width$}  USERNAME", "REGISTRY", width = width);
    for entry in entries {
        println!("{:<width$}  {}", entry.server_url, entry.username, width = width);
    }
    Ok(SUCCESS)
}
