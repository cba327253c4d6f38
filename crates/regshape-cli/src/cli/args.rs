use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "regshape",
    version,
    about = "Authenticate against OCI registries with credential-store helpers"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Credential store identifier; the helper run is `credential-<store>`
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Alternate client config file (default: $DOCKER_CONFIG/config.json, ~/.docker/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log how long each resolution step takes
    #[arg(long, global = true)]
    pub track_time: bool,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Log in to a registry and save the credentials in the credential store
    Login(super::commands::login::LoginArgs),
    /// Remove a registry's credentials from the credential store
    Logout(super::commands::logout::LogoutArgs),
    /// Inspect the credential store
    Credentials(CredentialsArgs),
    /// Print the Authorization header value a registry URL requires
    Auth(super::commands::auth::AuthArgs),
}

#[derive(Parser, Debug)]
pub struct CredentialsArgs {
    #[command(subcommand)]
    pub cmd: super::commands::credentials::CredentialsCmd,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "regshape",
            "logout",
            "ghcr.io",
            "--store",
            "osxkeychain",
            "--track-time",
        ])
        .unwrap();
        assert_eq!(cli.global.store.as_deref(), Some("osxkeychain"));
        assert!(cli.global.track_time);
        assert!(matches!(cli.cmd, Command::Logout(_)));
    }

    #[test]
    fn test_login_password_flags_conflict() {
        let result = Cli::try_parse_from([
            "regshape",
            "login",
            "ghcr.io",
            "--username",
            "alice",
            "--password",
            "x",
            "--password-stdin",
        ]);
        assert!(result.is_err());
    }
}
