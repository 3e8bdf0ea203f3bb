pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

/// An Appliance adaptor: document-id feed pusher, SAML 2.0 authn/authz,
/// and the document content handler.
#[derive(Debug, Parser)]
#[command(name = "adaptor-runner", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the adaptor server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with all defaults filled in) as TOML.
    Show,
}

/// Loads the configuration from the path named by `ADAPTOR_CONFIG` (or
/// `config.toml` by default). Unlike the teacher's gateway this config
/// has no sensible all-defaults fallback — `appliance.hostname` and the
/// SAML settings must name a real Appliance and IdP, so a missing file
/// is a startup error rather than an implicit `Config::default()`.
pub fn load_config() -> anyhow::Result<(adaptor_domain::Config, String)> {
    let config_path = std::env::var("ADAPTOR_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let raw = std::fs::read_to_string(&config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    let config = adaptor_domain::Config::from_toml_str(&raw)
        .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?;

    Ok((config, config_path))
}
