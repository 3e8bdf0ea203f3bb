mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use adaptor_domain::{Config, ConfigChangePublisher, InMemoryAdaptor, Journal};
use adaptor_docid::DocIdCodec;
use adaptor_saml::{load_private_key_pem, load_public_key_from_cert_pem};
use adaptor_server::{AppState, Controller, IpAllowList};
use adaptor_sessions::SessionManager;

use cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            run_server(config).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            let passed = cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            let valid = cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("adaptor-runner {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing, matching every event this workspace emits
/// via `TraceEvent::emit` under a single `tracing` field.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let issues = config.validate_report();
    for issue in &issues {
        match issue.severity {
            adaptor_domain::config::ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            adaptor_domain::config::ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues
        .iter()
        .any(|i| i.severity == adaptor_domain::config::ConfigSeverity::Error)
    {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == adaptor_domain::config::ConfigSeverity::Error)
                .count()
        );
    }

    let sp_key_pem = std::fs::read_to_string(&config.saml.sp_key_path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", config.saml.sp_key_path))?;
    let idp_cert_pem = std::fs::read_to_string(&config.saml.idp_cert_path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", config.saml.idp_cert_path))?;
    let saml_sp_key = Arc::new(
        load_private_key_pem(&sp_key_pem).map_err(|e| anyhow::anyhow!("SP private key: {e}"))?,
    );
    let saml_idp_key = Arc::new(
        load_public_key_from_cert_pem(&idp_cert_pem)
            .map_err(|e| anyhow::anyhow!("IdP certificate: {e}"))?,
    );

    let ip_allowlist = Arc::new(build_ip_allowlist(&config).await?);
    let codec = Arc::new(DocIdCodec::new(&config.server.doc_id_path));
    let sessions = Arc::new(SessionManager::new(&config.sessions));
    let journal = Arc::new(Journal::new());
    let adaptor: Arc<dyn adaptor_domain::Adaptor> = Arc::new(InMemoryAdaptor::new());

    let state = AppState {
        config: Arc::new(parking_lot::RwLock::new(Arc::new(config))),
        adaptor,
        codec,
        sessions,
        journal,
        ip_allowlist,
        saml_sp_key,
        saml_idp_key,
    };

    let config_publisher = Arc::new(ConfigChangePublisher::new());
    let controller = Arc::new(Controller::new(state, config_publisher));

    let addr = controller.start().await.map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::info!(%addr, "adaptor-runner started");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install ctrl-c handler: {e}"))?;
    tracing::info!("shutdown signal received");

    controller.stop(std::time::Duration::from_secs(3)).await;
    Ok(())
}

/// Builds the document handler's IP allow-list from
/// `appliance.allowed_source_ips`, optionally widened with whatever
/// `appliance.hostname` resolves to at startup.
async fn build_ip_allowlist(config: &Config) -> anyhow::Result<IpAllowList> {
    let mut entries = config.appliance.allowed_source_ips.clone();

    if config.appliance.resolve_hostname_for_allowlist {
        let lookup = format!("{}:0", config.appliance.hostname);
        match tokio::net::lookup_host(&lookup).await {
            Ok(addrs) => {
                for addr in addrs {
                    entries.push(addr.ip().to_string());
                }
            }
            Err(e) => {
                tracing::warn!(
                    hostname = %config.appliance.hostname,
                    error = %e,
                    "failed to resolve appliance hostname for the IP allow-list"
                );
            }
        }
    }

    IpAllowList::parse(&entries).map_err(|e| anyhow::anyhow!("invalid allowed_source_ips entry: {e}"))
}
