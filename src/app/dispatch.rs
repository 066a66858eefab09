use crate::Config;
use crate::cli::{Cli, Commands};
use crate::platform::daemon::{self, ReconcileOutcome};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load_or_init(),
    }
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let (host, port) = (config.gateway.host.clone(), config.gateway.port);
            if port == 0 {
                info!("Starting dootask-ai on {host} (random port)");
            } else {
                info!("Starting dootask-ai on {host}:{port}");
            }
            daemon::run(Arc::new(config)).await
        }

        Commands::Reconcile => {
            let outcome = daemon::reconcile_once(&config).await?;
            println!("{}", describe_outcome(outcome));
            Ok(())
        }

        Commands::Config => {
            let rendered = toml::to_string_pretty(&config.redacted())
                .context("Failed to render config")?;
            println!("# {}", config.config_path.display());
            println!("{rendered}");
            Ok(())
        }
    }
}

fn describe_outcome(outcome: ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::Unhealthy => "Tool backend unhealthy; nothing changed".into(),
        ReconcileOutcome::AlreadyPresent { tool_id } => {
            format!("Default tool already registered (id {tool_id})")
        }
        ReconcileOutcome::Created => "Default tool registered".into(),
        ReconcileOutcome::LostRace => "Default tool was registered concurrently".into(),
    }
}
