use crate::config::Config;
use crate::core::conversations::SqliteChatStore;
use crate::transport::channels::DooTaskConnector;
use crate::transport::gateway::AppState;
use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::task::JoinHandle;

mod reconcile;
mod supervisor;

pub use reconcile::{DefaultToolReconciler, ReconcileOutcome};
pub use supervisor::RestartPolicy;

use supervisor::spawn_components;

/// Open the SQLite pool and make sure the schema exists.
pub async fn open_store(config: &Config) -> Result<Arc<SqliteChatStore>> {
    let url = config.database_url();
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections.max(1))
        .connect(&url)
        .await
        .with_context(|| format!("open database {url}"))?;
    let store = SqliteChatStore::new(pool)
        .await
        .context("prepare chat schema")?;
    Ok(Arc::new(store))
}

/// Gateway and reconciler under restart supervision until Ctrl-C.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let store = open_store(&config).await?;
    let connector = Arc::new(
        DooTaskConnector::new(config.dootask.base_url.clone())
            .context("build platform client")?,
    );
    let state = AppState::new(Arc::clone(&config), store, connector)?;

    let handles: Vec<JoinHandle<()>> = spawn_components(&state, RestartPolicy::default());

    println!("◆ {}", t!("daemon.started"));
    println!(
        "   {}",
        t!(
            "daemon.gateway_addr",
            host = config.gateway.host,
            port = config.gateway.port
        )
    );
    println!("   {}", t!("daemon.stop_hint"));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    for handle in &handles {
        handle.abort();
    }
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

/// A single reconciliation pass, for the `reconcile` command.
pub async fn reconcile_once(config: &Config) -> Result<ReconcileOutcome> {
    let store = open_store(config).await?;
    DefaultToolReconciler::new(store, config.default_tool.clone())?
        .reconcile_once()
        .await
}
