use super::reconcile::DefaultToolReconciler;
use crate::transport::gateway::AppState;
use anyhow::Result;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Restart behaviour for a supervised component.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive failures tolerated before giving up. 0 means unlimited.
    pub max_restarts: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            max_restarts: 10,
        }
    }
}

impl RestartPolicy {
    fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff.max(self.initial_backoff))
    }
}

/// Run `component` in a loop, restarting it with exponential backoff when it
/// fails or returns.
pub(super) fn spawn_supervised<F, Fut>(
    name: &'static str,
    policy: RestartPolicy,
    mut component: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut backoff = policy.initial_backoff;
        let mut failures: u32 = 0;

        loop {
            tracing::info!(component = name, "starting");
            match component().await {
                Ok(()) => {
                    tracing::warn!(component = name, "exited unexpectedly");
                    backoff = policy.initial_backoff;
                }
                Err(e) => tracing::error!(component = name, "failed: {e:#}"),
            }
            failures = failures.saturating_add(1);

            if policy.max_restarts > 0 && failures > policy.max_restarts {
                tracing::error!(
                    component = name,
                    max_restarts = policy.max_restarts,
                    "restart limit reached, giving up"
                );
                break;
            }
            tokio::time::sleep(backoff).await;
            backoff = policy.next_backoff(backoff);
        }
    })
}

/// Gateway plus, when enabled, the default-tool reconciler.
pub(super) fn spawn_components(state: &AppState, policy: RestartPolicy) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    let gateway_state = state.clone();
    handles.push(spawn_supervised("gateway", policy, move || {
        let state = gateway_state.clone();
        async move {
            let host = state.config.gateway.host.clone();
            let port = state.config.gateway.port;
            crate::transport::gateway::run_gateway(&host, port, state).await
        }
    }));

    if state.config.default_tool.enabled {
        let store = state.store.clone();
        let tool_config = state.config.default_tool.clone();
        handles.push(spawn_supervised("default-tool", policy, move || {
            let reconciler = DefaultToolReconciler::new(store.clone(), tool_config.clone());
            async move { reconciler?.run().await }
        }));
    } else {
        tracing::info!("default tool reconciliation disabled");
    }

    handles
}
