//! Keeps the platform's built-in introspection tool registered.

use crate::config::DefaultToolConfig;
use crate::core::conversations::{
    ChatStore, DEFAULT_TOOL_CATEGORY, DEFAULT_TOOL_MCP_NAME, DEFAULT_TOOL_NAME, NewMcpTool,
};
use crate::core::invoker::McpTransport;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;

const DEFAULT_TOOL_DESCRIPTION: &str = "System-created DooTask MCP tool";

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    status: String,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Tool backend not healthy; nothing was touched.
    Unhealthy,
    AlreadyPresent { tool_id: i64 },
    Created,
    /// Another writer inserted the tool between lookup and insert.
    LostRace,
}

pub struct DefaultToolReconciler {
    store: Arc<dyn ChatStore>,
    http: reqwest::Client,
    config: DefaultToolConfig,
}

impl DefaultToolReconciler {
    pub fn new(store: Arc<dyn ChatStore>, config: DefaultToolConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.health_timeout())
            .build()
            .context("build health-check client")?;
        Ok(Self {
            store,
            http,
            config,
        })
    }

    /// `GET` the health URL; healthy means HTTP 200 with `{"status":"ok"}`.
    pub async fn backend_healthy(&self) -> bool {
        let response = match self.http.get(&self.config.health_url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %self.config.health_url, "tool backend health check failed: {e}");
                return false;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            tracing::warn!(
                url = %self.config.health_url,
                status = response.status().as_u16(),
                "tool backend reported unhealthy"
            );
            return false;
        }
        match response.json::<HealthBody>().await {
            Ok(body) => body.status == "ok",
            Err(e) => {
                tracing::warn!(url = %self.config.health_url, "unreadable health response: {e}");
                false
            }
        }
    }

    pub async fn reconcile_once(&self) -> Result<ReconcileOutcome> {
        if !self.backend_healthy().await {
            return Ok(ReconcileOutcome::Unhealthy);
        }

        if let Some(existing) = self
            .store
            .mcp_tool_by_mcp_name(DEFAULT_TOOL_MCP_NAME)
            .await
            .context("look up default tool")?
        {
            tracing::debug!(tool_id = existing.id, "default tool already registered");
            return Ok(ReconcileOutcome::AlreadyPresent {
                tool_id: existing.id,
            });
        }

        let tool = NewMcpTool {
            user_id: 0,
            name: DEFAULT_TOOL_NAME.into(),
            mcp_name: DEFAULT_TOOL_MCP_NAME.into(),
            description: Some(DEFAULT_TOOL_DESCRIPTION.into()),
            category: DEFAULT_TOOL_CATEGORY.into(),
            config_type: McpTransport::StreamableHttp.code(),
            config: serde_json::json!({ "url": self.config.mcp_url }),
            is_active: true,
        };
        let created = self
            .store
            .create_mcp_tool_if_absent(&tool)
            .await
            .context("create default tool")?;
        if created {
            tracing::info!(mcp_name = DEFAULT_TOOL_MCP_NAME, "default tool registered");
            Ok(ReconcileOutcome::Created)
        } else {
            Ok(ReconcileOutcome::LostRace)
        }
    }

    /// One pass now, then one per configured interval. Pass failures are
    /// logged and do not stop the loop.
    pub async fn run(self) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.check_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match self.reconcile_once().await {
                Ok(outcome) => tracing::debug!(?outcome, "default tool reconciliation pass"),
                Err(e) => tracing::warn!("default tool reconciliation failed: {e:#}"),
            }
        }
    }
}
