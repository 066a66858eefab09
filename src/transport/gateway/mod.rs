//! Axum gateway for the chat platform.
//!
//! - `POST /service/webhook` accepts a chat message and registers a stream
//! - `GET /service/stream/{stream_id}` relays that stream to one reader
//! - `GET /health` answers liveness checks
//!
//! Short requests get a 64KB body limit and a 30s timeout. Stream
//! connections are long-lived and bounded by the relay deadline instead.

mod base_url;
mod handlers;
mod server;
mod webhook;

pub use base_url::{BaseUrlQuery, resolve_base_url};
pub use server::{build_app, run_gateway, run_gateway_with_listener};
pub use webhook::{SenderProfile, WebhookForm};

use crate::Config;
use crate::core::buffer::{MemoryStreamStore, StreamBuffer};
use crate::core::conversations::ChatStore;
use crate::core::invoker::InferenceClient;
use crate::core::relay::RelaySettings;
use crate::core::run::RunDriver;
use crate::transport::channels::PlatformConnector;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Timeout for non-streaming requests (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub buffer: StreamBuffer,
    pub store: Arc<dyn ChatStore>,
    pub connector: Arc<dyn PlatformConnector>,
    pub runs: RunDriver,
    pub relay: RelaySettings,
}

impl AppState {
    /// Wire the stream buffer, inference client and run driver from config.
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ChatStore>,
        connector: Arc<dyn PlatformConnector>,
    ) -> Result<Self> {
        let buffer = StreamBuffer::new(
            Arc::new(MemoryStreamStore::new()),
            config.stream.buffer_ttls(),
        );
        let inference = InferenceClient::new(
            config.inference.endpoint(),
            config.inference.request_timeout(),
        )
        .context("build inference client")?
        .with_retry(config.inference.max_retries, config.inference.retry_delay());
        let runs = RunDriver::new(
            buffer.clone(),
            Arc::clone(&store),
            Arc::clone(&connector),
            inference,
            config.stream.compression_interval(),
        );
        Ok(Self {
            relay: config.stream.relay_settings(),
            config,
            buffer,
            store,
            connector,
            runs,
        })
    }
}
