//! Detached inference runs.
//!
//! A run is started by whichever relay connection wins the stream's claim.
//! It talks to readers only through the stream buffer and always leaves the
//! log ending in exactly one `Done`.

use crate::core::buffer::StreamBuffer;
use crate::core::conversations::ChatStore;
use crate::core::ingest::{IngestEnd, Ingestor, RunSink};
use crate::core::invoker::{InferenceClient, prepare_run};
use crate::core::persistence::MessageRecorder;
use crate::core::session::StreamSession;
use crate::error::{InferenceError, RelayError};
use crate::transport::channels::PlatformConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How a run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Ingested(IngestEnd),
    SetupFailed,
    RequestFailed,
}

/// Everything a run needs besides its session.
#[derive(Clone)]
pub struct RunDriver {
    buffer: StreamBuffer,
    store: Arc<dyn ChatStore>,
    connector: Arc<dyn PlatformConnector>,
    inference: InferenceClient,
    compression_interval: Duration,
}

impl RunDriver {
    pub fn new(
        buffer: StreamBuffer,
        store: Arc<dyn ChatStore>,
        connector: Arc<dyn PlatformConnector>,
        inference: InferenceClient,
        compression_interval: Duration,
    ) -> Self {
        Self {
            buffer,
            store,
            connector,
            inference,
            compression_interval,
        }
    }

    /// Start a run in the background. Nothing waits on the handle.
    pub fn spawn(&self, session: StreamSession) -> JoinHandle<RunOutcome> {
        let driver = self.clone();
        tokio::spawn(async move { driver.execute(session).await })
    }

    pub async fn execute(&self, session: StreamSession) -> RunOutcome {
        let stream_id = session.stream_id.clone();
        tracing::info!(stream_id = %stream_id, dialog_id = session.context.dialog_id, "run started");

        let outcome = self.drive(&session).await;

        if let Err(e) = self.buffer.release_claim(&stream_id).await {
            tracing::warn!(stream_id = %stream_id, "failed to release claim: {e}");
        }
        tracing::info!(stream_id = %stream_id, ?outcome, "run finished");
        outcome
    }

    async fn drive(&self, session: &StreamSession) -> RunOutcome {
        let context = &session.context;
        let platform = self.connector.connect(&context.token);
        let mut sink = RunSink::new(self.buffer.clone(), session, platform.clone());

        let prepared = match prepare_run(self.store.as_ref(), platform.as_ref(), context).await {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!(stream_id = %session.stream_id, "run setup failed: {e}");
                sink.fail(&failure_message(&e, &context.lang)).await;
                return RunOutcome::SetupFailed;
            }
        };
        sink.set_recorder(MessageRecorder::new(
            self.store.clone(),
            prepared.agent.id,
            context,
        ));

        let response = match self
            .inference
            .open_stream(prepared.route, &prepared.request)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    stream_id = %session.stream_id,
                    agent_id = prepared.agent.id,
                    route = %prepared.route,
                    "inference request failed: {e}"
                );
                sink.fail(&failure_message(&RelayError::from(e), &context.lang))
                    .await;
                return RunOutcome::RequestFailed;
            }
        };

        let end = Ingestor::new(&mut sink, self.compression_interval)
            .run(response.bytes_stream())
            .await;
        RunOutcome::Ingested(end)
    }
}

/// Localized text shown to readers for a failed run.
pub fn failure_message(err: &RelayError, lang: &str) -> String {
    let key = match err {
        RelayError::Setup(setup) => setup.notice_key(),
        RelayError::Inference(InferenceError::EmptyMessage) => "stream.empty_message",
        RelayError::Inference(InferenceError::Read(_)) => "stream.read_failed",
        _ => "stream.request_failed",
    };
    t!(key, locale = lang).to_string()
}
