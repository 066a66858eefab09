//! Stream ingestor: turns the inference service's line-delimited event
//! stream into durable records.
//!
//! Token and thinking fragments are coalesced by a [`CompressionWindow`].
//! Tool calls, the final message and errors are persisted as they arrive.
//! Every path through [`Ingestor::run`] leaves exactly one `Done` at the end
//! of the log.

mod frames;
mod lines;
mod window;

pub use frames::{FragmentClass, Frame, parse_error_content, parse_line};
pub use lines::LineBuffer;
pub use window::{CompressionWindow, DEFAULT_COMPRESSION_INTERVAL};

use crate::core::buffer::StreamBuffer;
use crate::core::persistence::MessageRecorder;
use crate::core::records::{MessageEnvelope, StreamRecord};
use crate::core::session::StreamSession;
use crate::error::StoreError;
use crate::transport::channels::ChatPlatform;
use crate::transport::channels::dootask::SendTextRequest;
use crate::utils::html::process_html_content;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where one run's output goes: the durable log, the chat-platform
/// placeholder and the message table.
pub struct RunSink {
    buffer: StreamBuffer,
    stream_id: String,
    dialog_id: i64,
    send_id: i64,
    lang: String,
    platform: Arc<dyn ChatPlatform>,
    recorder: Option<MessageRecorder>,
    finished: bool,
}

impl RunSink {
    pub fn new(buffer: StreamBuffer, session: &StreamSession, platform: Arc<dyn ChatPlatform>) -> Self {
        Self {
            buffer,
            stream_id: session.stream_id.clone(),
            dialog_id: session.context.dialog_id,
            send_id: session.context.send_id,
            lang: session.context.lang.clone(),
            platform,
            recorder: None,
            finished: false,
        }
    }

    /// Attach message accounting once the agent is known.
    pub fn set_recorder(&mut self, recorder: MessageRecorder) {
        self.recorder = Some(recorder);
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn emit(&mut self, record: &StreamRecord) {
        if self.finished {
            return;
        }
        let result = self.buffer.append(&self.stream_id, record).await;
        self.after_append(result, matches!(record, StreamRecord::Done));
    }

    async fn emit_raw(&mut self, line: &str) {
        if self.finished {
            return;
        }
        let result = self.buffer.append_raw(&self.stream_id, line).await;
        self.after_append(result, false);
    }

    fn after_append(&mut self, result: Result<usize, StoreError>, done: bool) {
        match result {
            Ok(_) => self.finished = done,
            Err(StoreError::Finished(_)) => {
                tracing::debug!(stream_id = %self.stream_id, "log already finished, dropping record");
                self.finished = true;
            }
            Err(e) => {
                tracing::warn!(stream_id = %self.stream_id, "failed to append record: {e}");
            }
        }
    }

    /// Replace the `...` placeholder reply with `text`.
    pub async fn update_placeholder(&self, text: &str) {
        let request = SendTextRequest::update(self.dialog_id, self.send_id, text);
        if let Err(e) = self.platform.send_text(&request).await {
            tracing::warn!(
                stream_id = %self.stream_id,
                send_id = self.send_id,
                "failed to update placeholder message: {e}"
            );
        }
    }

    /// Terminal failure: failed message row, placeholder, `Error`, `Done`.
    pub async fn fail(&mut self, message: &str) {
        if let Some(recorder) = &self.recorder {
            recorder.failure(message).await;
        }
        self.update_placeholder(message).await;
        self.emit(&StreamRecord::Error(message.to_string())).await;
        self.finish().await;
    }

    /// Append `Done` unless the log already ended.
    pub async fn finish(&mut self) {
        self.emit(&StreamRecord::Done).await;
    }
}

/// How an ingestion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestEnd {
    /// The service sent `[DONE]`.
    Done,
    /// The final assistant message arrived.
    Message,
    /// The service reported an error.
    Error,
    /// The body ended without `[DONE]`.
    EndOfBody,
    /// Reading the body failed midway.
    ReadError,
}

pub struct Ingestor<'s> {
    sink: &'s mut RunSink,
    window: CompressionWindow,
}

impl<'s> Ingestor<'s> {
    pub fn new(sink: &'s mut RunSink, interval: Duration) -> Self {
        Self {
            sink,
            window: CompressionWindow::new(interval, Instant::now()),
        }
    }

    pub async fn run<S, B, E>(mut self, body: S) -> IngestEnd
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut body = std::pin::pin!(body);
        let mut lines = LineBuffer::new();

        loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    lines.push_chunk(chunk.as_ref());
                    while let Some(line) = lines.next_line() {
                        if let Some(end) = self.handle_line(&line).await {
                            return end;
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(stream_id = %self.sink.stream_id, "inference body read failed: {e}");
                    self.flush().await;
                    let message = t!("stream.read_failed", locale = self.sink.lang()).to_string();
                    self.sink.fail(&message).await;
                    return IngestEnd::ReadError;
                }
                None => {
                    if let Some(line) = lines.take_remainder()
                        && let Some(end) = self.handle_line(&line).await
                    {
                        return end;
                    }
                    self.flush().await;
                    self.sink.finish().await;
                    return IngestEnd::EndOfBody;
                }
            }
        }
    }

    async fn flush(&mut self) {
        if let Some(record) = self.window.flush() {
            self.sink.emit(&record).await;
        }
    }

    async fn handle_line(&mut self, line: &str) -> Option<IngestEnd> {
        if self.sink.is_finished() {
            return Some(IngestEnd::Done);
        }

        match parse_line(line) {
            Frame::Skip => None,
            Frame::Done => {
                self.flush().await;
                self.sink.finish().await;
                Some(IngestEnd::Done)
            }
            Frame::Fragment(class, text) => {
                for record in self.window.push(class, &text, Instant::now()) {
                    self.sink.emit(&record).await;
                }
                None
            }
            Frame::ToolCalls { names, usage } => {
                self.flush().await;
                self.window.switch_to(FragmentClass::Tool);
                let lang = self.sink.lang().to_string();
                for name in &names {
                    let heading = t!("stream.tool_call_heading", name = name, locale = &lang);
                    self.sink.emit(&StreamRecord::Tool(heading.to_string())).await;
                }
                if let Some(recorder) = &self.sink.recorder {
                    let summary = t!("stream.tool_call_summary", locale = &lang);
                    recorder.success(&summary, usage, Some(names)).await;
                }
                None
            }
            Frame::Final(envelope) => {
                self.flush().await;
                let content = process_html_content(&envelope.content);
                if let Some(recorder) = &self.sink.recorder {
                    recorder.success(&content, envelope.usage, None).await;
                }
                self.sink.update_placeholder(&content).await;
                self.sink
                    .emit(&StreamRecord::Message(MessageEnvelope {
                        content,
                        usage: envelope.usage,
                    }))
                    .await;
                self.sink.finish().await;
                Some(IngestEnd::Message)
            }
            Frame::Error(message) => {
                self.flush().await;
                let message = process_html_content(&message);
                self.sink.fail(&message).await;
                Some(IngestEnd::Error)
            }
            Frame::Passthrough(raw) => {
                self.sink.emit_raw(&raw).await;
                None
            }
        }
    }
}
