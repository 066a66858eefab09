//! Stream relay: replays a stream's durable log to one reader and follows
//! its live channel until the run ends.

mod frame;
mod render;

pub use frame::{RelayEvent, RelayFrame};
pub use render::{REASONING_OPENER, SectionState};

use crate::core::buffer::{LiveEvent, LogEntry, StreamBuffer};
use crate::core::session::StreamSession;
use crate::error::StoreError;
use futures_util::Stream;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_IDLE_NOTICE: Duration = Duration::from_secs(5);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Silence after which a reader with nothing shown gets a notice.
    pub idle_notice: Duration,
    /// Lifetime of one connection. Does not affect the run.
    pub deadline: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            idle_notice: DEFAULT_IDLE_NOTICE,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

/// Whether the caller should start the run for `stream_id`.
///
/// Only the claim winner starts it, and only if nothing has been logged
/// yet: a log that already holds records belongs to a run whose claim
/// expired.
pub async fn claim_run(buffer: &StreamBuffer, stream_id: &str) -> Result<bool, StoreError> {
    if !buffer.try_claim(stream_id).await? {
        return Ok(false);
    }
    Ok(!buffer.has_records(stream_id).await?)
}

/// Terminal frame for a stream that does not exist.
pub fn missing_stream_frame(lang: &str) -> RelayFrame {
    RelayFrame::new(0, RelayEvent::Error, t!("stream.not_found", locale = lang))
}

/// Tracks what one reader has seen.
struct Reader {
    send_id: i64,
    sections: SectionState,
    next_index: usize,
    rendered: bool,
}

impl Reader {
    /// Frame for `entry`, skipping entries this reader already handled.
    fn accept(&mut self, entry: &LogEntry) -> Option<RelayFrame> {
        if entry.index < self.next_index {
            return None;
        }
        self.next_index = entry.index + 1;
        let frame = self.sections.render(self.send_id, &entry.record()?)?;
        self.rendered = true;
        Some(frame)
    }
}

enum Step {
    Deadline,
    Idle,
    Live(LiveEvent),
}

/// Frames for one reader of `session`, ending with a terminal frame.
pub fn relay_frames(
    buffer: StreamBuffer,
    session: StreamSession,
    settings: RelaySettings,
) -> impl Stream<Item = RelayFrame> + Send + 'static {
    async_stream::stream! {
        let stream_id = session.stream_id.clone();
        let lang = session.context.lang.clone();
        let send_id = session.context.send_id;
        let started = Instant::now();
        let deadline = started + settings.deadline;
        let idle_at = started + settings.idle_notice;
        let read_failed = || {
            RelayFrame::new(send_id, RelayEvent::Error, t!("stream.read_failed", locale = &lang))
        };

        let mut reader = Reader {
            send_id,
            sections: SectionState::default(),
            next_index: 0,
            rendered: false,
        };
        let mut idle_sent = false;

        // Subscribe first so nothing appended during the backlog read is missed.
        let mut live = match buffer.subscribe(&stream_id).await {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(stream_id = %stream_id, "subscribe failed: {e}");
                yield read_failed();
                return;
            }
        };

        let mut pending = match buffer.backlog(&stream_id).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(stream_id = %stream_id, "backlog read failed: {e}");
                yield read_failed();
                return;
            }
        };

        loop {
            for entry in pending.drain(..) {
                if let Some(frame) = reader.accept(&entry) {
                    let terminal = frame.is_terminal();
                    yield frame;
                    if terminal {
                        return;
                    }
                }
            }

            let waiting_idle = !idle_sent && !reader.rendered;
            let step = tokio::select! {
                () = tokio::time::sleep_until(deadline) => Step::Deadline,
                () = tokio::time::sleep_until(idle_at), if waiting_idle => Step::Idle,
                event = live.next() => Step::Live(event),
            };

            match step {
                Step::Deadline => {
                    tracing::info!(stream_id = %stream_id, "relay deadline reached");
                    yield RelayFrame::new(send_id, RelayEvent::Error, t!("stream.timed_out", locale = &lang));
                    return;
                }
                Step::Idle => {
                    idle_sent = true;
                    yield RelayFrame::new(
                        send_id,
                        RelayEvent::Replace,
                        t!("stream.thinking_placeholder", locale = &lang),
                    );
                }
                Step::Live(LiveEvent::Entry(entry)) if entry.index <= reader.next_index => {
                    pending.push(entry);
                }
                Step::Live(event) => {
                    // Gap, lag or closed channel: the log is authoritative.
                    match buffer.backlog_from(&stream_id, reader.next_index).await {
                        Ok(entries) => pending = entries,
                        Err(e) => {
                            tracing::warn!(stream_id = %stream_id, "catch-up read failed: {e}");
                            yield read_failed();
                            return;
                        }
                    }
                    if matches!(event, LiveEvent::Closed) {
                        let ends = pending
                            .iter()
                            .filter_map(LogEntry::record)
                            .any(|record| record.is_terminal());
                        if !ends {
                            tracing::warn!(stream_id = %stream_id, "live channel closed before the run ended");
                            for entry in pending.drain(..) {
                                if let Some(frame) = reader.accept(&entry) {
                                    yield frame;
                                }
                            }
                            yield RelayFrame::new(
                                send_id,
                                RelayEvent::Error,
                                t!("stream.interrupted", locale = &lang),
                            );
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
