//! Durable stream buffer.
//!
//! Every stream owns an append-only log of encoded [`StreamRecord`] lines and
//! a live channel. Each appended line is published on the channel stamped
//! with its log index, so a reader that subscribes first and then reads the
//! log can drop live duplicates by index.
//!
//! The buffer is layered over [`StreamStore`], a small key-value / list /
//! pub-sub contract. [`MemoryStreamStore`] is the in-process backend.

mod memory;

pub use memory::MemoryStreamStore;

use super::records::{DONE_SENTINEL, StreamRecord};
use super::session::StreamSession;
use crate::error::StoreError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Shared key-value / list / pub-sub store contract.
pub trait StreamStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;

    /// Set `key` only if absent. Returns whether the write happened.
    fn set_nx_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration)
    -> StoreFuture<'a, bool>;

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

    /// Append to the list at `key`, returning the new length.
    fn rpush<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, usize>;

    /// List elements from `start` (inclusive) to the end.
    fn lrange_from<'a>(&'a self, key: &'a str, start: usize) -> StoreFuture<'a, Vec<String>>;

    fn last<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;

    fn publish<'a>(&'a self, channel: &'a str, payload: String) -> StoreFuture<'a, ()>;

    fn subscribe<'a>(&'a self, channel: &'a str) -> StoreFuture<'a, broadcast::Receiver<String>>;
}

/// Expiry settings for the keys a stream owns.
#[derive(Debug, Clone, Copy)]
pub struct BufferTtls {
    pub session: Duration,
    pub claim: Duration,
    pub log: Duration,
}

impl Default for BufferTtls {
    fn default() -> Self {
        Self {
            session: Duration::from_secs(600),
            claim: Duration::from_secs(180),
            log: Duration::from_secs(600),
        }
    }
}

/// A log line together with its position in the stream's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub index: usize,
    pub line: String,
}

impl LogEntry {
    pub fn record(&self) -> Option<StreamRecord> {
        StreamRecord::decode(&self.line)
    }

    fn to_payload(&self) -> String {
        format!("{}\n{}", self.index, self.line)
    }

    fn from_payload(payload: &str) -> Option<Self> {
        let (index, line) = payload.split_once('\n')?;
        Some(Self {
            index: index.parse().ok()?,
            line: line.to_string(),
        })
    }
}

/// What a live subscription yields next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Entry(LogEntry),
    /// The reader fell behind and entries were dropped; re-read the log.
    Lagged,
    Closed,
}

/// Live view of one stream's channel.
pub struct Subscription {
    receiver: broadcast::Receiver<String>,
}

impl Subscription {
    pub async fn next(&mut self) -> LiveEvent {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => {
                    if let Some(entry) = LogEntry::from_payload(&payload) {
                        return LiveEvent::Entry(entry);
                    }
                    tracing::warn!("dropping malformed live payload");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "live subscription lagged");
                    return LiveEvent::Lagged;
                }
                Err(broadcast::error::RecvError::Closed) => return LiveEvent::Closed,
            }
        }
    }
}

pub fn session_key(stream_id: &str) -> String {
    format!("stream:{stream_id}")
}

pub fn claim_key(stream_id: &str) -> String {
    format!("stream_processing:{stream_id}")
}

pub fn log_key(stream_id: &str) -> String {
    format!("stream_message:{stream_id}")
}

pub fn channel_key(stream_id: &str) -> String {
    format!("stream_channel:{stream_id}")
}

/// Typed access to a stream's session, claim, log and live channel.
#[derive(Clone)]
pub struct StreamBuffer {
    store: Arc<dyn StreamStore>,
    ttls: BufferTtls,
}

impl StreamBuffer {
    pub fn new(store: Arc<dyn StreamStore>, ttls: BufferTtls) -> Self {
        Self { store, ttls }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStreamStore::new()), BufferTtls::default())
    }

    pub fn ttls(&self) -> BufferTtls {
        self.ttls
    }

    pub async fn save_session(&self, session: &StreamSession) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(session).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.store
            .set_ex(&session_key(&session.stream_id), &encoded, self.ttls.session)
            .await
    }

    pub async fn load_session(&self, stream_id: &str) -> Result<Option<StreamSession>, StoreError> {
        let Some(raw) = self.store.get(&session_key(stream_id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Codec(e.to_string()))
    }

    /// Exclusive ingestion claim. Only one caller wins per claim TTL.
    pub async fn try_claim(&self, stream_id: &str) -> Result<bool, StoreError> {
        self.store
            .set_nx_ex(&claim_key(stream_id), "1", self.ttls.claim)
            .await
    }

    pub async fn release_claim(&self, stream_id: &str) -> Result<(), StoreError> {
        self.store.delete(&claim_key(stream_id)).await
    }

    /// Append a record and publish it. Returns the record's log index.
    ///
    /// Fails with [`StoreError::Finished`] once the log holds `Done`.
    pub async fn append(&self, stream_id: &str, record: &StreamRecord) -> Result<usize, StoreError> {
        self.append_line(stream_id, &record.encode()).await
    }

    /// Append an unclassified line verbatim.
    pub async fn append_raw(&self, stream_id: &str, line: &str) -> Result<usize, StoreError> {
        self.append_line(stream_id, line).await
    }

    async fn append_line(&self, stream_id: &str, line: &str) -> Result<usize, StoreError> {
        let key = log_key(stream_id);
        if self.store.last(&key).await?.as_deref() == Some(DONE_SENTINEL) {
            return Err(StoreError::Finished(stream_id.to_string()));
        }
        let length = self.store.rpush(&key, line).await?;
        self.store.expire(&key, self.ttls.log).await?;

        let entry = LogEntry {
            index: length.saturating_sub(1),
            line: line.to_string(),
        };
        self.store
            .publish(&channel_key(stream_id), entry.to_payload())
            .await?;
        Ok(entry.index)
    }

    /// Log entries from `start` onwards.
    pub async fn backlog_from(
        &self,
        stream_id: &str,
        start: usize,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let lines = self.store.lrange_from(&log_key(stream_id), start).await?;
        Ok(lines
            .into_iter()
            .enumerate()
            .map(|(offset, line)| LogEntry {
                index: start + offset,
                line,
            })
            .collect())
    }

    pub async fn backlog(&self, stream_id: &str) -> Result<Vec<LogEntry>, StoreError> {
        self.backlog_from(stream_id, 0).await
    }

    pub async fn has_records(&self, stream_id: &str) -> Result<bool, StoreError> {
        Ok(self.store.last(&log_key(stream_id)).await?.is_some())
    }

    pub async fn subscribe(&self, stream_id: &str) -> Result<Subscription, StoreError> {
        let receiver = self.store.subscribe(&channel_key(stream_id)).await?;
        Ok(Subscription { receiver })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::{MessageEnvelope, StreamRecord};
    use crate::core::session::{StreamSession, WebhookContext};

    fn records_of(entries: &[LogEntry]) -> Vec<StreamRecord> {
        entries.iter().filter_map(LogEntry::record).collect()
    }

    #[tokio::test]
    async fn append_assigns_consecutive_indexes() {
        let buffer = StreamBuffer::in_memory();
        let first = buffer
            .append("s1", &StreamRecord::Token("a".into()))
            .await
            .unwrap();
        let second = buffer
            .append("s1", &StreamRecord::Token("b".into()))
            .await
            .unwrap();
        assert_eq!((first, second), (0, 1));

        let backlog = buffer.backlog("s1").await.unwrap();
        assert_eq!(
            records_of(&backlog),
            vec![StreamRecord::Token("a".into()), StreamRecord::Token("b".into())]
        );
    }

    #[tokio::test]
    async fn nothing_is_appended_after_done() {
        let buffer = StreamBuffer::in_memory();
        buffer.append("s1", &StreamRecord::Done).await.unwrap();
        let err = buffer
            .append("s1", &StreamRecord::Error("late".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Finished(_)));
        assert_eq!(buffer.backlog("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_indexed_entries() {
        let buffer = StreamBuffer::in_memory();
        buffer
            .append("s1", &StreamRecord::Token("early".into()))
            .await
            .unwrap();

        let mut live = buffer.subscribe("s1").await.unwrap();
        buffer
            .append(
                "s1",
                &StreamRecord::Message(MessageEnvelope {
                    content: "x".into(),
                    ..MessageEnvelope::default()
                }),
            )
            .await
            .unwrap();

        match live.next().await {
            LiveEvent::Entry(entry) => {
                assert_eq!(entry.index, 1);
                assert!(matches!(entry.record(), Some(StreamRecord::Message(_))));
            }
            other => panic!("unexpected live event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn passthrough_lines_are_kept_but_not_decoded() {
        let buffer = StreamBuffer::in_memory();
        buffer
            .append_raw("s1", r#"{"type":"custom","content":"x"}"#)
            .await
            .unwrap();
        let backlog = buffer.backlog("s1").await.unwrap();
        assert_eq!(backlog.len(), 1);
        assert!(backlog[0].record().is_none());
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_released() {
        let buffer = StreamBuffer::in_memory();
        assert!(buffer.try_claim("s1").await.unwrap());
        assert!(!buffer.try_claim("s1").await.unwrap());
        buffer.release_claim("s1").await.unwrap();
        assert!(buffer.try_claim("s1").await.unwrap());
    }

    #[tokio::test]
    async fn session_round_trips_through_store() {
        let buffer = StreamBuffer::in_memory();
        let session = StreamSession {
            stream_id: "abc123".into(),
            context: WebhookContext {
                dialog_id: 9,
                send_id: 77,
                text: "hi".into(),
                ..WebhookContext::default()
            },
        };
        buffer.save_session(&session).await.unwrap();

        let loaded = buffer.load_session("abc123").await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(buffer.load_session("missing").await.unwrap().is_none());
    }

    #[test]
    fn live_payload_round_trip() {
        let entry = LogEntry {
            index: 42,
            line: r#"{"type":"token","content":"a"}"#.into(),
        };
        assert_eq!(LogEntry::from_payload(&entry.to_payload()), Some(entry));
        assert_eq!(LogEntry::from_payload("nope"), None);
    }
}
