use super::*;
use crate::core::buffer::{BufferTtls, MemoryStreamStore};
use crate::core::records::StreamRecord;
use crate::core::session::WebhookContext;
use futures_util::StreamExt;
use std::sync::Arc;

const SEND_ID: i64 = 321;

fn session() -> StreamSession {
    StreamSession::new(WebhookContext {
        send_id: SEND_ID,
        lang: "en".into(),
        ..WebhookContext::default()
    })
}

fn quick() -> RelaySettings {
    RelaySettings {
        idle_notice: Duration::from_secs(30),
        deadline: Duration::from_secs(5),
    }
}

async fn append_all(buffer: &StreamBuffer, stream_id: &str, records: &[StreamRecord]) {
    for record in records {
        buffer.append(stream_id, record).await.unwrap();
    }
}

async fn collect(buffer: &StreamBuffer, session: &StreamSession, settings: RelaySettings) -> Vec<RelayFrame> {
    relay_frames(buffer.clone(), session.clone(), settings)
        .collect()
        .await
}

fn frame(event: RelayEvent, content: &str) -> RelayFrame {
    RelayFrame::new(SEND_ID, event, content)
}

#[tokio::test]
async fn finished_run_is_replayed_from_the_log() {
    let buffer = StreamBuffer::in_memory();
    let session = session();
    append_all(
        &buffer,
        &session.stream_id,
        &[
            StreamRecord::Thinking("hmm".into()),
            StreamRecord::Token("Hello".into()),
            StreamRecord::Done,
        ],
    )
    .await;

    assert_eq!(
        collect(&buffer, &session, quick()).await,
        vec![
            frame(RelayEvent::Replace, "::: reasoning\nhmm"),
            frame(RelayEvent::Replace, "Hello"),
            frame(RelayEvent::Done, ""),
        ]
    );
}

#[tokio::test]
async fn live_records_follow_the_backlog() {
    let buffer = StreamBuffer::in_memory();
    let session = session();
    buffer
        .append(&session.stream_id, &StreamRecord::Token("a".into()))
        .await
        .unwrap();

    let mut frames = Box::pin(relay_frames(buffer.clone(), session.clone(), quick()));
    assert_eq!(frames.next().await, Some(frame(RelayEvent::Replace, "a")));

    let writer = buffer.clone();
    let stream_id = session.stream_id.clone();
    tokio::spawn(async move {
        append_all(
            &writer,
            &stream_id,
            &[
                StreamRecord::Token("b".into()),
                StreamRecord::Error("upstream failed".into()),
                StreamRecord::Done,
            ],
        )
        .await;
    });

    assert_eq!(frames.next().await, Some(frame(RelayEvent::Append, "b")));
    assert_eq!(
        frames.next().await,
        Some(frame(RelayEvent::Error, "upstream failed"))
    );
    assert_eq!(frames.next().await, None);
}

#[tokio::test]
async fn late_joiner_sees_the_same_prefix() {
    let buffer = StreamBuffer::in_memory();
    let session = session();
    let records = [
        StreamRecord::Thinking("t".into()),
        StreamRecord::Token("x".into()),
        StreamRecord::Tool("#### MCP Tool Call: search\n".into()),
    ];

    let mut early = Box::pin(relay_frames(buffer.clone(), session.clone(), quick()));
    let early_reader = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(frame) = early.next().await {
            seen.push(frame);
        }
        seen
    });

    append_all(&buffer, &session.stream_id, &records).await;
    let late = relay_frames(buffer.clone(), session.clone(), quick());
    let mut late = Box::pin(late);
    let mut late_frames = Vec::new();
    for _ in 0..3 {
        late_frames.push(late.next().await.unwrap());
    }
    buffer
        .append(&session.stream_id, &StreamRecord::Done)
        .await
        .unwrap();
    late_frames.push(late.next().await.unwrap());

    let early_frames = early_reader.await.unwrap();
    assert_eq!(early_frames, late_frames);
    assert_eq!(late_frames[0], frame(RelayEvent::Replace, "::: reasoning\nt"));
    assert_eq!(late_frames[1], frame(RelayEvent::Replace, "x"));
    assert_eq!(
        late_frames[2],
        frame(RelayEvent::Append, "#### MCP Tool Call: search\n")
    );
}

#[tokio::test]
async fn idle_reader_gets_one_thinking_notice() {
    let buffer = StreamBuffer::in_memory();
    let session = session();
    let settings = RelaySettings {
        idle_notice: Duration::from_millis(30),
        deadline: Duration::from_secs(5),
    };

    let mut frames = Box::pin(relay_frames(buffer.clone(), session.clone(), settings));
    assert_eq!(
        frames.next().await,
        Some(frame(RelayEvent::Replace, "Thinking..."))
    );

    append_all(
        &buffer,
        &session.stream_id,
        &[StreamRecord::Token("hi".into()), StreamRecord::Done],
    )
    .await;
    assert_eq!(frames.next().await, Some(frame(RelayEvent::Replace, "hi")));
    assert_eq!(frames.next().await, Some(frame(RelayEvent::Done, "")));
    assert_eq!(frames.next().await, None);
}

#[tokio::test]
async fn deadline_ends_the_connection_with_an_error() {
    let buffer = StreamBuffer::in_memory();
    let session = session();
    let settings = RelaySettings {
        idle_notice: Duration::from_secs(30),
        deadline: Duration::from_millis(50),
    };

    assert_eq!(
        collect(&buffer, &session, settings).await,
        vec![frame(RelayEvent::Error, "Response timed out, please retry")]
    );
}

#[tokio::test]
async fn lagging_reader_catches_up_from_the_log() {
    let store = Arc::new(MemoryStreamStore::with_channel_capacity(1));
    let buffer = StreamBuffer::new(store, BufferTtls::default());
    let session = session();
    buffer
        .append(&session.stream_id, &StreamRecord::Token("0".into()))
        .await
        .unwrap();

    let mut frames = Box::pin(relay_frames(buffer.clone(), session.clone(), quick()));
    assert_eq!(frames.next().await, Some(frame(RelayEvent::Replace, "0")));

    for n in 1..=5 {
        buffer
            .append(&session.stream_id, &StreamRecord::Token(n.to_string()))
            .await
            .unwrap();
    }
    buffer
        .append(&session.stream_id, &StreamRecord::Done)
        .await
        .unwrap();

    let rest: Vec<RelayFrame> = frames.collect().await;
    let mut expected: Vec<RelayFrame> = (1..=5)
        .map(|n| frame(RelayEvent::Append, &n.to_string()))
        .collect();
    expected.push(frame(RelayEvent::Done, ""));
    assert_eq!(rest, expected);
}

#[tokio::test]
async fn passthrough_and_message_lines_render_nothing() {
    let buffer = StreamBuffer::in_memory();
    let session = session();
    buffer
        .append_raw(&session.stream_id, r#"{"type":"progress","content":"1"}"#)
        .await
        .unwrap();
    append_all(
        &buffer,
        &session.stream_id,
        &[
            StreamRecord::Message(Default::default()),
            StreamRecord::Done,
        ],
    )
    .await;

    assert_eq!(
        collect(&buffer, &session, quick()).await,
        vec![frame(RelayEvent::Done, "")]
    );
}

#[tokio::test]
async fn only_the_first_caller_claims_a_fresh_stream() {
    let buffer = StreamBuffer::in_memory();
    assert!(claim_run(&buffer, "abc123").await.unwrap());
    assert!(!claim_run(&buffer, "abc123").await.unwrap());
}

#[tokio::test]
async fn expired_claim_over_an_existing_log_does_not_rerun() {
    let buffer = StreamBuffer::in_memory();
    buffer
        .append("abc123", &StreamRecord::Token("x".into()))
        .await
        .unwrap();
    assert!(!claim_run(&buffer, "abc123").await.unwrap());
}

#[test]
fn missing_stream_frame_is_terminal() {
    let frame = missing_stream_frame("zh");
    assert!(frame.is_terminal());
    assert_eq!(frame.content, "流式消息不存在");
}
