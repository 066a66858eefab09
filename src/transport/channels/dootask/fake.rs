use super::types::{DialogMessage, SendTextRequest, SentMessage};
use super::{ChatPlatform, PlatformConnector, PlatformFuture};
use std::sync::{Arc, Mutex};

/// In-process platform that records every call.
#[derive(Default)]
pub struct RecordingPlatform {
    pub sent: Mutex<Vec<SendTextRequest>>,
    pub notices: Mutex<Vec<(i64, String)>>,
    pub history: Vec<DialogMessage>,
    pub next_id: i64,
}

impl RecordingPlatform {
    pub fn sent(&self) -> Vec<SendTextRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl ChatPlatform for RecordingPlatform {
    fn send_text<'a>(&'a self, request: &'a SendTextRequest) -> PlatformFuture<'a, SentMessage> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(request.clone());
            Ok(SentMessage {
                id: request.update_id.unwrap_or(self.next_id),
                dialog_id: request.dialog_id,
                ..SentMessage::default()
            })
        })
    }

    fn notify_stream<'a>(&'a self, user_id: i64, stream_url: &'a str) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            self.notices
                .lock()
                .unwrap()
                .push((user_id, stream_url.to_string()));
            Ok(())
        })
    }

    fn recent_messages(&self, _dialog_id: i64, take: usize) -> PlatformFuture<'_, Vec<DialogMessage>> {
        Box::pin(async move { Ok(self.history.iter().take(take).cloned().collect()) })
    }

    fn convert_for_ai<'a>(&'a self, text: &'a str) -> PlatformFuture<'a, String> {
        Box::pin(async move { Ok(text.to_string()) })
    }
}

/// Hands out the same [`RecordingPlatform`] for every token.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    pub platform: Arc<RecordingPlatform>,
}

impl PlatformConnector for RecordingConnector {
    fn connect(&self, _token: &str) -> Arc<dyn ChatPlatform> {
        self.platform.clone()
    }
}
