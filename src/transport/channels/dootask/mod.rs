//! DooTask chat-platform client.
//!
//! A client value is built per request from the bot token carried by the
//! webhook and handed explicitly to whatever needs it.

mod client;
#[cfg(test)]
pub mod fake;
mod types;

pub use client::{DooTaskClient, DooTaskConnector};
pub use types::{DialogMessage, MessageBody, SendTextRequest, SentMessage};

use crate::error::PlatformError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PlatformError>> + Send + 'a>>;

/// Chat-platform operations the relay depends on.
pub trait ChatPlatform: Send + Sync {
    /// Send a message, or update one when `request.update_id` is set.
    fn send_text<'a>(&'a self, request: &'a SendTextRequest) -> PlatformFuture<'a, SentMessage>;

    /// Tell the platform where the live stream for `user_id` is served.
    fn notify_stream<'a>(&'a self, user_id: i64, stream_url: &'a str) -> PlatformFuture<'a, ()>;

    /// The newest `take` messages of a dialog, newest first.
    fn recent_messages(&self, dialog_id: i64, take: usize)
    -> PlatformFuture<'_, Vec<DialogMessage>>;

    /// Expand embedded object tags into text an AI model can read.
    fn convert_for_ai<'a>(&'a self, text: &'a str) -> PlatformFuture<'a, String>;
}

/// Produces a [`ChatPlatform`] bound to one bot token.
pub trait PlatformConnector: Send + Sync {
    fn connect(&self, token: &str) -> Arc<dyn ChatPlatform>;
}
