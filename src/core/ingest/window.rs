use super::frames::FragmentClass;
use crate::core::records::StreamRecord;
use std::time::{Duration, Instant};

pub const DEFAULT_COMPRESSION_INTERVAL: Duration = Duration::from_millis(100);

/// Accumulates same-class fragments into one record per interval.
#[derive(Debug)]
pub struct CompressionWindow {
    interval: Duration,
    class: FragmentClass,
    pending: String,
    last_flush: Instant,
}

impl CompressionWindow {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            class: FragmentClass::Token,
            pending: String::new(),
            last_flush: now,
        }
    }

    pub fn class(&self) -> FragmentClass {
        self.class
    }

    /// Switch class, flushing what was buffered under the old one.
    pub fn switch_to(&mut self, class: FragmentClass) -> Option<StreamRecord> {
        if class == self.class {
            return None;
        }
        let flushed = self.flush();
        self.class = class;
        flushed
    }

    /// Buffer `text` under `class`. Returns the records to append, oldest first.
    pub fn push(&mut self, class: FragmentClass, text: &str, now: Instant) -> Vec<StreamRecord> {
        let mut out = Vec::new();
        out.extend(self.switch_to(class));
        self.pending.push_str(text);
        if now.saturating_duration_since(self.last_flush) >= self.interval {
            out.extend(self.flush());
            self.last_flush = now;
        }
        out
    }

    pub fn flush(&mut self) -> Option<StreamRecord> {
        if self.pending.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.pending);
        Some(match self.class {
            FragmentClass::Token => StreamRecord::Token(text),
            FragmentClass::Thinking => StreamRecord::Thinking(text),
            FragmentClass::Tool => StreamRecord::Tool(text),
        })
    }
}
