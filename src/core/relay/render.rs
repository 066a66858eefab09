use super::frame::{RelayEvent, RelayFrame};
use crate::core::records::StreamRecord;

pub const REASONING_OPENER: &str = "::: reasoning\n";

/// Per-reader section tracking.
///
/// The first rendered record of a run starts a section, as does the first
/// answer or tool record after reasoning. Section starts replace what the
/// reader shows instead of appending to it.
#[derive(Debug, Clone)]
pub struct SectionState {
    at_section_start: bool,
    in_thinking: bool,
}

impl Default for SectionState {
    fn default() -> Self {
        Self {
            at_section_start: true,
            in_thinking: false,
        }
    }
}

impl SectionState {
    /// Frame for `record`, or `None` for records readers never see.
    pub fn render(&mut self, send_id: i64, record: &StreamRecord) -> Option<RelayFrame> {
        match record {
            StreamRecord::Thinking(text) => {
                let is_first = std::mem::replace(&mut self.at_section_start, false);
                self.in_thinking = true;
                let content = if is_first {
                    format!("{REASONING_OPENER}{text}")
                } else {
                    text.clone()
                };
                Some(RelayFrame::new(send_id, event_for(is_first), content))
            }
            StreamRecord::Token(text) | StreamRecord::Tool(text) => {
                if std::mem::take(&mut self.in_thinking) {
                    self.at_section_start = true;
                }
                let is_first = std::mem::replace(&mut self.at_section_start, false);
                Some(RelayFrame::new(send_id, event_for(is_first), text.clone()))
            }
            StreamRecord::Message(_) => None,
            StreamRecord::Error(message) => {
                Some(RelayFrame::new(send_id, RelayEvent::Error, message.clone()))
            }
            StreamRecord::Done => Some(RelayFrame::new(send_id, RelayEvent::Done, "")),
        }
    }
}

fn event_for(is_first: bool) -> RelayEvent {
    if is_first {
        RelayEvent::Replace
    } else {
        RelayEvent::Append
    }
}
