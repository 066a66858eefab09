/// Splits a chunked byte stream into complete lines.
///
/// Bytes are buffered raw so multi-byte characters split across chunks are
/// decoded only once the line is whole.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|b| *b == b'\n')?;
        let rest = self.buffer.split_off(newline + 1);
        let line = std::mem::replace(&mut self.buffer, rest);
        Some(decode(&line[..newline]))
    }

    /// Whatever is left after the body ended without a trailing newline.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        Some(decode(&line))
    }
}

fn decode(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_suffix('\r').unwrap_or(&text).to_string()
}

#[cfg(test)]
mod tests {
    use super::LineBuffer;

    #[test]
    fn yields_complete_lines_only() {
        let mut buffer = LineBuffer::new();
        buffer.push_chunk(b"data: first\ndata: sec");
        assert_eq!(buffer.next_line().as_deref(), Some("data: first"));
        assert!(buffer.next_line().is_none());

        buffer.push_chunk(b"ond\r\n");
        assert_eq!(buffer.next_line().as_deref(), Some("data: second"));
        assert!(buffer.take_remainder().is_none());
    }

    #[test]
    fn multibyte_characters_survive_chunk_splits() {
        let bytes = "你好\n".as_bytes();
        let mut buffer = LineBuffer::new();
        buffer.push_chunk(&bytes[..2]);
        assert!(buffer.next_line().is_none());
        buffer.push_chunk(&bytes[2..]);
        assert_eq!(buffer.next_line().as_deref(), Some("你好"));
    }

    #[test]
    fn remainder_is_returned_once() {
        let mut buffer = LineBuffer::new();
        buffer.push_chunk(b"[DONE]");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.take_remainder().as_deref(), Some("[DONE]"));
        assert!(buffer.take_remainder().is_none());
    }
}
