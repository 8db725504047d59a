//! Incremental decoder for the backend's SSE progress stream.
//!
//! Converts the raw byte stream from `GET /stream` into [`SseFrame`]s.
//! Handles `event:`/`data:` fields, multi-line data, comment lines, CRLF
//! line endings, and frames split across arbitrary chunk boundaries.
//!
//! # Wire format
//!
//! ```text
//! event: status
//! data: {"status": "mad_started"}
//!
//! event: persona
//! data: {"persona": "Sarah", "response": "..."}
//! ```

/// One decoded frame from the progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The frame's event name (from `event:`). `None` for untyped frames.
    pub event: Option<String>,
    /// The data payload. Multiple `data:` lines are joined with `\n`.
    pub data: String,
}

/// Incremental SSE decoder.
///
/// Feed chunks of bytes via [`SseFrameDecoder::push`]; complete frames are
/// returned as they appear. Call [`SseFrameDecoder::finish`] when the stream
/// ends to flush a trailing frame that was not followed by a blank line.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    line: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseFrameDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes, returning any frames completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let text = String::from_utf8_lossy(chunk);
        let mut frames = Vec::new();

        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if let Some(frame) = self.take_line(line) {
                    frames.push(frame);
                }
            } else {
                self.line.push(ch);
            }
        }

        frames
    }

    /// Flush any buffered data as a final frame when the stream ends.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            self.take_line(line);
        }

        if self.data.is_empty() {
            None
        } else {
            Some(self.emit())
        }
    }

    /// Process one complete line. A blank line terminates the pending frame.
    fn take_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            return Some(self.emit());
        }

        // Comment line per the SSE spec.
        if line.starts_with(':') {
            return None;
        }

        if let Some((field, value)) = split_field(line) {
            match field {
                "data" => self.data.push(value.to_string()),
                "event" => self.event = Some(value.to_string()),
                // `id:`, `retry:`, and anything else are irrelevant to this
                // stream and ignored per the SSE spec.
                _ => {}
            }
        }

        None
    }

    fn emit(&mut self) -> SseFrame {
        let frame = SseFrame {
            event: self.event.take(),
            data: self.data.join("\n"),
        };
        self.data.clear();
        frame
    }
}

/// Split a line into (field, value), stripping the single optional space
/// after the colon.
fn split_field(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let field = &line[..colon];
    let value = line[colon + 1..].strip_prefix(' ').unwrap_or(&line[colon + 1..]);
    Some((field, value))
}
