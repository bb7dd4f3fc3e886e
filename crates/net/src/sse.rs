//! Incremental `text/event-stream` decoding
//!
//! Wire format: UTF-8 lines of `field: value`, frames separated by a blank
//! line. Lines end with LF, CRLF or CR. Lines starting with `:` are comments.
//! Maximum pending frame size: 1MB (sanity limit)

use crate::error::{Error, Result};

/// Maximum buffered bytes for a single frame (1MB)
const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; `message` when the frame carried none
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
    pub id: Option<String>,
    /// Reconnection time requested by the server, in milliseconds
    pub retry: Option<u64>,
}

/// Stateful decoder fed with arbitrary byte chunks
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    retry: Option<u64>,
    pending_bytes: usize,
    started: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>> {
        self.buf.extend_from_slice(chunk);

        if !self.started {
            // Strip a UTF-8 BOM at the very start of the stream
            if self.buf.len() < 3 && b"\xEF\xBB\xBF".starts_with(&self.buf) {
                return Ok(Vec::new());
            }
            if self.buf.starts_with(b"\xEF\xBB\xBF") {
                self.buf.drain(..3);
            }
            self.started = true;
        }

        let mut frames = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < self.buf.len() {
            match self.buf[i] {
                b'\n' => {
                    let line = String::from_utf8_lossy(&self.buf[start..i]).into_owned();
                    if let Some(frame) = self.process_line(&line)? {
                        frames.push(frame);
                    }
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    // A trailing CR may be the first half of CRLF
                    if i + 1 == self.buf.len() {
                        break;
                    }
                    let line = String::from_utf8_lossy(&self.buf[start..i]).into_owned();
                    if let Some(frame) = self.process_line(&line)? {
                        frames.push(frame);
                    }
                    i += if self.buf[i + 1] == b'\n' { 2 } else { 1 };
                    start = i;
                }
                _ => i += 1,
            }
        }

        self.buf.drain(..start);

        if self.buf.len() + self.pending_bytes > MAX_FRAME_SIZE {
            return Err(Error::Protocol(format!(
                "Event too large: more than {} bytes buffered",
                MAX_FRAME_SIZE
            )));
        }

        Ok(frames)
    }

    fn process_line(&mut self, line: &str) -> Result<Option<SseFrame>> {
        if line.is_empty() {
            return Ok(self.dispatch());
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.pending_bytes += value.len() + 1;
                if self.pending_bytes > MAX_FRAME_SIZE {
                    return Err(Error::Protocol(format!(
                        "Event too large: {} bytes (max {})",
                        self.pending_bytes, MAX_FRAME_SIZE
                    )));
                }
                self.data.push(value.to_string());
            }
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let retry = self.retry.take();
        let id = self.id.take();
        self.pending_bytes = 0;

        if self.data.is_empty() {
            // A retry-only frame still matters to the caller
            return retry.map(|retry| SseFrame {
                event: event.unwrap_or_else(|| "message".to_string()),
                data: String::new(),
                id,
                retry: Some(retry),
            });
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
            id,
            retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder
            .push(b"event: vote-cast\ndata: {\"a\":1}\nid: 7\n\n")
            .unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "vote-cast");
        assert_eq!(frames[0].data, "{\"a\":1}");
        assert_eq!(frames[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_chunk_boundaries_and_crlf() {
        let mut decoder = SseDecoder::new();
        let mut frames = decoder.push(b"event: vote-del").unwrap();
        assert!(frames.is_empty());
        frames.extend(decoder.push(b"eted\r").unwrap());
        frames.extend(decoder.push(b"\ndata: x\r\n").unwrap());
        frames.extend(decoder.push(b"\r\n").unwrap());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "vote-deleted");
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder
            .push(b": keep-alive\n\ndata: first\ndata:second\n\n")
            .unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "message");
        assert_eq!(frames[0].data, "first\nsecond");
    }

    #[test]
    fn test_bom_and_retry() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"\xEF\xBB\xBFretry: 3000\n\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].retry, Some(3000));
        assert!(frames[0].data.is_empty());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut decoder = SseDecoder::new();
        let big = vec![b'a'; MAX_FRAME_SIZE + 1];
        let mut chunk = b"data: ".to_vec();
        chunk.extend_from_slice(&big);
        assert!(decoder.push(&chunk).is_err());
    }
}
