//! Incremental decoder for the server-sent event framing of the generation
//! stream.

use crate::types::StreamChunk;

const EVENT_SEPARATOR: &[u8] = b"\n\n";
const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// Item produced by [`SseDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A non-empty piece of generated text.
    Content(String),
    /// The server sent the `[DONE]` marker.
    Done,
}

/// Splits raw bytes into events and extracts the generated text.
///
/// Bytes are buffered until a blank line closes an event, so chunk boundaries
/// may fall anywhere, including inside a multi-byte character. Payloads that
/// are not valid JSON, or that carry no text, are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` marker was seen or [`finish`](Self::finish) was called.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of bytes waiting for the rest of their event.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a chunk of bytes and return the frames of every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        self.buffer.extend_from_slice(chunk);
        while let Some(end) = find_separator(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + EVENT_SEPARATOR.len()).collect();
            self.decode_event(&event[..end], &mut frames);
            if self.done {
                self.buffer.clear();
                break;
            }
        }

        frames
    }

    /// Decode whatever is left once the source has closed.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        let rest = std::mem::take(&mut self.buffer);
        self.decode_event(&rest, &mut frames);
        self.done = true;
        frames
    }

    fn decode_event(&mut self, event: &[u8], frames: &mut Vec<Frame>) {
        let text = String::from_utf8_lossy(event);

        for line in text.split('\n') {
            let Some(data) = line.trim().strip_prefix(DATA_PREFIX) else {
                continue;
            };

            if data == DONE_MARKER {
                self.done = true;
                frames.push(Frame::Done);
                return;
            }

            match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => {
                    if let Some(content) = chunk.content().filter(|c| !c.is_empty()) {
                        frames.push(Frame::Content(content.to_string()));
                    }
                }
                Err(e) => {
                    tracing::trace!(error = %e, "skipping malformed stream payload");
                }
            }
        }
    }
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(EVENT_SEPARATOR.len())
        .position(|window| window == EVENT_SEPARATOR)
}
