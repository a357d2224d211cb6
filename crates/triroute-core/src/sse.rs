//! Minimal line-buffering SSE decoder shared by the classifier transport and
//! the provider adapters: accumulate raw byte chunks, yield complete
//! `data: ...` payloads as soon as a newline closes them, without ever
//! holding more than one in-flight line in memory.

/// Buffers partial lines across chunk boundaries and extracts `data:`
/// payloads from a `text/event-stream` body.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    partial: String,
}

impl SseLineBuffer {
    /// A fresh, empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a raw chunk and returns every `data:` payload completed by it,
    /// in order. Non-`data:` lines (comments, `event:`, blank keep-alives)
    /// are discarded. The special `[DONE]` payload is returned verbatim so
    /// callers can recognize the terminator.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.push_str(&String::from_utf8_lossy(chunk));
        let mut payloads = Vec::new();

        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim().to_string());
            }
        }

        payloads
    }
}
