//! Server-Sent Events decoding for the chat stream.

use crate::api::error::ApiError;
use crate::api::types::{ChatChunk, StreamChatFrame};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Incremental SSE decoder.
///
/// Bytes may be split anywhere. Lines end in LF or CRLF; `data:` lines are
/// accumulated and joined with `\n`, and a blank line dispatches the event.
/// Comments and non-data fields are skipped.
///
/// The chat backend terminates frames with the two-character escape `\n`
/// instead of a real newline, so an escaped `\n` outside a JSON string also
/// ends a line. Inside a string it is payload and is left alone.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the data payload of every completed event.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some((end, consumed)) = self.next_line() {
            let mut line: Vec<u8> = self.buf.drain(..consumed).collect();
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Find the first line terminator in the buffer: `(line_len, bytes_to_drain)`.
    fn next_line(&self) -> Option<(usize, usize)> {
        let mut in_string = false;
        let mut escaped = false;
        for (i, &b) in self.buf.iter().enumerate() {
            if b == b'\n' {
                return Some((i, i + 1));
            }
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
            } else if b == b'"' {
                in_string = true;
            } else if b == b'\\' {
                match self.buf.get(i + 1) {
                    Some(b'n') => return Some((i, i + 2)),
                    // wait for the next byte
                    None => return None,
                    Some(_) => {}
                }
            }
        }
        None
    }

    /// Flush a trailing event the server did not terminate with a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let text = String::from_utf8_lossy(&rest);
            let line = text.strip_suffix('\r').unwrap_or(text.as_ref());
            self.process_line(line);
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

/// Lazy, finite sequence of chat chunks. Dropping it closes the response body.
pub struct ChatStream {
    inner: BoxStream<'static, Result<ChatChunk, ApiError>>,
}

struct SseState {
    bytes: BoxStream<'static, Result<Vec<u8>, ApiError>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<ChatChunk, ApiError>>,
    done: bool,
}

impl SseState {
    fn enqueue(&mut self, payload: &str) {
        match serde_json::from_str::<StreamChatFrame>(payload) {
            Ok(frame) => self.pending.extend(frame.into_chunks().map(Ok)),
            Err(e) => self.pending.push_back(Err(ApiError::Decode(format!(
                "invalid chat frame {payload:?}: {e}"
            )))),
        }
    }
}

impl ChatStream {
    /// Decode an SSE byte stream whose events carry `{chunk?, error?}` JSON.
    pub fn from_sse_bytes<S>(bytes: S) -> Self
    where
        S: Stream<Item = Result<Vec<u8>, ApiError>> + Send + 'static,
    {
        let state = SseState {
            bytes: bytes.boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let inner = stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.pending.pop_front() {
                    return Some((item, st));
                }
                if st.done {
                    return None;
                }
                match st.bytes.next().await {
                    Some(Ok(buf)) => {
                        for payload in st.decoder.push(&buf) {
                            st.enqueue(&payload);
                        }
                    }
                    Some(Err(e)) => {
                        st.done = true;
                        return Some((Err(e), st));
                    }
                    None => {
                        st.done = true;
                        if let Some(payload) = st.decoder.finish() {
                            st.enqueue(&payload);
                        }
                    }
                }
            }
        });

        Self {
            inner: inner.boxed(),
        }
    }

    /// Stream of already-decoded items; used by in-process fakes of the backend.
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Result<ChatChunk, ApiError>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            inner: stream::iter(items).boxed(),
        }
    }

    pub(crate) fn from_response(res: reqwest::Response) -> Self {
        let bytes = res
            .bytes_stream()
            .map(|r| r.map(|b| b.to_vec()).map_err(ApiError::from));
        Self::from_sse_bytes(bytes)
    }
}

impl Stream for ChatStream {
    type Item = Result<ChatChunk, ApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream").finish_non_exhaustive()
    }
}
