//! Stream Reader
//!
//! Turns a chunked HTTP response body into a lazy, finite sequence of
//! [`StreamEvent`]s.
//!
//! # Framing
//!
//! The body is newline-delimited text. Only lines starting with `data:` carry
//! events; a single space after the colon is optional. Everything else
//! (`event:` lines, comments, keep-alive blanks) is ignored.
//!
//! Lines are reassembled at the byte level, so a frame split across two
//! network chunks (even in the middle of a multi-byte character) decodes as
//! one line.
//!
//! A line that fails to decode is logged and skipped. One bad line never ends
//! the turn.

use std::collections::VecDeque;
use std::fmt::Display;

use futures::{Stream, StreamExt};
use thiserror::Error;

use crate::events::StreamEvent;

/// Prefix marking a significant line
const DATA_PREFIX: &[u8] = b"data:";

/// Errors surfaced by the reader
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The underlying body stream failed mid-read
    #[error("transport error while reading stream: {0}")]
    Transport(String),
}

/// Pull-based event reader over a byte stream
///
/// `next_event` is cancel-safe: all partial state lives in the reader, so
/// dropping the future between polls never loses a line.
pub struct EventStream<S> {
    body: S,
    /// Bytes received but not yet terminated by a newline
    pending: Vec<u8>,
    /// Events decoded from the current chunk, not yet handed out
    ready: VecDeque<StreamEvent>,
    /// Set once a terminal event or transport error has been produced
    finished: bool,
    /// Set once the body reported end-of-stream
    body_done: bool,
    /// Lines skipped because they failed to decode
    skipped: usize,
}

impl<S, B, E> EventStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    /// Wrap a byte stream
    pub fn new(body: S) -> Self {
        Self {
            body,
            pending: Vec::new(),
            ready: VecDeque::new(),
            finished: false,
            body_done: false,
            skipped: 0,
        }
    }

    /// Number of lines skipped as malformed so far
    #[must_use]
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    /// Whether the reader will produce no more events
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished || (self.body_done && self.ready.is_empty())
    }

    /// Next event in arrival order
    ///
    /// Returns `None` at end-of-stream, and forever after a terminal event or
    /// a transport error has been returned.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, StreamError>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(event) = self.ready.pop_front() {
                if event.is_terminal() {
                    self.finished = true;
                    self.ready.clear();
                }
                return Some(Ok(event));
            }

            if self.body_done {
                return None;
            }

            match self.body.next().await {
                Some(Ok(chunk)) => self.push_bytes(chunk.as_ref()),
                Some(Err(e)) => {
                    self.finished = true;
                    tracing::warn!(error = %e, "Response stream failed");
                    return Some(Err(StreamError::Transport(e.to_string())));
                }
                None => {
                    self.body_done = true;
                    if !self.pending.is_empty() {
                        let tail = std::mem::take(&mut self.pending);
                        self.decode_line(&tail);
                    }
                    tracing::debug!(skipped = self.skipped, "Response stream ended");
                }
            }
        }
    }

    /// Adapt into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEvent, StreamError>> {
        futures::stream::unfold(self, |mut reader| async move {
            reader.next_event().await.map(|item| (item, reader))
        })
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = self.pending[start..end].to_vec();
            self.decode_line(&line);
            start = end + 1;
        }
        self.pending.drain(..start);
    }

    fn decode_line(&mut self, raw: &[u8]) {
        let line = raw.strip_suffix(b"\r").unwrap_or(raw);
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        let payload = payload.strip_prefix(b" ").unwrap_or(payload);
        let payload = String::from_utf8_lossy(payload);

        match StreamEvent::decode(&payload) {
            Ok(event) => {
                tracing::trace!(kind = event.kind(), "Decoded stream event");
                self.ready.push_back(event);
            }
            Err(e) => {
                self.skipped += 1;
                tracing::warn!(error = %e, line = %payload, "Skipping undecodable stream line");
            }
        }
    }
}

impl<S> std::fmt::Debug for EventStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("pending_bytes", &self.pending.len())
            .field("ready", &self.ready.len())
            .field("finished", &self.finished)
            .field("body_done", &self.body_done)
            .field("skipped", &self.skipped)
            .finish()
    }
}
