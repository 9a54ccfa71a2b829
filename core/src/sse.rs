//! Lazy decoding of `data:` frames from a server-sent-events body.
//!
//! # Framing
//! Every event on the wire is one `data: <json>` line followed by one blank
//! separator line. No `event:`, `id:` or `retry:` fields are interpreted and
//! the stream ends when the connection closes.
//!
//! # State machine
//! ```text
//!   Fetching --has_next/read--> Ready --next_frame--> Fetching
//!       |
//!       +--EOF--> Exhausted        any state --close/I-O error--> Closed
//! ```
//! `Exhausted` and `Closed` are terminal and behave the same for callers:
//! `has_next` is `false` and `next_frame` returns `ApiError::Exhausted`.
//!
//! I/O errors while reading are not returned to the caller. They end the
//! stream as if the server had closed it, release the reader, and set
//! [`FrameStream::terminated_abnormally`].

use std::fmt;
use std::io::{self, BufRead};
use std::iter::FusedIterator;

use serde::de::DeserializeOwned;

use crate::error::ApiError;

const DATA_PREFIX: &str = "data: ";

/// Reader type used for live HTTP bodies.
pub type BodyReader = Box<dyn BufRead + Send>;

/// Observable position of a [`FrameStream`] in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing cached; the next `has_next` reads from the wire.
    Fetching,
    /// One decoded frame is cached and not yet consumed.
    Ready,
    /// The server ended the body.
    Exhausted,
    /// Released by `close`, drop of the reader, or a read error.
    Closed,
}

enum Slot<T> {
    Fetching,
    Ready(Result<T, ApiError>),
    Exhausted,
    Closed,
}

/// One raw event pulled off the reader.
enum Event {
    Line {
        bytes: Vec<u8>,
        /// `false` when EOF arrived before the line's newline.
        terminated: bool,
        separator_error: Option<io::Error>,
    },
    End,
    Failed(io::Error),
}

/// Single-pass, closeable sequence of frames decoded from an SSE body.
///
/// Holds the open connection until it is exhausted, closed or dropped.
/// A `FrameStream` is meant for exactly one consumer; it must not be shared
/// between threads or iterated from two places.
pub struct FrameStream<T, R = BodyReader> {
    reader: Option<R>,
    slot: Slot<T>,
    abnormal: bool,
    frames: usize,
    request_id: Option<String>,
    status: u16,
}

impl<T, R> FrameStream<T, R>
where
    T: DeserializeOwned,
    R: BufRead,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            slot: Slot::Fetching,
            abnormal: false,
            frames: 0,
            request_id: None,
            status: 200,
        }
    }

    /// Attach response metadata used in decode errors and logs.
    pub fn with_context(mut self, request_id: Option<String>, status: u16) -> Self {
        self.request_id = request_id;
        self.status = status;
        self
    }

    /// Whether another frame is available.
    ///
    /// This performs blocking I/O: when no frame is cached it reads the next
    /// event from the connection and caches it. A cached frame is never read
    /// over or discarded.
    pub fn has_next(&mut self) -> bool {
        if matches!(self.slot, Slot::Fetching) {
            self.fetch();
        }
        matches!(self.slot, Slot::Ready(_))
    }

    /// Consume the next frame.
    ///
    /// A frame whose payload is not valid JSON for `T` is returned as
    /// `ApiError::Decode`; the stream stays usable. Returns
    /// `ApiError::Exhausted` once the stream is exhausted or closed.
    pub fn next_frame(&mut self) -> Result<T, ApiError> {
        if !self.has_next() {
            return Err(ApiError::Exhausted);
        }
        match std::mem::replace(&mut self.slot, Slot::Fetching) {
            Slot::Ready(frame) => {
                self.frames += 1;
                frame
            }
            other => {
                self.slot = other;
                Err(ApiError::Exhausted)
            }
        }
    }

    /// Release the connection. Idempotent, and a no-op after exhaustion.
    pub fn close(&mut self) {
        self.reader = None;
        if !matches!(self.slot, Slot::Exhausted | Slot::Closed) {
            tracing::debug!(request_id = ?self.request_id, frames = self.frames, "frame stream closed");
            self.slot = Slot::Closed;
        }
    }

    pub fn state(&self) -> StreamState {
        match self.slot {
            Slot::Fetching => StreamState::Fetching,
            Slot::Ready(_) => StreamState::Ready,
            Slot::Exhausted => StreamState::Exhausted,
            Slot::Closed => StreamState::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == StreamState::Closed
    }

    /// `true` if the stream ended on a swallowed read error or a truncated
    /// final line rather than a clean end of body.
    pub fn terminated_abnormally(&self) -> bool {
        self.abnormal
    }

    /// Number of frames handed out so far, decode failures included.
    pub fn frames_consumed(&self) -> usize {
        self.frames
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    fn fetch(&mut self) {
        let Some(reader) = self.reader.as_mut() else {
            self.slot = Slot::Closed;
            return;
        };
        match read_event(reader) {
            Event::End => self.finish(Slot::Exhausted),
            Event::Failed(err) => {
                self.mark_abnormal(&err.to_string());
                self.finish(Slot::Closed);
            }
            Event::Line {
                bytes,
                terminated,
                separator_error,
            } => {
                if let Some(err) = separator_error {
                    // The frame is intact; deliver it and stop afterwards.
                    self.mark_abnormal(&err.to_string());
                    self.reader = None;
                }
                self.decode(bytes, terminated);
            }
        }
    }

    fn decode(&mut self, bytes: Vec<u8>, terminated: bool) {
        let decoded = match String::from_utf8(bytes) {
            Ok(line) => serde_json::from_str::<T>(strip_data_prefix(&line))
                .map_err(|err| (err.to_string(), line)),
            Err(err) => {
                let message = err.to_string();
                Err((message, String::from_utf8_lossy(err.as_bytes()).into_owned()))
            }
        };
        match decoded {
            Ok(frame) => self.slot = Slot::Ready(Ok(frame)),
            Err(_) if !terminated => {
                self.mark_abnormal("stream ended in the middle of a frame");
                self.finish(Slot::Exhausted);
            }
            Err((message, line)) => {
                self.slot = Slot::Ready(Err(ApiError::Decode {
                    request_id: self.request_id.clone(),
                    status: self.status,
                    message,
                    body: line,
                }));
            }
        }
    }

    fn finish(&mut self, end: Slot<T>) {
        self.reader = None;
        self.slot = end;
        tracing::debug!(request_id = ?self.request_id, frames = self.frames, "frame stream ended");
    }

    fn mark_abnormal(&mut self, cause: &str) {
        self.abnormal = true;
        tracing::warn!(request_id = ?self.request_id, frames = self.frames, %cause, "frame stream terminated abnormally");
    }
}

impl<T, R> Iterator for FrameStream<T, R>
where
    T: DeserializeOwned,
    R: BufRead,
{
    type Item = Result<T, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.next_frame())
    }
}

impl<T, R> FusedIterator for FrameStream<T, R>
where
    T: DeserializeOwned,
    R: BufRead,
{
}

impl<T, R> fmt::Debug for FrameStream<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot {
            Slot::Fetching => "Fetching",
            Slot::Ready(_) => "Ready",
            Slot::Exhausted => "Exhausted",
            Slot::Closed => "Closed",
        };
        f.debug_struct("FrameStream")
            .field("state", &state)
            .field("frames", &self.frames)
            .field("abnormal", &self.abnormal)
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// Read one data line (skipping blank lines) and discard the line after it.
fn read_event<R: BufRead>(reader: &mut R) -> Event {
    let (bytes, terminated) = loop {
        match read_line(reader) {
            Ok(None) => return Event::End,
            Ok(Some((bytes, _))) if bytes.iter().all(u8::is_ascii_whitespace) => continue,
            Ok(Some(line)) => break line,
            Err(err) => return Event::Failed(err),
        }
    };
    let separator_error = if terminated {
        read_line(reader).err()
    } else {
        None
    };
    Event::Line {
        bytes,
        terminated,
        separator_error,
    }
}

/// Next line's raw bytes without their terminator, or `None` at end of body.
///
/// Bytes are not checked for UTF-8 here; a bad line is one bad frame.
fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<(Vec<u8>, bool)>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    let terminated = buf.last() == Some(&b'\n');
    if terminated {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some((buf, terminated)))
}

fn strip_data_prefix(line: &str) -> &str {
    line.strip_prefix(DATA_PREFIX).unwrap_or(line)
}
