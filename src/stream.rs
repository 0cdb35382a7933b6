// Reader for `data: <payload>` streamed response bodies

use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{StreamError, TransientParseError};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Identity and cancellation handle for one streamed request.
///
/// Cloning shares the token, so the owning view can cancel a read that runs
/// in another task.
#[derive(Debug, Clone)]
pub struct StreamControl {
    pub id: Uuid,
    cancel: CancellationToken,
}

impl StreamControl {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

impl Default for StreamControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles complete `\n`-terminated lines from arbitrarily split chunks.
///
/// Bytes are only decoded once a whole line is present, so a multi-byte
/// character or JSON payload split across reads is never corrupted.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Start of the bytes not yet returned as a line
    consumed: usize,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        // Compact once per chunk instead of once per line
        if self.consumed > 0 {
            self.pending.drain(..self.consumed);
            self.consumed = 0;
        }
        self.pending.extend_from_slice(bytes);
    }

    pub fn next_line(&mut self) -> Option<String> {
        let unread = &self.pending[self.consumed..];
        let end = unread.iter().position(|&b| b == b'\n')? + 1;
        let line = decode_line(&unread[..end]);
        self.consumed += end;
        Some(line)
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        let unread = &self.pending[self.consumed..];
        let line = (!unread.is_empty()).then(|| decode_line(unread));
        self.pending.clear();
        self.consumed = 0;
        line
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

/// One interpreted event line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Error(String),
    /// Comments, other SSE fields, keep-alives and payloads without content
    Skip,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    content: Option<String>,
    /// Any shape is accepted: a payload carrying an error is always fatal
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    choices: Vec<Choice>,
}

/// Message for an `error` field, or `None` when it is empty or `false`.
fn error_message(error: Value) -> Option<String> {
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) => Some(message),
        Value::Object(ref fields) => match fields.get("message") {
            Some(Value::String(message)) => Some(message.clone()),
            _ => Some(error.to_string()),
        },
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<ChoiceDelta>,
}

#[derive(Debug, Deserialize)]
struct ChoiceDelta {
    #[serde(default)]
    content: Option<String>,
}

impl Payload {
    fn into_event(self) -> StreamEvent {
        if let Some(message) = self.error.and_then(error_message) {
            return StreamEvent::Error(message);
        }

        let text = self.content.or_else(|| {
            self.choices
                .into_iter()
                .filter_map(|choice| choice.delta.and_then(|delta| delta.content))
                .reduce(|mut acc, part| {
                    acc.push_str(&part);
                    acc
                })
        });

        match text {
            Some(text) if !text.is_empty() => StreamEvent::Delta(text),
            _ => StreamEvent::Skip,
        }
    }
}

pub fn parse_event_line(line: &str) -> Result<StreamEvent, TransientParseError> {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(StreamEvent::Skip);
    };

    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(StreamEvent::Skip);
    }
    if payload == DONE_SENTINEL {
        return Ok(StreamEvent::Done);
    }

    serde_json::from_str::<Payload>(payload)
        .map(Payload::into_event)
        .map_err(|source| TransientParseError {
            payload: payload.to_string(),
            source,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOutcome {
    Continue,
    Done,
}

/// Consumes one streamed response body into its accumulated text.
#[derive(Debug)]
pub struct StreamingResponseReader {
    control: StreamControl,
    lines: LineBuffer,
    content: String,
    deltas: usize,
}

impl StreamingResponseReader {
    pub fn new(control: StreamControl) -> Self {
        Self {
            control,
            lines: LineBuffer::default(),
            content: String::new(),
            deltas: 0,
        }
    }

    /// Read `body` to completion, calling `on_delta` once per applied content
    /// fragment in arrival order.
    ///
    /// Returns the full accumulated text when `[DONE]` arrives or the body is
    /// exhausted. Error payloads, failed reads and cancellation end the read
    /// immediately.
    pub async fn read<S, B, E, F>(mut self, body: S, mut on_delta: F) -> Result<String, StreamError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        F: FnMut(&str),
    {
        futures::pin_mut!(body);
        let cancel = self.control.cancel.clone();
        debug!(stream_id = %self.control.id, "Stream started");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(stream_id = %self.control.id, deltas = self.deltas, "Stream cancelled");
                    return Err(StreamError::Cancelled);
                }
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    self.lines.push(chunk.as_ref());
                    while let Some(line) = self.lines.next_line() {
                        if self.apply_line(&line, &mut on_delta)? == LineOutcome::Done {
                            return Ok(self.complete());
                        }
                    }
                }
                Some(Err(err)) => {
                    error!(stream_id = %self.control.id, error = %err, "Stream read failed");
                    return Err(StreamError::Read(err.to_string()));
                }
                None => {
                    if let Some(line) = self.lines.finish() {
                        self.apply_line(&line, &mut on_delta)?;
                    }
                    return Ok(self.complete());
                }
            }
        }
    }

    fn apply_line<F: FnMut(&str)>(
        &mut self,
        line: &str,
        on_delta: &mut F,
    ) -> Result<LineOutcome, StreamError> {
        match parse_event_line(line) {
            Ok(StreamEvent::Delta(text)) => {
                self.content.push_str(&text);
                self.deltas += 1;
                on_delta(&text);
                Ok(LineOutcome::Continue)
            }
            Ok(StreamEvent::Done) => Ok(LineOutcome::Done),
            Ok(StreamEvent::Error(message)) => {
                error!(stream_id = %self.control.id, %message, "Stream reported an error");
                Err(StreamError::Fatal(message))
            }
            Ok(StreamEvent::Skip) => Ok(LineOutcome::Continue),
            Err(err) => {
                warn!(stream_id = %self.control.id, error = %err, "Skipping malformed stream line");
                Ok(LineOutcome::Continue)
            }
        }
    }

    fn complete(self) -> String {
        debug!(
            stream_id = %self.control.id,
            deltas = self.deltas,
            bytes = self.content.len(),
            "Stream completed"
        );
        self.content
    }
}
