//! Newline-delimited JSON decoding.
//!
//! Turns an arbitrarily chunked byte stream into parsed fragments and, once
//! the stream ends, the last fragment that fully validated against the target
//! [`Schema`]. Lines that are not JSON are dropped without failing the stream.

use std::fmt;

use forecast_core::error::DomainError;
use forecast_core::generator::ByteStream;
use forecast_core::snapshot::SnapshotId;
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;

use crate::domain::schema::Schema;

/// Counters kept while decoding. Silently dropped lines and schema rejections
/// are tracked apart from forwarded fragments so that a stream with no valid
/// result can be told apart from one with unreadable lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Non-blank lines that were not valid JSON.
    pub lines_dropped: usize,
    /// Parsed fragments handed to the fragment callback.
    pub fragments_forwarded: usize,
    /// Forwarded fragments that failed the target schema.
    pub schema_rejections: usize,
    /// Forwarded fragments that fully validated.
    pub valid_candidates: usize,
}

impl fmt::Display for DecodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fragments, {} rejected, {} dropped lines",
            self.fragments_forwarded, self.schema_rejections, self.lines_dropped
        )
    }
}

/// Terminal decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The stream carried an explicit error fragment.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The stream ended without a single fragment that fully validated.
    #[error("no valid response received ({0})")]
    NoValidResponse(DecodeStats),

    /// The byte stream itself failed.
    #[error("stream transport failed: {0}")]
    Transport(String),
}

impl DecodeError {
    /// Wraps this failure as the reason a reserved snapshot failed.
    #[must_use]
    pub fn into_domain(self, snapshot_id: &SnapshotId) -> DomainError {
        DomainError::GenerationFailed {
            snapshot_id: snapshot_id.clone(),
            reason: self.to_string(),
        }
    }
}

/// The final result of a decoded stream.
#[derive(Debug)]
pub struct Decoded<S> {
    /// The last fragment that validated, typed.
    pub value: S,
    /// The same fragment as received.
    pub raw: Value,
    /// Counters for the whole stream.
    pub stats: DecodeStats,
}

/// Incremental decoder. Feed chunks with [`push`](Self::push), then call
/// [`finish`](Self::finish) once the stream has ended.
#[derive(Debug)]
pub struct NdjsonDecoder<S> {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    last_valid: Option<(S, Value)>,
    stats: DecodeStats,
}

impl<S: Schema> Default for NdjsonDecoder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> NdjsonDecoder<S> {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            last_valid: None,
            stats: DecodeStats::default(),
        }
    }

    /// Appends a chunk and processes every line it completes. Bytes after the
    /// last newline wait for the next chunk.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Upstream` as soon as a line carries an error.
    pub fn push(
        &mut self,
        chunk: &[u8],
        on_fragment: &mut impl FnMut(&Value),
    ) -> Result<(), DecodeError> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(chunk);

        let mut line_start = 0;
        let mut search_from = self.scanned;
        let mut result = Ok(());
        while let Some(offset) = buffer[search_from..].iter().position(|b| *b == b'\n') {
            let newline = search_from + offset;
            result = self.process_line(&buffer[line_start..newline], on_fragment);
            line_start = newline + 1;
            search_from = line_start;
            if result.is_err() {
                break;
            }
        }

        buffer.drain(..line_start);
        self.scanned = buffer.len();
        self.buffer = buffer;
        result
    }

    /// Gives any unterminated trailing content one last attempt and returns
    /// the last valid fragment.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Upstream` if the trailing content carries an
    /// error, and `DecodeError::NoValidResponse` if nothing ever validated.
    pub fn finish(mut self, on_fragment: &mut impl FnMut(&Value)) -> Result<Decoded<S>, DecodeError> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        self.process_line(&rest, on_fragment)?;

        match self.last_valid {
            Some((value, raw)) => Ok(Decoded {
                value,
                raw,
                stats: self.stats,
            }),
            None => Err(DecodeError::NoValidResponse(self.stats)),
        }
    }

    fn process_line(
        &mut self,
        line: &[u8],
        on_fragment: &mut impl FnMut(&Value),
    ) -> Result<(), DecodeError> {
        let Ok(text) = std::str::from_utf8(line) else {
            self.stats.lines_dropped += 1;
            return Ok(());
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let Ok(fragment) = serde_json::from_str::<Value>(text) else {
            self.stats.lines_dropped += 1;
            return Ok(());
        };

        if let Some(error) = fragment.get("error").filter(|e| is_truthy(e)) {
            let message = match error {
                Value::String(message) => message.clone(),
                other => other.to_string(),
            };
            return Err(DecodeError::Upstream(message));
        }

        on_fragment(&fragment);
        self.stats.fragments_forwarded += 1;

        match serde_json::from_value::<S>(fragment.clone()) {
            Ok(candidate) if candidate.validate().is_ok() => {
                self.stats.valid_candidates += 1;
                self.last_valid = Some((candidate, fragment));
            }
            _ => self.stats.schema_rejections += 1,
        }
        Ok(())
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Drains `stream` through a fresh decoder, calling `on_fragment` for every
/// forwarded fragment in arrival order.
///
/// # Errors
///
/// Returns `DecodeError::Transport` if the stream yields an error, and any
/// error from [`NdjsonDecoder::push`] or [`NdjsonDecoder::finish`].
pub async fn decode_stream<S: Schema>(
    mut stream: ByteStream,
    mut on_fragment: impl FnMut(&Value),
) -> Result<Decoded<S>, DecodeError> {
    let mut decoder = NdjsonDecoder::<S>::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(DecodeError::Transport)?;
        decoder.push(&chunk, &mut on_fragment)?;
    }
    decoder.finish(&mut on_fragment)
}
