//! Streaming text decoding for chat completions.
//!
//! Both providers stream line-oriented bodies:
//! - OpenAI: server-sent events, `data: {json}` lines, terminated by `data: [DONE]`
//! - Ollama: newline-delimited JSON objects, the last one has `"done": true`
//!
//! [`TextStream`] reads the HTTP body chunk by chunk, reassembles complete
//! lines (a line may span several network chunks, possibly splitting a
//! multi-byte character) and yields the text deltas in receipt order.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error_handler::{AiLlmError, Provider, ProviderError, ProviderErrorKind, Result};

/// Line protocol spoken by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Server-sent events with OpenAI chat-completion chunks.
    Sse,
    /// Newline-delimited JSON with Ollama chat chunks.
    Ndjson,
}

/// What a single protocol line means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A text delta (possibly empty).
    Text(String),
    /// Last text delta of the stream.
    Final(String),
    /// End-of-stream marker without text.
    Done,
    /// Keep-alives, comments, SSE metadata.
    Skip,
}

/// Reassembles complete lines from arbitrary byte chunks.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    /// Appends bytes and returns every line completed by them (without `\n`/`\r\n`).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Returns the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string())
    }
}

/// Decodes one protocol line.
pub fn decode_line(wire: WireFormat, provider: Provider, line: &str) -> Result<LineEvent> {
    match wire {
        WireFormat::Sse => decode_sse_line(provider, line),
        WireFormat::Ndjson => decode_ndjson_line(provider, line),
    }
}

fn decode_sse_line(provider: Provider, line: &str) -> Result<LineEvent> {
    let Some(data) = line.strip_prefix("data:") else {
        // event:, id:, retry:, ": keep-alive" and blank separators
        return Ok(LineEvent::Skip);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(LineEvent::Skip);
    }
    if data == "[DONE]" {
        return Ok(LineEvent::Done);
    }

    let chunk: SseChunk = serde_json::from_str(data).map_err(|e| decode_err(provider, e, data))?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::new(provider, ProviderErrorKind::Upstream(err.message)).into());
    }

    let text = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.and_then(|d| d.content))
        .collect::<String>();
    Ok(LineEvent::Text(text))
}

fn decode_ndjson_line(provider: Provider, line: &str) -> Result<LineEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(LineEvent::Skip);
    }

    let chunk: NdjsonChunk = serde_json::from_str(line).map_err(|e| decode_err(provider, e, line))?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::new(provider, ProviderErrorKind::Upstream(err)).into());
    }

    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    if chunk.done {
        if text.is_empty() {
            Ok(LineEvent::Done)
        } else {
            Ok(LineEvent::Final(text))
        }
    } else {
        Ok(LineEvent::Text(text))
    }
}

fn decode_err(provider: Provider, e: serde_json::Error, line: &str) -> AiLlmError {
    let preview: String = line.chars().take(120).collect();
    ProviderError::new(
        provider,
        ProviderErrorKind::Decode(format!("serde error: {e}; line: {preview}")),
    )
    .into()
}

/// Ordered stream of text deltas produced by a chat completion.
///
/// Not `Clone`: there is exactly one consumer, and it observes deltas in the
/// order the server sent them.
#[derive(Debug)]
pub struct TextStream {
    resp: reqwest::Response,
    wire: WireFormat,
    provider: Provider,
    lines: LineSplitter,
    pending: std::collections::VecDeque<String>,
    idle_timeout: Duration,
    finished: bool,
    produced_text: bool,
}

impl TextStream {
    pub(crate) fn new(
        resp: reqwest::Response,
        wire: WireFormat,
        provider: Provider,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            resp,
            wire,
            provider,
            lines: LineSplitter::default(),
            pending: Default::default(),
            idle_timeout,
            finished: false,
            produced_text: false,
        }
    }

    /// Returns the next non-empty text delta, or `None` once the stream ended.
    ///
    /// # Errors
    /// - [`AiLlmError::Timeout`] if no bytes arrive within the idle timeout
    /// - [`AiLlmError::HttpTransport`] if the connection breaks
    /// - [`AiLlmError::Provider`] with `Decode`/`Upstream` for bad or error lines,
    ///   and with `EmptyStream` if the stream ended without any text
    pub async fn next_chunk(&mut self) -> Result<Option<String>> {
        loop {
            while let Some(line) = self.pending.pop_front() {
                match decode_line(self.wire, self.provider, &line)? {
                    LineEvent::Text(t) if !t.is_empty() => return Ok(Some(self.emit(t))),
                    LineEvent::Final(t) => {
                        self.finish_stream();
                        return Ok(Some(self.emit(t)));
                    }
                    LineEvent::Done => {
                        self.finish_stream();
                        return self.end();
                    }
                    LineEvent::Text(_) | LineEvent::Skip => {}
                }
            }

            if self.finished {
                return self.end();
            }

            let next = timeout(self.idle_timeout, self.resp.chunk())
                .await
                .map_err(|_| AiLlmError::Timeout(self.idle_timeout))??;

            match next {
                Some(bytes) => {
                    trace!(bytes = bytes.len(), "stream chunk received");
                    self.pending.extend(self.lines.push(&bytes));
                }
                None => {
                    debug!(provider = %self.provider, "stream body ended");
                    self.pending.extend(self.lines.finish());
                    self.finished = true;
                }
            }
        }
    }

    /// Drains the stream into one string.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.push_str(&chunk);
        }
        Ok(out)
    }

    fn emit(&mut self, text: String) -> String {
        self.produced_text = true;
        text
    }

    fn finish_stream(&mut self) {
        self.finished = true;
        self.pending.clear();
    }

    fn end(&self) -> Result<Option<String>> {
        if self.produced_text {
            Ok(None)
        } else {
            Err(ProviderError::new(self.provider, ProviderErrorKind::EmptyStream).into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct SseChunk {
    #[serde(default)]
    choices: Vec<SseChoice>,
    #[serde(default)]
    error: Option<SseError>,
}

#[derive(Debug, Deserialize)]
struct SseChoice {
    #[serde(default)]
    delta: Option<SseDelta>,
}

#[derive(Debug, Deserialize)]
struct SseDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SseError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct NdjsonChunk {
    #[serde(default)]
    message: Option<NdjsonMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NdjsonMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitter_reassembles_lines_across_chunks() {
        let mut s = LineSplitter::default();
        assert!(s.push(b"data: {\"a\"").is_empty());
        assert_eq!(s.push(b":1}\r\ndata: x\n\npartial"), vec![
            "data: {\"a\":1}".to_string(),
            "data: x".to_string(),
            String::new(),
        ]);
        assert_eq!(s.finish(), Some("partial".to_string()));
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn splitter_keeps_multibyte_characters_intact() {
        let text = "é•\n".as_bytes();
        let mut s = LineSplitter::default();
        assert!(s.push(&text[..1]).is_empty());
        assert!(s.push(&text[1..3]).is_empty());
        assert_eq!(s.push(&text[3..]), vec!["é•".to_string()]);
    }

    #[test]
    fn sse_lines() {
        let p = Provider::OpenAI;
        assert_eq!(
            decode_line(
                WireFormat::Sse,
                p,
                r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#
            )
            .unwrap(),
            LineEvent::Text("Hel".into())
        );
        assert_eq!(
            decode_line(WireFormat::Sse, p, r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#)
                .unwrap(),
            LineEvent::Text(String::new())
        );
        assert_eq!(decode_line(WireFormat::Sse, p, "data: [DONE]").unwrap(), LineEvent::Done);
        assert_eq!(decode_line(WireFormat::Sse, p, ": keep-alive").unwrap(), LineEvent::Skip);
        assert_eq!(decode_line(WireFormat::Sse, p, "").unwrap(), LineEvent::Skip);
        assert!(decode_line(WireFormat::Sse, p, "data: {not json").is_err());

        let err = decode_line(
            WireFormat::Sse,
            p,
            r#"data: {"error":{"message":"You exceeded your current quota"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.category(), crate::error_handler::FailureCategory::QuotaExceeded);
    }

    #[test]
    fn ndjson_lines() {
        let p = Provider::Ollama;
        assert_eq!(
            decode_line(
                WireFormat::Ndjson,
                p,
                r#"{"message":{"role":"assistant","content":"=== "},"done":false}"#
            )
            .unwrap(),
            LineEvent::Text("=== ".into())
        );
        assert_eq!(
            decode_line(WireFormat::Ndjson, p, r#"{"message":{"content":""},"done":true}"#)
                .unwrap(),
            LineEvent::Done
        );
        assert_eq!(
            decode_line(WireFormat::Ndjson, p, r#"{"message":{"content":"end"},"done":true}"#)
                .unwrap(),
            LineEvent::Final("end".into())
        );
        assert!(decode_line(WireFormat::Ndjson, p, r#"{"error":"model not found"}"#).is_err());
    }
}
