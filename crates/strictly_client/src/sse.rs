//! Server-sent events over HTTP.
//!
//! [`SseParser`] turns raw body chunks into events; [`HttpSnapshotSource`]
//! uses it to implement [`SnapshotSource`] against the server's
//! `/api/sessions/{id}/events` stream.

use crate::error::ClientError;
use crate::rest_client::GameClient;
use crate::sync::{SnapshotSource, SnapshotStream};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::VecDeque;
use strictly_checkers::Session;
use tracing::{debug, trace, warn};

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseMessage {
    /// Event name, if the server set one.
    pub event: Option<String>,
    /// Last event id, if the server set one.
    pub id: Option<String>,
    /// Data lines joined with `\n`.
    pub data: String,
}

/// Incremental parser for the `text/event-stream` format.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    current: SseMessage,
    has_data: bool,
}

impl SseParser {
    /// Creates an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of the body and returns every event it completes.
    /// Partial lines are kept until the next chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(chunk);
        let mut messages = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }
        }
        messages
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            // Blank line dispatches the pending event.
            let message = std::mem::take(&mut self.current);
            let dispatch = std::mem::take(&mut self.has_data);
            return dispatch.then_some(message);
        }
        if line.starts_with(':') {
            trace!("SSE comment");
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.current.event = Some(value.to_string()),
            "id" => self.current.id = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_data = true;
            }
            other => trace!(field = other, "Ignoring SSE field"),
        }
        None
    }
}

/// Opens snapshot streams over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: GameClient,
}

impl HttpSnapshotSource {
    /// Creates a source using `client`'s server.
    pub fn new(client: GameClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn open(&self, session_id: &str) -> Result<Box<dyn SnapshotStream>, ClientError> {
        let response = self.client.open_events(session_id).await?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(Box::new(HttpSnapshotStream {
            body,
            parser: SseParser::new(),
            pending: VecDeque::new(),
        }))
    }
}

struct HttpSnapshotStream {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    parser: SseParser,
    pending: VecDeque<SseMessage>,
}

#[async_trait]
impl SnapshotStream for HttpSnapshotStream {
    async fn next(&mut self) -> Option<Result<Session, ClientError>> {
        loop {
            while let Some(message) = self.pending.pop_front() {
                if message.event.as_deref() != Some("snapshot") {
                    debug!(event = ?message.event, "Skipping non-snapshot event");
                    continue;
                }
                return Some(
                    serde_json::from_str(&message.data)
                        .map_err(|e| ClientError::Decode(e.to_string())),
                );
            }
            match self.body.next().await? {
                Ok(chunk) => self.pending.extend(self.parser.feed(&chunk)),
                Err(e) => {
                    warn!(error = %e, "Event stream failed");
                    return Some(Err(ClientError::from(e)));
                }
            }
        }
    }
}
