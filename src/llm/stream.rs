//! Incremental decoding of Ollama's newline-delimited JSON chat stream.
//!
//! Bytes are buffered until a `\n` arrives, so a frame (or a multi-byte
//! character) split across reads is reassembled before parsing. A complete
//! line that still fails to parse is dropped without surfacing an error.

use std::collections::VecDeque;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;

use super::error::{LlmError, LlmResult};

/// Event produced while consuming a chat stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text delta to append to the reply.
    Delta(String),
    /// The reply is complete.
    Done,
}

/// One decoded frame of the chat stream.
#[derive(Debug, Default, Deserialize)]
pub struct ChatFrame {
    /// Message fragment, absent on some control frames.
    #[serde(default)]
    pub message: Option<FrameMessage>,
    /// Set on the final frame.
    #[serde(default)]
    pub done: bool,
    /// Error reported by the server after streaming started.
    #[serde(default)]
    pub error: Option<String>,
}

/// Message fragment inside a [`ChatFrame`].
#[derive(Debug, Default, Deserialize)]
pub struct FrameMessage {
    /// Text delta.
    #[serde(default)]
    pub content: String,
}

/// Line-buffering NDJSON decoder.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to hold no newline.
    scanned: usize,
}

impl NdjsonDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
        }
    }

    /// Feed a chunk and return every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ChatFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let line_end = self.scanned + offset;
            if let Some(frame) = parse_line(&self.buf[line_start..line_end]) {
                frames.push(frame);
            }
            line_start = line_end + 1;
            self.scanned = line_start;
        }

        self.buf.drain(..line_start);
        self.scanned = self.buf.len();
        frames
    }

    /// Parse whatever remains once the transport has closed.
    pub fn finish(&mut self) -> Option<ChatFrame> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buf);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Option<ChatFrame> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<ChatFrame>(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::debug!("Dropping unparseable stream line ({e}): {text}");
            None
        }
    }
}

/// A chat reply being streamed from the server.
pub struct ChatStream {
    body: BoxStream<'static, LlmResult<Vec<u8>>>,
    decoder: NdjsonDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl ChatStream {
    /// Wrap a raw byte stream.
    #[must_use]
    pub fn new(body: BoxStream<'static, LlmResult<Vec<u8>>>) -> Self {
        Self {
            body,
            decoder: NdjsonDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Next event, or `None` once [`StreamEvent::Done`] has been returned.
    ///
    /// # Errors
    /// Returns an error when the transport fails mid-stream or the server
    /// reports an error frame.
    pub async fn next_event(&mut self) -> LlmResult<Option<StreamEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            match self.body.next().await {
                Some(Ok(chunk)) => {
                    for frame in self.decoder.push(&chunk) {
                        self.absorb(frame)?;
                        if self.finished {
                            break;
                        }
                    }
                }
                Some(Err(e)) => return Err(e),
                None => {
                    if let Some(frame) = self.decoder.finish() {
                        self.absorb(frame)?;
                    }
                    if !self.finished {
                        tracing::warn!("Chat stream closed without a completion frame");
                        self.pending.push_back(StreamEvent::Done);
                        self.finished = true;
                    }
                }
            }
        }
    }

    fn absorb(&mut self, frame: ChatFrame) -> LlmResult<()> {
        if let Some(error) = frame.error {
            self.finished = true;
            return Err(LlmError::Upstream(error));
        }
        if let Some(message) = frame.message.filter(|m| !m.content.is_empty()) {
            self.pending.push_back(StreamEvent::Delta(message.content));
        }
        if frame.done {
            self.pending.push_back(StreamEvent::Done);
            self.finished = true;
        }
        Ok(())
    }
}

#[cfg(test)]
impl ChatStream {
    /// Build a stream from in-memory chunks.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let chunks: Vec<LlmResult<Vec<u8>>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::new(futures::stream::iter(chunks).boxed())
    }

    /// Drain the stream and return the assembled reply.
    pub async fn collect_text(mut self) -> LlmResult<String> {
        let mut text = String::new();
        while let Some(event) = self.next_event().await? {
            if let StreamEvent::Delta(delta) = event {
                text.push_str(&delta);
            }
        }
        Ok(text)
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("pending", &self.pending)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(mut stream: ChatStream) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = stream.next_event().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_decoder_long_line_in_many_reads() {
        let content = "y".repeat(4_000);
        let line = format!("{{\"message\":{{\"content\":\"{content}\"}}}}\n{{\"done\":true}}\n");
        let mut decoder = NdjsonDecoder::new();
        let mut frames = Vec::new();
        for byte in line.as_bytes() {
            frames.extend(decoder.push(std::slice::from_ref(byte)));
            assert_eq!(decoder.scanned, decoder.buf.len());
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].message.as_ref().map(|m| m.content.len()), Some(4_000));
        assert!(frames[1].done);
        assert!(decoder.buf.is_empty());
    }

    #[test]
    fn test_decoder_several_lines_in_one_read() {
        let mut decoder = NdjsonDecoder::new();
        let frames = decoder.push(b"{\"message\":{\"content\":\"a\"}}\n\n{\"message\":{\"content\":\"b\"}}\n{\"mess");
        let text: Vec<String> = frames.into_iter().filter_map(|f| f.message.map(|m| m.content)).collect();
        assert_eq!(text, vec!["a", "b"]);
        assert_eq!(decoder.buf, b"{\"mess".to_vec());

        let tail = decoder.push(b"age\":{\"content\":\"c\"}}\n");
        assert_eq!(tail.len(), 1);
        assert!(decoder.buf.is_empty());
    }

    #[test]
    fn test_decoder_reassembles_split_frame() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(br#"{"message":{"con"#).is_empty());
        let frames = decoder.push(b"tent\":\"Hi\"}}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].message.as_ref().map(|m| m.content.as_str()),
            Some("Hi")
        );
    }

    #[test]
    fn test_decoder_reassembles_split_multibyte_char() {
        let line = "{\"message\":{\"content\":\"caf\u{e9}\"}}\n".as_bytes();
        let split = line.len() - 5;
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        let frames = decoder.push(&line[split..]);
        assert_eq!(
            frames[0].message.as_ref().map(|m| m.content.as_str()),
            Some("caf\u{e9}")
        );
    }

    #[test]
    fn test_decoder_drops_garbage_lines() {
        let mut decoder = NdjsonDecoder::new();
        let frames = decoder.push(b"not json\n{\"done\":true}\n\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].done);
    }

    #[test]
    fn test_decoder_finish_parses_unterminated_tail() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(br#"{"done":true}"#).is_empty());
        assert!(decoder.finish().is_some_and(|f| f.done));
        assert!(decoder.finish().is_none());
    }

    #[tokio::test]
    async fn test_stream_assembles_text_once() {
        let stream = ChatStream::from_chunks([
            "{\"message\":{\"content\":\"Hi\"}}\n{\"message\":{\"content\":\" there\"}}\n",
            "{\"message\":{\"content\":\"\"},\"done\":true}\n",
        ]);
        let events = drain(stream).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hi".to_string()),
                StreamEvent::Delta(" there".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_split_at_every_byte() {
        let body = "{\"message\":{\"content\":\"Hi\"}}\n{\"message\":{\"content\":\" there\"}}\n{\"done\":true}\n";
        let chunks: Vec<Vec<u8>> = body.bytes().map(|b| vec![b]).collect();
        let text = ChatStream::from_chunks(chunks).collect_text().await.ok();
        assert_eq!(text.as_deref(), Some("Hi there"));
    }

    #[tokio::test]
    async fn test_stream_close_without_done_is_implicit_done() {
        let stream = ChatStream::from_chunks(["{\"message\":{\"content\":\"partial\"}}\n"]);
        let events = drain(stream).await;
        assert_eq!(
            events,
            vec![StreamEvent::Delta("partial".to_string()), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_stream_ignores_frames_after_done() {
        let stream = ChatStream::from_chunks([
            "{\"message\":{\"content\":\"a\"},\"done\":true}\n{\"message\":{\"content\":\"b\"}}\n",
        ]);
        let text = stream.collect_text().await.ok();
        assert_eq!(text.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_stream_error_frame() {
        let mut stream = ChatStream::from_chunks([
            "{\"message\":{\"content\":\"a\"}}\n{\"error\":\"model not found\"}\n",
        ]);
        let first = stream.next_event().await;
        assert!(matches!(first, Err(LlmError::Upstream(ref msg)) if msg == "model not found"));
    }

    #[tokio::test]
    async fn test_stream_transport_error() {
        let chunks: Vec<LlmResult<Vec<u8>>> = vec![
            Ok(b"{\"message\":{\"content\":\"a\"}}\n".to_vec()),
            Err(LlmError::Malformed("connection reset".to_string())),
        ];
        let mut stream = ChatStream::new(futures::stream::iter(chunks).boxed());
        assert_eq!(
            stream.next_event().await.ok().flatten(),
            Some(StreamEvent::Delta("a".to_string()))
        );
        assert!(stream.next_event().await.is_err());
    }
}
