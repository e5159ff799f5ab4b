//! Streaming of generated text from the model server.
//!
//! [`ContentStream`] pulls raw byte chunks from a response body, feeds them
//! through an [`SseDecoder`] and hands out the decoded text one fragment at a
//! time. A [`CancellationToken`] is checked at every read, so a caller can stop
//! the generation and tell that apart from a server failure.
//!
//! # Example
//!
//! ```rust
//! use futures::stream;
//! use ondevice_chat::stream::ContentStream;
//! use ondevice_chat::ChatError;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let body = "data: {\"choices\":[{\"delta\":{\"content\":\"4\"}}]}\n\ndata: [DONE]\n\n";
//! let source = stream::iter(vec![Ok::<_, ChatError>(body.as_bytes().to_vec())]);
//!
//! let mut fragments = ContentStream::new(source, CancellationToken::new());
//! assert_eq!(fragments.next_fragment().await?, Some("4".to_string()));
//! assert_eq!(fragments.next_fragment().await?, None);
//! # Ok::<(), ChatError>(())
//! # }).unwrap();
//! ```

mod decoder;

pub use decoder::{Frame, SseDecoder};

use crate::error::ChatError;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// How a [`ContentStream`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The server sent the `[DONE]` marker.
    DoneMarker,
    /// The body closed without a marker.
    Closed,
    /// The cancellation token fired.
    Cancelled,
    /// Reading the body failed.
    Failed,
}

impl StreamEnd {
    /// Whether the stream ended without error or cancellation.
    pub fn is_complete(self) -> bool {
        matches!(self, StreamEnd::DoneMarker | StreamEnd::Closed)
    }
}

enum Read<T> {
    Cancelled,
    Item(Option<T>),
}

/// Lazy sequence of generated text fragments.
pub struct ContentStream<S> {
    source: Option<Pin<Box<S>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    cancel: CancellationToken,
    end: Option<StreamEnd>,
}

impl<S, B, E> ContentStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ChatError>,
{
    pub fn new(source: S, cancel: CancellationToken) -> Self {
        Self {
            source: Some(Box::pin(source)),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            cancel,
            end: None,
        }
    }

    /// How the stream ended, once it has.
    pub fn end(&self) -> Option<StreamEnd> {
        self.end
    }

    /// Return the next fragment.
    ///
    /// `Ok(None)` means the stream completed, either through `[DONE]` or
    /// because the body closed. Cancellation yields [`ChatError::Cancelled`]
    /// and a failed read yields the underlying transport error. After any of
    /// these the stream stays ended and keeps returning `Ok(None)`.
    pub async fn next_fragment(&mut self) -> Result<Option<String>, ChatError> {
        loop {
            let live = self.end.is_none() || !self.pending.is_empty();
            if live && self.cancel.is_cancelled() {
                self.stop(StreamEnd::Cancelled);
                return Err(ChatError::Cancelled);
            }

            if let Some(fragment) = self.pending.pop_front() {
                tracing::trace!(len = fragment.len(), "fragment");
                return Ok(Some(fragment));
            }

            let Some(source) = self.source.as_mut() else {
                return Ok(None);
            };

            let cancel = &self.cancel;
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => Read::Cancelled,
                item = source.next() => Read::Item(item),
            };

            match read {
                Read::Cancelled => {
                    self.stop(StreamEnd::Cancelled);
                    return Err(ChatError::Cancelled);
                }
                Read::Item(Some(Ok(chunk))) => {
                    let frames = self.decoder.feed(chunk.as_ref());
                    self.enqueue(frames);
                    if self.decoder.is_done() {
                        self.close(StreamEnd::DoneMarker);
                    }
                }
                Read::Item(Some(Err(e))) => {
                    self.stop(StreamEnd::Failed);
                    let error: ChatError = e.into();
                    tracing::debug!(error = %error, "stream read failed");
                    return Err(error);
                }
                Read::Item(None) => {
                    let frames = self.decoder.finish();
                    self.enqueue(frames);
                    self.close(StreamEnd::Closed);
                }
            }
        }
    }

    /// Read the remaining fragments and concatenate them.
    pub async fn collect_text(&mut self) -> Result<String, ChatError> {
        let mut text = String::new();
        while let Some(fragment) = self.next_fragment().await? {
            text.push_str(&fragment);
        }
        Ok(text)
    }

    /// Adapt into a [`futures::Stream`] of fragments.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, ChatError>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut stream = state?;
            match stream.next_fragment().await {
                Ok(Some(fragment)) => Some((Ok(fragment), Some(stream))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    fn enqueue(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            if let Frame::Content(text) = frame {
                self.pending.push_back(text);
            }
        }
    }

    fn close(&mut self, end: StreamEnd) {
        tracing::debug!(?end, "generation stream ended");
        self.source = None;
        self.end = Some(end);
    }

    fn stop(&mut self, end: StreamEnd) {
        self.pending.clear();
        self.close(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::time::Duration;

    fn event(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "index": 0, "delta": { "content": content } }] })
        )
    }

    fn chunks(body: &str, size: usize) -> Vec<Result<Vec<u8>, ChatError>> {
        body.as_bytes()
            .chunks(size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect()
    }

    #[tokio::test]
    async fn test_fragments_until_done() {
        let body = format!("{}{}data: [DONE]\n\n", event("The answer"), event(" is 4"));
        let mut fragments = ContentStream::new(stream::iter(chunks(&body, 7)), CancellationToken::new());

        assert_eq!(fragments.next_fragment().await.unwrap(), Some("The answer".to_string()));
        assert_eq!(fragments.next_fragment().await.unwrap(), Some(" is 4".to_string()));
        assert_eq!(fragments.next_fragment().await.unwrap(), None);
        assert_eq!(fragments.end(), Some(StreamEnd::DoneMarker));

        // Stays ended
        assert_eq!(fragments.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_done_and_close_give_same_text() {
        let preamble = format!("{}{}{}", event("a"), event("ß"), event("ç"));
        let with_done = format!("{}data: [DONE]\n\n", preamble);

        let mut done = ContentStream::new(stream::iter(chunks(&with_done, 3)), CancellationToken::new());
        let mut closed = ContentStream::new(stream::iter(chunks(&preamble, 5)), CancellationToken::new());

        assert_eq!(done.collect_text().await.unwrap(), "aßç");
        assert_eq!(closed.collect_text().await.unwrap(), "aßç");
        assert_eq!(done.end(), Some(StreamEnd::DoneMarker));
        assert_eq!(closed.end(), Some(StreamEnd::Closed));
        assert!(done.end().unwrap().is_complete());
        assert!(closed.end().unwrap().is_complete());
        assert!(!StreamEnd::Cancelled.is_complete());
    }

    #[tokio::test]
    async fn test_no_reads_after_done() {
        let body = format!("{}data: [DONE]\n\n", event("x"));
        let source = stream::iter(chunks(&body, body.len()))
            .chain(stream::once(async { Err(ChatError::StreamError("must not be read".to_string())) }));
        let mut fragments = ContentStream::new(source, CancellationToken::new());

        assert_eq!(fragments.collect_text().await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let source = stream::iter(Vec::<Result<Vec<u8>, ChatError>>::new());
        let mut fragments = ContentStream::new(source, CancellationToken::new());

        assert_eq!(fragments.collect_text().await.unwrap(), "");
        assert_eq!(fragments.end(), Some(StreamEnd::Closed));
    }

    #[tokio::test]
    async fn test_read_error_is_surfaced() {
        let source = stream::iter(vec![
            Ok(event("partial").into_bytes()),
            Err(ChatError::StreamError("connection reset".to_string())),
        ]);
        let mut fragments = ContentStream::new(source, CancellationToken::new());

        assert_eq!(fragments.next_fragment().await.unwrap(), Some("partial".to_string()));
        let error = fragments.next_fragment().await.unwrap_err();
        assert!(error.is_transport());
        assert_eq!(fragments.end(), Some(StreamEnd::Failed));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_data() {
        let cancel = CancellationToken::new();
        let source = stream::iter(vec![Ok::<_, ChatError>(event("first").into_bytes())])
            .chain(stream::pending());
        let mut fragments = ContentStream::new(source, cancel.clone());

        assert_eq!(fragments.next_fragment().await.unwrap(), Some("first".to_string()));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let error = fragments.next_fragment().await.unwrap_err();
        assert!(error.is_cancelled());
        assert!(!error.is_transport());
        assert_eq!(fragments.end(), Some(StreamEnd::Cancelled));
        assert_eq!(fragments.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_before_first_read() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let body = event("never");
        let mut fragments = ContentStream::new(stream::iter(chunks(&body, 4)), cancel);

        assert!(fragments.next_fragment().await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_into_stream() {
        let body = format!("{}{}", event("one "), event("two"));
        let fragments = ContentStream::new(stream::iter(chunks(&body, 2)), CancellationToken::new());

        let collected: Vec<String> = fragments
            .into_stream()
            .map(|fragment| fragment.unwrap())
            .collect()
            .await;
        assert_eq!(collected, vec!["one ", "two"]);
    }

    #[test]
    fn test_block_on_collect() {
        let body = format!("{}data: [DONE]\n\n", event("sync"));
        let text = tokio_test::block_on(async {
            ContentStream::new(stream::iter(chunks(&body, 1)), CancellationToken::new())
                .collect_text()
                .await
        });
        assert_eq!(text.unwrap(), "sync");
    }
}
