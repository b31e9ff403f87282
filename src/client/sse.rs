//! Event-stream framing for streamed run responses.
//!
//! A response body is a sequence of frames separated by blank lines. Each
//! frame has an optional `event:` line and one or more `data:` lines; the
//! data lines are joined with `\n`. Comment lines (`:` prefix) are keep-alive
//! noise. Frames that carry no data, or that contain undecodable bytes, are
//! dropped without ending the stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AcpError, AcpResult};

/// Channel capacity between the reader task and the consumer.
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// One frame read off an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The `event:` name, if the frame had one.
    pub event: Option<String>,
    /// The `data:` lines joined with `\n`.
    pub data: String,
    /// The `id:` field, if present.
    pub id: Option<String>,
}

impl SseFrame {
    /// A frame with only a data field.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }
}

/// Incremental frame decoder.
///
/// Feed it raw body chunks with [`push`](Self::push); it returns every frame
/// completed by that chunk. Chunk boundaries may fall anywhere, including
/// inside a multi-byte character.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    malformed: bool,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of body bytes, returning the frames it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush at end of body: a trailing unterminated line and any frame still
    /// being assembled are dispatched.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &[u8]) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }

        let Ok(line) = std::str::from_utf8(line) else {
            self.malformed = true;
            return None;
        };

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry:` and unknown fields carry nothing for us.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        let data = std::mem::take(&mut self.data);
        let malformed = std::mem::replace(&mut self.malformed, false);

        if malformed {
            debug!("dropping event frame with invalid UTF-8");
            return None;
        }
        if data.is_empty() {
            if event.is_some() {
                debug!(event = ?event, "dropping event frame without data");
            }
            return None;
        }

        Some(SseFrame {
            event,
            data: data.join("\n"),
            id,
        })
    }
}

/// A stream of frames read from a run response.
///
/// A background task reads the body and decodes frames into a channel. The
/// stream ends when the server closes the connection, after the first
/// upstream read error (yielded as the last item), or when the cancellation
/// token fires. Cancellation is observed at the next read boundary and never
/// surfaces as an error.
///
/// # Example
///
/// ```no_run
/// # async fn example(mut stream: acp_rs::client::EventStream) {
/// while let Some(frame) = stream.next().await {
///     match frame {
///         Ok(frame) => println!("data: {}", frame.data),
///         Err(e) => eprintln!("stream error: {}", e),
///     }
/// }
/// # }
/// ```
pub struct EventStream {
    receiver: mpsc::Receiver<AcpResult<SseFrame>>,
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl EventStream {
    /// Spawn a reader for `response`, stopping when `cancel` fires.
    pub(crate) fn from_response(response: reqwest::Response, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let task = tokio::spawn(read_frames(response, tx, cancel.clone()));

        Self {
            receiver: rx,
            cancel,
            task: Some(task),
        }
    }

    /// A stream that yields nothing. Used when a run is cancelled before the
    /// server answered.
    pub(crate) fn closed(cancel: CancellationToken) -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self {
            receiver: rx,
            cancel,
            task: None,
        }
    }

    /// Get the next frame.
    ///
    /// Returns `None` once the stream is exhausted or cancelled.
    pub async fn next(&mut self) -> Option<AcpResult<SseFrame>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Abort the underlying connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this stream.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Stream for EventStream {
    type Item = AcpResult<SseFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Read `response` to completion, forwarding decoded frames to `tx`.
async fn read_frames(
    response: reqwest::Response,
    tx: mpsc::Sender<AcpResult<SseFrame>>,
    cancel: CancellationToken,
) {
    use futures::StreamExt;

    let mut body = response.bytes_stream();
    let mut decoder = FrameDecoder::new();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("event stream cancelled, closing connection");
                return;
            }

            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    for frame in decoder.push(&bytes) {
                        if tx.send(Ok(frame)).await.is_err() {
                            // Receiver dropped.
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    let _ = tx
                        .send(Err(AcpError::from_reqwest("reading event stream", e)))
                        .await;
                    return;
                }
                None => {
                    if let Some(frame) = decoder.finish() {
                        let _ = tx.send(Ok(frame)).await;
                    }
                    return;
                }
            }
        }
    }
}
