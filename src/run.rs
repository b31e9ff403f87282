//! Run protocol state reduction.
//!
//! [`consume_run`] drains a frame stream, keeping only the latest parsed
//! event, notifying an observer of every frame as it arrives, and classifies
//! the run once the stream ends. The protocol has no end-of-run frame besides
//! the terminal run events themselves, so classification waits for the
//! transport to close.

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::SseFrame;
use crate::error::{AcpError, AcpResult, DEFAULT_RUN_FAILED_MESSAGE, NO_EVENT_MESSAGE};
use crate::types::{without_type, RunEvent};
use crate::utils::constants::{NO_RESPONSE_PLACEHOLDER, PARSE_ERROR_MESSAGE};

/// A notification raised while a run streams.
#[derive(Debug, Clone, PartialEq)]
pub enum RunNotification {
    /// A frame parsed: `key` is its `type`, `value` the rest of the payload.
    Update {
        /// The event's `type` tag.
        key: String,
        /// The event payload without `type`.
        value: Value,
    },
    /// A frame failed to parse, or the run failed.
    Error {
        /// Human-readable message.
        message: String,
    },
}

/// Receives run notifications, in wire order, at most once per frame.
pub trait RunObserver: Send {
    /// Handle one notification.
    fn notify(&mut self, notification: RunNotification);
}

impl<F> RunObserver for F
where
    F: FnMut(RunNotification) + Send,
{
    fn notify(&mut self, notification: RunNotification) {
        self(notification)
    }
}

/// Observer that discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn notify(&mut self, _notification: RunNotification) {}
}

/// Derived state of a run, from its latest parsed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing parsed yet.
    NoEvent,
    /// Latest event is not terminal.
    InProgress,
    /// Latest event is `run.completed`.
    Completed,
    /// Latest event is `run.failed`.
    Failed,
}

impl RunState {
    /// The state implied by `event`.
    pub fn of(event: Option<&ReceivedEvent>) -> Self {
        match event.map(|e| &e.event) {
            None => RunState::NoEvent,
            Some(RunEvent::RunCompleted(_)) => RunState::Completed,
            Some(RunEvent::RunFailed(_)) => RunState::Failed,
            Some(_) => RunState::InProgress,
        }
    }

    /// Whether the run has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// A parsed event together with the JSON it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedEvent {
    /// Typed view of the event.
    pub event: RunEvent,
    /// The frame's `data`, as parsed JSON.
    pub raw: Value,
}

impl ReceivedEvent {
    /// Parse a frame's data.
    ///
    /// # Errors
    ///
    /// [`AcpError::ProtocolParse`] if the data is not JSON.
    pub fn parse(frame: &SseFrame) -> AcpResult<Self> {
        let raw: Value = serde_json::from_str(&frame.data)
            .map_err(|err| AcpError::ProtocolParse(err.to_string()))?;
        Ok(Self {
            event: RunEvent::from_value(&raw),
            raw,
        })
    }

    /// The `type` tag exactly as received (empty when absent).
    pub fn kind(&self) -> &str {
        self.raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// How a successfully drained run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunClassification {
    /// `run.completed`: the concatenated output text.
    Completed {
        /// Every output part's content, in order.
        text: String,
    },
    /// The stream ended on an event this client does not classify. Carries a
    /// placeholder result.
    Unrecognized {
        /// Placeholder result text.
        placeholder: String,
    },
}

/// Result of [`consume_run`] for runs that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// The last event parsed before the stream ended.
    pub last_event: ReceivedEvent,
    /// How the run ended.
    pub classification: RunClassification,
}

impl RunSummary {
    /// The result text: output for completed runs, the placeholder otherwise.
    pub fn text(&self) -> &str {
        match &self.classification {
            RunClassification::Completed { text } => text,
            RunClassification::Unrecognized { placeholder } => placeholder,
        }
    }
}

/// Drain `frames` and classify the run.
///
/// Each frame whose data parses as JSON becomes the latest event and raises
/// an `Update` notification; frames that do not parse raise an `Error`
/// notification and are otherwise ignored. An upstream read error ends
/// consumption and is returned as-is.
///
/// # Errors
///
/// [`AcpError::Run`] if no event parsed, or if the last event is
/// `run.failed` (an `Error` notification with the same message is raised
/// first).
pub async fn consume_run<S>(mut frames: S, observer: &mut dyn RunObserver) -> AcpResult<RunSummary>
where
    S: Stream<Item = AcpResult<SseFrame>> + Unpin,
{
    let mut last_event: Option<ReceivedEvent> = None;

    while let Some(frame) = frames.next().await {
        let frame = frame?;
        match ReceivedEvent::parse(&frame) {
            Ok(received) => {
                debug!(event_type = received.kind(), "run event");
                observer.notify(RunNotification::Update {
                    key: received.kind().to_string(),
                    value: without_type(&received.raw),
                });
                last_event = Some(received);
            }
            Err(err) => {
                debug!(data = %frame.data, error = %err, "dropping run event");
                observer.notify(RunNotification::Error {
                    message: PARSE_ERROR_MESSAGE.to_string(),
                });
            }
        }
    }

    classify(last_event, observer)
}

fn classify(
    last_event: Option<ReceivedEvent>,
    observer: &mut dyn RunObserver,
) -> AcpResult<RunSummary> {
    let state = RunState::of(last_event.as_ref());
    let Some(last_event) = last_event else {
        return Err(AcpError::run(NO_EVENT_MESSAGE));
    };

    let classification = match &last_event.event {
        RunEvent::RunFailed(run) => {
            let message = run
                .error
                .as_ref()
                .and_then(|e| e.message.clone())
                .unwrap_or_else(|| DEFAULT_RUN_FAILED_MESSAGE.to_string());
            observer.notify(RunNotification::Error {
                message: message.clone(),
            });
            return Err(AcpError::run(message));
        }
        RunEvent::RunCompleted(run) => RunClassification::Completed {
            text: run.output_text(),
        },
        other => {
            warn!(event_type = other.kind(), ?state, "run ended on an unclassified event");
            RunClassification::Unrecognized {
                placeholder: NO_RESPONSE_PLACEHOLDER.to_string(),
            }
        }
    };

    Ok(RunSummary {
        last_event,
        classification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn frames<D: AsRef<str>>(data: &[D]) -> impl Stream<Item = AcpResult<SseFrame>> + Unpin {
        let items: Vec<AcpResult<SseFrame>> = data
            .iter()
            .map(|d| Ok(SseFrame::data(d.as_ref())))
            .collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn completed_run_concatenates_output() {
        let mut seen = Vec::new();
        let data = json!({
            "type": "run.completed",
            "run": {"output": [
                {"parts": [{"content": "Hel"}, {"content": "lo"}]},
                {"parts": [{"content": ", world"}]}
            ]}
        })
        .to_string();

        let summary = consume_run(frames(&[data]), &mut |n| seen.push(n))
            .await
            .unwrap();

        assert_eq!(summary.text(), "Hello, world");
        assert_eq!(summary.last_event.kind(), "run.completed");
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            RunNotification::Update { key, value } => {
                assert_eq!(key, "run.completed");
                assert!(value.get("type").is_none());
                assert!(value.get("run").is_some());
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_run_reports_embedded_message() {
        let mut seen = Vec::new();
        let data = json!({"type": "run.failed", "run": {"error": {"message": "boom"}}}).to_string();

        let err = consume_run(frames(&[data]), &mut |n| seen.push(n))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(
            seen.last(),
            Some(&RunNotification::Error {
                message: "boom".into()
            })
        );
    }

    #[tokio::test]
    async fn failed_run_without_error_uses_default_message() {
        let data = json!({"type": "run.failed", "run": {}}).to_string();
        let err = consume_run(frames(&[data]), &mut NoopObserver)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), DEFAULT_RUN_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn failed_run_with_loose_error_still_fails() {
        let cases = [
            (
                json!({"type": "run.failed", "run": {"error": {"code": "server_error"}}}),
                DEFAULT_RUN_FAILED_MESSAGE,
            ),
            (
                json!({"type": "run.failed", "run": {"error": {"code": 500, "message": "boom"}}}),
                "boom",
            ),
        ];
        for (data, expected) in cases {
            let mut seen = Vec::new();
            let err = consume_run(frames(&[data.to_string()]), &mut |n| seen.push(n))
                .await
                .unwrap_err();
            assert!(matches!(err, AcpError::Run(ref m) if m == expected));
            assert_eq!(
                seen.last(),
                Some(&RunNotification::Error {
                    message: expected.into()
                })
            );
        }
    }

    #[tokio::test]
    async fn completed_run_with_loose_snapshot_still_completes() {
        let null_output = json!({"type": "run.completed", "run": {"output": null}}).to_string();
        let summary = consume_run(frames(&[null_output]), &mut NoopObserver)
            .await
            .unwrap();
        assert_eq!(
            summary.classification,
            RunClassification::Completed { text: String::new() }
        );

        let numeric_id = json!({
            "type": "run.completed",
            "run": {"run_id": 123, "output": [{"parts": [{"content": "Hello"}]}]}
        })
        .to_string();
        let summary = consume_run(frames(&[numeric_id]), &mut NoopObserver)
            .await
            .unwrap();
        assert_eq!(summary.text(), "Hello");
    }

    #[tokio::test]
    async fn empty_stream_is_no_event() {
        let err = consume_run(frames::<&str>(&[]), &mut NoopObserver).await.unwrap_err();
        assert!(matches!(err, AcpError::Run(ref m) if m == NO_EVENT_MESSAGE));
    }

    #[tokio::test]
    async fn malformed_frame_notifies_and_continues() {
        let mut seen = Vec::new();
        let done = json!({"type": "run.completed", "run": {"output": [{"parts": [{"content": "ok"}]}]}})
            .to_string();

        let summary = consume_run(frames(&["{not json".to_string(), done]), &mut |n| seen.push(n))
            .await
            .unwrap();

        assert_eq!(summary.text(), "ok");
        let errors = seen
            .iter()
            .filter(|n| matches!(n, RunNotification::Error { .. }))
            .count();
        let updates = seen
            .iter()
            .filter(|n| matches!(n, RunNotification::Update { .. }))
            .count();
        assert_eq!((errors, updates), (1, 1));
        assert_eq!(
            seen[0],
            RunNotification::Error {
                message: PARSE_ERROR_MESSAGE.into()
            }
        );
    }

    #[tokio::test]
    async fn only_malformed_frames_is_no_event() {
        let err = consume_run(frames(&["nope", "still nope"]), &mut NoopObserver)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), NO_EVENT_MESSAGE);
    }

    #[tokio::test]
    async fn unclassified_terminal_event_is_placeholder_success() {
        let created = json!({"type": "run.created", "run": {}}).to_string();
        let cancelled = json!({"type": "run.cancelled", "run": {"status": "cancelled"}}).to_string();

        let summary = consume_run(frames(&[created, cancelled]), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(summary.text(), NO_RESPONSE_PLACEHOLDER);
        assert_eq!(summary.last_event.kind(), "run.cancelled");
    }

    #[tokio::test]
    async fn latest_event_wins() {
        let failed = json!({"type": "run.failed", "run": {"error": {"message": "early"}}}).to_string();
        let done = json!({"type": "run.completed", "run": {"output": []}}).to_string();

        let summary = consume_run(frames(&[failed, done]), &mut NoopObserver)
            .await
            .unwrap();
        assert_eq!(summary.text(), "");
    }

    #[tokio::test]
    async fn upstream_error_is_returned() {
        let items: Vec<AcpResult<SseFrame>> = vec![
            Ok(SseFrame::data(json!({"type": "run.created", "run": {}}).to_string())),
            Err(AcpError::Transport("connection reset".into())),
        ];
        let err = consume_run(stream::iter(items), &mut NoopObserver)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn run_state_from_event() {
        assert_eq!(RunState::of(None), RunState::NoEvent);
        let frame = SseFrame::data(json!({"type": "message.part", "part": {"content": "x"}}).to_string());
        let event = ReceivedEvent::parse(&frame).unwrap();
        assert!(matches!(
            ReceivedEvent::parse(&SseFrame::data("{nope")),
            Err(AcpError::ProtocolParse(_))
        ));
        assert_eq!(RunState::of(Some(&event)), RunState::InProgress);
        assert!(!RunState::InProgress.is_terminal());
        assert!(RunState::Failed.is_terminal());
    }
}
