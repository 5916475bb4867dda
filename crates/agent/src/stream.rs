//! Streaming side channel for a turn
//!
//! Events flow through a bounded channel. The receiving [`TurnStream`]
//! owns a drop guard on the turn's cancellation token, so a consumer that
//! walks away stops the turn.

use crate::graph::Node;
use crate::orchestrator::TurnOutput;
use futures::Stream;
use ragwise_common::errors::ErrorCode;
use ragwise_common::AppError;
use serde::Serialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

/// Progress of a turn, in emission order
///
/// Tokens belong to the attempt announced by the preceding
/// `GenerationStarted`. An attempt that fails grading is followed by
/// `GenerationDiscarded`, so the final answer is the text of the last
/// attempt that was not discarded, or the fallback in `Completed` when
/// every attempt was.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    NodeEntered { node: Node },
    GenerationStarted { attempt: u32 },
    Token { text: String },
    /// The attempt's tokens are not part of the answer
    GenerationDiscarded { attempt: u32 },
    /// Last event of a successful turn
    Completed { output: TurnOutput },
    /// Last event of a failed turn
    Error { code: ErrorCode, message: String },
}

impl TurnEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::NodeEntered { .. } => "node_entered",
            TurnEvent::GenerationStarted { .. } => "generation_started",
            TurnEvent::Token { .. } => "token",
            TurnEvent::GenerationDiscarded { .. } => "generation_discarded",
            TurnEvent::Completed { .. } => "completed",
            TurnEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Completed { .. } | TurnEvent::Error { .. })
    }

    pub(crate) fn from_error(error: &AppError) -> Self {
        let details = error.details();
        TurnEvent::Error {
            code: details.code,
            message: details.message,
        }
    }
}

/// Sending half handed to the orchestrator; a disabled sink drops events
#[derive(Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::Sender<TurnEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<TurnEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub async fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.tx {
            // A closed receiver means the consumer left; the drop guard cancels the turn
            let _ = tx.send(event).await;
        }
    }
}

/// Events of one streaming turn
pub struct TurnStream {
    rx: mpsc::Receiver<TurnEvent>,
    _cancel_on_drop: DropGuard,
}

impl TurnStream {
    pub(crate) fn new(rx: mpsc::Receiver<TurnEvent>, cancel_on_drop: DropGuard) -> Self {
        Self {
            rx,
            _cancel_on_drop: cancel_on_drop,
        }
    }
}

impl Stream for TurnStream {
    type Item = TurnEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_event_serialization() {
        let event = TurnEvent::NodeEntered { node: Node::GradeDocuments };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "type": "node_entered", "node": "GRADE_DOCUMENTS" })
        );

        let event = TurnEvent::from_error(&AppError::Cancelled);
        assert_eq!(event.name(), "error");
        assert!(event.is_terminal());
        assert_eq!(serde_json::to_value(&event).unwrap()["code"], "CANCELLED");
    }

    #[tokio::test]
    async fn test_stream_yields_sent_events() {
        let (tx, rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let mut stream = TurnStream::new(rx, token.clone().drop_guard());

        let sink = EventSink::new(tx);
        sink.emit(TurnEvent::Token { text: "hi".to_string() }).await;
        drop(sink);

        assert!(matches!(stream.next().await, Some(TurnEvent::Token { ref text }) if text == "hi"));
        assert!(stream.next().await.is_none());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels() {
        let (_tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let stream = TurnStream::new(rx, token.clone().drop_guard());

        drop(stream);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_disabled_sink_discards() {
        let sink = EventSink::disabled();
        assert!(!sink.is_enabled());
        sink.emit(TurnEvent::GenerationStarted { attempt: 1 }).await;
    }
}
