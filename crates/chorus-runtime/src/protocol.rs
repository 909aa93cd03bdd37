//! The streaming protocol exposed to the HTTP layer (spec §6).
//!
//! `Stream` produces, in order, exactly one of two event sequences:
//! zero or more [`StreamEvent::Stream`] events carrying the cumulative
//! assistant text, followed by a terminal [`StreamEvent::Done`] or
//! [`StreamEvent::Error`]. The `ack` event is emitted by the HTTP layer
//! itself (it persists the user message before calling `Stream`) and so
//! has no representation here.

use chorus_core::{ChorusError, Message, SessionId};

/// One event in a streaming turn, handed to the caller-supplied `ChunkFn`.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Cumulative assistant text so far.
    Stream {
        /// The session this chunk belongs to.
        session_id: SessionId,
        /// Cumulative text emitted so far this turn.
        text: String,
    },
    /// The turn completed successfully.
    Done {
        /// The persisted user message.
        user_message: Message,
        /// The persisted assistant message.
        assistant_message: Message,
        /// The session's title, present only if this turn generated one
        /// (spec §4.6.1 step 3 / §8 property 6).
        title: Option<String>,
    },
    /// The turn failed; no further events follow.
    Error {
        /// A message suitable for an SSE `error` event payload.
        message: String,
    },
}

impl StreamEvent {
    /// Build an [`StreamEvent::Error`] from a [`ChorusError`].
    #[must_use]
    pub fn error(err: &ChorusError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

/// A callback invoked once per token batch during a streaming turn
/// (spec §4.6.2 step 5, "`ChunkFn(cumulativeText) -> error`").
///
/// Returning `Err` aborts the stream (spec §4.5): the executor stops
/// calling the provider and the turn fails with
/// [`ChorusError::Cancelled`].
pub type ChunkFn = Box<dyn FnMut(StreamEvent) -> Result<(), ChorusError> + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_event_carries_display_string() {
        let err = ChorusError::DispatcherBusy;
        let event = StreamEvent::error(&err);
        assert!(matches!(event, StreamEvent::Error { message } if message == "dispatcher busy"));
    }

    #[test]
    fn chunk_fn_can_abort_a_stream() {
        let mut seen = Vec::new();
        let mut chunk_fn: ChunkFn = Box::new(move |event| {
            if let StreamEvent::Stream { ref text, .. } = event {
                seen.push(text.clone());
            }
            if seen.len() >= 2 {
                return Err(ChorusError::Cancelled);
            }
            Ok(())
        });

        let first = chunk_fn(StreamEvent::Stream {
            session_id: SessionId::new(1),
            text: "Hel".into(),
        });
        assert!(first.is_ok());

        let second = chunk_fn(StreamEvent::Stream {
            session_id: SessionId::new(1),
            text: "Hello".into(),
        });
        assert!(second.is_err());
    }
}
