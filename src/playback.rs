//! Speech output boundary and the single-shot playback session.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, SolaceError};

/// Events emitted by a playback implementation.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// Synthesis/playback has started.
    Started,
    /// Playback completed naturally.
    Ended,
    /// Playback failed.
    Error { message: String },
}

/// Live handle to an active playback.
pub struct PlaybackHandle {
    /// Playback lifecycle events.
    pub events: mpsc::Receiver<PlaybackEvent>,
    /// Cancelled to abort playback. An aborted playback is not required to
    /// emit any further event; callers must not wait on one.
    pub cancel: CancellationToken,
}

/// A speech output capability.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Begin speaking `text`. Implementations must cancel any in-flight
    /// utterance first so at most one is active system-wide.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis cannot be started.
    async fn speak(&self, text: &str) -> Result<PlaybackHandle>;
}

/// Wraps a [`PlaybackHandle`] into a single-shot playback await.
pub struct PlaybackSession {
    handle: PlaybackHandle,
}

impl PlaybackSession {
    pub fn new(handle: PlaybackHandle) -> Self {
        Self { handle }
    }

    /// Token that aborts the underlying playback.
    pub fn cancel_token(&self) -> CancellationToken {
        self.handle.cancel.clone()
    }

    /// Resolve when playback completes naturally.
    ///
    /// Cancellation is deliberately not observable here: a cancelled
    /// playback may never settle this future, so the orchestrator races it
    /// against the turn's cancellation token and releases its lock
    /// independently.
    ///
    /// # Errors
    ///
    /// Returns [`SolaceError::Playback`] if the implementation reports a
    /// playback error.
    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.handle.events.recv().await {
            match event {
                PlaybackEvent::Started => debug!("playback started"),
                PlaybackEvent::Ended => return Ok(()),
                PlaybackEvent::Error { message } => {
                    return Err(SolaceError::Playback(message));
                }
            }
        }
        // Event channel closed without a terminal event; treat the utterance
        // as finished rather than wedging the turn.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn handle_pair() -> (mpsc::Sender<PlaybackEvent>, PlaybackHandle) {
        let (tx, rx) = mpsc::channel(8);
        let handle = PlaybackHandle {
            events: rx,
            cancel: CancellationToken::new(),
        };
        (tx, handle)
    }

    #[tokio::test]
    async fn resolves_on_natural_end() {
        let (tx, handle) = handle_pair();
        tx.send(PlaybackEvent::Started).await.unwrap();
        tx.send(PlaybackEvent::Ended).await.unwrap();

        assert!(PlaybackSession::new(handle).run().await.is_ok());
    }

    #[tokio::test]
    async fn rejects_on_playback_error() {
        let (tx, handle) = handle_pair();
        tx.send(PlaybackEvent::Started).await.unwrap();
        tx.send(PlaybackEvent::Error {
            message: "no output device".into(),
        })
        .await
        .unwrap();

        let err = PlaybackSession::new(handle).run().await.unwrap_err();
        assert!(matches!(err, SolaceError::Playback(_)));
    }

    #[tokio::test]
    async fn closed_channel_counts_as_finished() {
        let (tx, handle) = handle_pair();
        drop(tx);

        assert!(PlaybackSession::new(handle).run().await.is_ok());
    }
}
