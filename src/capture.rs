//! Speech capture boundary and the single-shot transcription session.
//!
//! The capture capability (platform speech recognition, a cloud STT stream,
//! or a test double) implements [`SpeechCapture`] and emits incremental
//! [`CaptureEvent`]s. [`TranscriptionSession`] wraps one active capture into
//! a single async operation that resolves with the final transcript string,
//! enforcing the silence auto-stop on this side of the boundary so capture
//! implementations stay dumb.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, SolaceError};

/// Events emitted by a capture implementation while recognition is active.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Updated snapshot of the full running transcript so far.
    Partial { text: String },
    /// Recognition ended (natural end of input or a honoured stop request).
    Ended,
    /// Device or permission failure.
    Error { message: String },
}

/// Live handle to an active capture.
pub struct CaptureHandle {
    /// Incremental recognition results.
    pub events: mpsc::Receiver<CaptureEvent>,
    /// Cancelled to ask the device to stop capturing. Implementations should
    /// emit [`CaptureEvent::Ended`] (or close the event channel) once
    /// stopped; a stop request is a normal completion, not an error.
    pub stop: CancellationToken,
}

/// A speech capture capability.
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Begin capturing with the given recognition language tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture device cannot be started.
    async fn start(&self, language: &str) -> Result<CaptureHandle>;
}

/// Wraps a [`CaptureHandle`] into a single-shot transcription.
pub struct TranscriptionSession {
    handle: CaptureHandle,
    silence_timeout: Duration,
}

impl TranscriptionSession {
    pub fn new(handle: CaptureHandle, silence_timeout: Duration) -> Self {
        Self {
            handle,
            silence_timeout,
        }
    }

    /// Run until capture ends, resolving with the trimmed final transcript.
    ///
    /// Each partial result replaces the running transcript, resets the
    /// silence deadline, and is forwarded on `partials` (used for the
    /// listen-mode live display). When the deadline expires without a new
    /// result, the device is asked to stop and the session keeps draining
    /// events until it confirms. An empty transcript is a valid outcome
    /// meaning no speech was detected.
    ///
    /// Cancelling `cancel` stops the device and resolves immediately with
    /// whatever has accumulated.
    ///
    /// # Errors
    ///
    /// Returns [`SolaceError::Capture`] only on a genuine device error.
    pub async fn run(
        mut self,
        partials: Option<mpsc::Sender<String>>,
        cancel: CancellationToken,
    ) -> Result<String> {
        let mut transcript = String::new();
        let mut stop_requested = false;

        loop {
            // Recreated each iteration so any event resets the deadline.
            let deadline = tokio::time::sleep(self.silence_timeout);
            tokio::pin!(deadline);

            tokio::select! {
                () = cancel.cancelled() => {
                    self.handle.stop.cancel();
                    debug!("transcription cancelled, resolving with accumulated text");
                    return Ok(transcript.trim().to_owned());
                }
                () = &mut deadline, if !stop_requested => {
                    debug!(
                        timeout_ms = self.silence_timeout.as_millis() as u64,
                        "silence timeout reached, stopping capture"
                    );
                    self.handle.stop.cancel();
                    stop_requested = true;
                }
                event = self.handle.events.recv() => {
                    match event {
                        Some(CaptureEvent::Partial { text }) => {
                            transcript = text;
                            if let Some(tx) = &partials {
                                let _ = tx.send(transcript.clone()).await;
                            }
                        }
                        Some(CaptureEvent::Ended) | None => {
                            return Ok(transcript.trim().to_owned());
                        }
                        Some(CaptureEvent::Error { message }) => {
                            return Err(SolaceError::Capture(message));
                        }
                    }
                }
            }
        }
    }
}
