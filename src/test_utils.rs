//! Shared test doubles for the capture and playback boundaries.
//!
//! Used by the unit tests here and by the integration tests in `tests/`,
//! which is why this module is compiled into the crate rather than gated
//! behind `cfg(test)`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureEvent, CaptureHandle, SpeechCapture};
use crate::error::{Result, SolaceError};
use crate::playback::{PlaybackEvent, PlaybackHandle, SpeechOutput};

/// One scripted capture run.
#[derive(Debug, Clone)]
pub enum CaptureScript {
    /// Emit each partial in order, then the final text, then end.
    Speech {
        partials: Vec<String>,
        final_text: String,
    },
    /// Emit nothing and wait for the stop request, exercising the silence
    /// timeout path.
    Silence,
    /// Fail with a device error.
    Fail { message: String },
}

/// Capture double that plays back a queue of [`CaptureScript`]s, one per
/// `start` call. An exhausted queue behaves like [`CaptureScript::Silence`].
#[derive(Clone, Default)]
pub struct ScriptedCapture {
    scripts: Arc<Mutex<VecDeque<CaptureScript>>>,
    starts: Arc<AtomicUsize>,
}

impl ScriptedCapture {
    pub fn new(scripts: Vec<CaptureScript>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            starts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue another script for a later `start` call.
    pub fn push(&self, script: CaptureScript) {
        self.scripts.lock().expect("scripts lock").push_back(script);
    }

    /// Number of times capture was started.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechCapture for ScriptedCapture {
    async fn start(&self, _language: &str) -> Result<CaptureHandle> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .pop_front()
            .unwrap_or(CaptureScript::Silence);

        let (tx, rx) = mpsc::channel(16);
        let stop = CancellationToken::new();
        let device_stop = stop.clone();
        tokio::spawn(async move {
            match script {
                CaptureScript::Speech {
                    partials,
                    final_text,
                } => {
                    for text in partials {
                        if tx.send(CaptureEvent::Partial { text }).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(CaptureEvent::Partial { text: final_text }).await;
                    let _ = tx.send(CaptureEvent::Ended).await;
                }
                CaptureScript::Silence => {
                    device_stop.cancelled().await;
                    let _ = tx.send(CaptureEvent::Ended).await;
                }
                CaptureScript::Fail { message } => {
                    let _ = tx.send(CaptureEvent::Error { message }).await;
                }
            }
        });

        Ok(CaptureHandle { events: rx, stop })
    }
}

/// Playback double recording everything it is asked to speak.
///
/// By default an utterance completes immediately. With [`hold`] enabled it
/// stays active until cancelled and never emits a terminal event, modelling
/// an interrupted playback that does not settle.
///
/// [`hold`]: ScriptedPlayback::hold
#[derive(Clone, Default)]
pub struct ScriptedPlayback {
    spoken: Arc<Mutex<Vec<String>>>,
    hold: Arc<AtomicBool>,
    fail_next: Arc<AtomicBool>,
    cancelled: Arc<AtomicUsize>,
}

impl ScriptedPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything spoken so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().expect("spoken lock").clone()
    }

    /// While enabled, utterances stay active until cancelled.
    pub fn hold(&self, on: bool) {
        self.hold.store(on, Ordering::SeqCst);
    }

    /// Make the next `speak` call fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of utterances that were cancelled mid-playback.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechOutput for ScriptedPlayback {
    async fn speak(&self, text: &str) -> Result<PlaybackHandle> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SolaceError::Playback("synthesis unavailable".to_owned()));
        }
        self.spoken
            .lock()
            .expect("spoken lock")
            .push(text.to_owned());

        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let device_cancel = cancel.clone();
        let hold = self.hold.load(Ordering::SeqCst);
        let cancelled = Arc::clone(&self.cancelled);
        tokio::spawn(async move {
            let _ = tx.send(PlaybackEvent::Started).await;
            if hold {
                device_cancel.cancelled().await;
                cancelled.fetch_add(1, Ordering::SeqCst);
                return;
            }
            let _ = tx.send(PlaybackEvent::Ended).await;
        });

        Ok(PlaybackHandle { events: rx, cancel })
    }
}
