//! The tap-to-talk interaction state machine.
//!
//! A single orchestrator task owns all session state (mode, lock, context,
//! transcript log) and mutates it only from its event loop, so the busy-lock
//! check-and-set is atomic by construction. Turn pipelines (capture → reply
//! → playback) run as spawned tasks and report back over a channel; every
//! report carries its turn id, and reports from a turn that was cancelled by
//! an interruption are dropped so they can never re-acquire or corrupt the
//! lock of a newer turn.
//!
//! Listen mode splits one logical turn into two lock-protected sub-phases:
//! the lock is released as soon as a transcript is captured (`AwaitingSend`)
//! so the user can tap again and extend the log before committing with an
//! explicit send. That mid-turn release matters: holding the lock through
//! `AwaitingSend` would deadlock all further capture.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::{SpeechCapture, TranscriptionSession};
use crate::config::SolaceConfig;
use crate::error::{Result, SolaceError};
use crate::mode::Mode;
use crate::playback::{PlaybackSession, SpeechOutput};
use crate::reply::ReplyClient;
use crate::session::messages::{
    Command, SessionEvent, SessionPhase, SessionSnapshot, TranscriptEntry, TurnEvent, TurnOutcome,
};

const IDLE_STATUS: &str = "Tap the circle to begin.";
const SPEAKING_STATUS: &str = "Speaking…";
const SENDING_STATUS: &str = "Sending…";
const NO_SPEECH_STATUS: &str = "(No speech detected)";
const AWAITING_SEND_STATUS: &str = "Tap to continue, or send to AI.";
const ERROR_STATUS: &str = "An error occurred.";
const NOTHING_TO_SEND_STATUS: &str = "No message to send.";

const COMMAND_CHANNEL_SIZE: usize = 16;
const TURN_CHANNEL_SIZE: usize = 16;
const PARTIAL_CHANNEL_SIZE: usize = 16;
const EVENT_CHANNEL_SIZE: usize = 64;

/// The turn pipeline currently holding the lock.
struct ActiveTurn {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Handle used by the UI layer to drive and observe a session.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<SessionEvent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Tap the primary control.
    pub async fn tap(&self) -> Result<()> {
        self.command(Command::Tap).await
    }

    /// Send the accumulated listen-mode transcripts.
    pub async fn send(&self) -> Result<()> {
        self.command(Command::Send).await
    }

    /// Select a conversational mode.
    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        self.command(Command::SetMode(mode)).await
    }

    /// Stop the session task.
    pub async fn shutdown(&self) -> Result<()> {
        self.command(Command::Shutdown).await
    }

    async fn command(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| SolaceError::Channel("session task is gone".to_owned()))
    }

    /// Subscribe to session events.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Watch the session snapshot for changes.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Current session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }
}

/// Orchestrates capture, reply generation, and playback per conversational
/// mode, enforcing the single interaction lock.
pub struct Orchestrator<C, P> {
    config: SolaceConfig,
    capture: Arc<C>,
    output: Arc<P>,
    reply: Arc<ReplyClient>,

    mode: Mode,
    phase: SessionPhase,
    status: String,
    /// The interaction lock: at most one capture or reply exchange in flight.
    busy: bool,
    /// True while reply playback is active (the interruption window).
    speaking: bool,
    /// Rolling context: the most recent completed exchange, overwritten (not
    /// appended) after each exchange. Survives mode switches.
    context: String,
    /// Listen-mode transcript log. The trailing entry is live while capture
    /// is active and is finalized when the capture resolves.
    log: Vec<TranscriptEntry>,
    /// Most recent finalized transcript awaiting an explicit send.
    pending_utterance: String,
    send_visible: bool,

    active_turn: Option<ActiveTurn>,

    cmd_tx: mpsc::Sender<Command>,
    cmd_rx: mpsc::Receiver<Command>,
    turn_tx: mpsc::Sender<TurnEvent>,
    turn_rx: mpsc::Receiver<TurnEvent>,
    event_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<C, P> Orchestrator<C, P>
where
    C: SpeechCapture + 'static,
    P: SpeechOutput + 'static,
{
    /// Build an orchestrator and the handle used to drive it.
    pub fn new(config: SolaceConfig, capture: C, output: P) -> (Self, SessionHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (turn_tx, turn_rx) = mpsc::channel(TURN_CHANNEL_SIZE);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot {
            status_text: IDLE_STATUS.to_owned(),
            ..SessionSnapshot::default()
        });

        let reply = Arc::new(ReplyClient::new(config.reply.clone()));
        let handle = SessionHandle {
            cmd_tx: cmd_tx.clone(),
            event_tx: event_tx.clone(),
            snapshot_rx,
        };

        let orchestrator = Self {
            config,
            capture: Arc::new(capture),
            output: Arc::new(output),
            reply,
            mode: Mode::default(),
            phase: SessionPhase::Idle,
            status: IDLE_STATUS.to_owned(),
            busy: false,
            speaking: false,
            context: String::new(),
            log: Vec::new(),
            pending_utterance: String::new(),
            send_visible: false,
            active_turn: None,
            cmd_tx,
            cmd_rx,
            turn_tx,
            turn_rx,
            event_tx,
            snapshot_tx,
        };

        (orchestrator, handle)
    }

    /// Spawn the session task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the session event loop until shutdown.
    pub async fn run(mut self) {
        info!(mode = %self.mode, "interaction session started");
        self.sync_snapshot();

        loop {
            tokio::select! {
                command = self.cmd_rx.recv() => match command {
                    Some(Command::Tap) => self.on_tap(),
                    Some(Command::Send) => self.on_send(),
                    Some(Command::SetMode(mode)) => self.on_set_mode(mode),
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = self.turn_rx.recv() => self.on_turn_event(event),
            }
        }

        if let Some(turn) = self.active_turn.take() {
            turn.cancel.cancel();
            turn.task.abort();
        }
        info!("interaction session stopped");
    }

    // ── command handlers ──────────────────────────────────────────

    fn on_tap(&mut self) {
        if self.speaking {
            self.interrupt_and_restart();
            return;
        }
        if self.busy {
            debug!("tap ignored, session busy");
            return;
        }
        self.start_capture_turn();
    }

    fn on_send(&mut self) {
        if self.phase != SessionPhase::AwaitingSend {
            debug!(phase = ?self.phase, "send ignored outside AwaitingSend");
            return;
        }
        if self.busy {
            debug!("send ignored, session busy");
            return;
        }

        // All finalized log entries joined, falling back to the single
        // pending utterance when the log is empty.
        let entries: Vec<&str> = self
            .log
            .iter()
            .filter(|e| e.finalized && !e.text.is_empty())
            .map(|e| e.text.as_str())
            .collect();
        let content = if entries.is_empty() {
            self.pending_utterance.clone()
        } else {
            entries.join("\n")
        };

        if content.is_empty() {
            self.publish_status(NOTHING_TO_SEND_STATUS);
            return;
        }

        self.busy = true;
        self.phase = SessionPhase::Responding;
        self.send_visible = false;
        self.emit(SessionEvent::SendAffordance { visible: false });
        self.publish_status(SENDING_STATUS);

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let reply = Arc::clone(&self.reply);
        let output = Arc::clone(&self.output);
        let turn_tx = self.turn_tx.clone();
        let context = self.context.clone();
        let prompt = self.mode.prompt();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            run_send_turn(id, content, context, prompt, reply, output, turn_tx, token).await;
        });
        self.active_turn = Some(ActiveTurn { id, cancel, task });
    }

    fn on_set_mode(&mut self, mode: Mode) {
        info!(%mode, "mode selected");
        self.mode = mode;
        self.pending_utterance.clear();
        if !self.log.is_empty() {
            self.log.clear();
            self.emit(SessionEvent::TranscriptCleared);
        }
        if self.send_visible {
            self.send_visible = false;
            self.emit(SessionEvent::SendAffordance { visible: false });
        }
        if !self.busy {
            self.phase = SessionPhase::Idle;
        }
        self.emit(SessionEvent::ModeChanged { mode });
        self.publish_status(IDLE_STATUS);
    }

    // ── turn lifecycle ────────────────────────────────────────────

    fn start_capture_turn(&mut self) {
        self.busy = true;
        self.phase = SessionPhase::Listening;
        self.publish_status(self.mode.listening_status());

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let capture = Arc::clone(&self.capture);
        let output = Arc::clone(&self.output);
        let reply = Arc::clone(&self.reply);
        let turn_tx = self.turn_tx.clone();
        let mode = self.mode;
        let context = self.context.clone();
        let language = self.config.capture.language.clone();
        let timeout = mode.silence_timeout(&self.config.capture);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            run_capture_turn(
                id, mode, language, timeout, context, capture, output, reply, turn_tx, token,
            )
            .await;
        });
        self.active_turn = Some(ActiveTurn { id, cancel, task });
    }

    /// Tap during playback: cancel the turn, force-release the lock, and
    /// re-enter the mode-appropriate start after a short delay. The delay is
    /// a yield so the cancellation can settle before a new cycle begins; the
    /// cancelled turn's late reports are rejected by turn id.
    fn interrupt_and_restart(&mut self) {
        info!("tap during playback, interrupting");
        if let Some(turn) = self.active_turn.take() {
            turn.cancel.cancel();
        }
        self.busy = false;
        self.speaking = false;
        self.phase = SessionPhase::Idle;
        self.publish_status("");

        let delay = Duration::from_millis(self.config.session.restart_delay_ms);
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = cmd_tx.send(Command::Tap).await;
        });
    }

    fn on_turn_event(&mut self, event: TurnEvent) {
        let Some(turn) = &self.active_turn else {
            debug!("dropping report from a finished turn");
            return;
        };
        if event.turn() != turn.id {
            debug!(stale = %event.turn(), current = %turn.id, "dropping stale turn report");
            return;
        }

        match event {
            TurnEvent::Partial { text, .. } => self.on_partial(text),
            TurnEvent::SpeakingStarted { .. } => {
                self.speaking = true;
                self.phase = SessionPhase::Responding;
                self.publish_status(SPEAKING_STATUS);
            }
            TurnEvent::Finished { outcome, .. } => {
                self.active_turn = None;
                self.on_turn_finished(outcome);
            }
        }
    }

    fn on_partial(&mut self, text: String) {
        if self.mode != Mode::Listen {
            return;
        }
        // The live entry is created on the first partial and updated in
        // place afterwards, so an utterance occupies a single log slot.
        match self.log.last_mut() {
            Some(entry) if !entry.finalized => entry.text = text.clone(),
            _ => self.log.push(TranscriptEntry {
                text: text.clone(),
                finalized: false,
            }),
        }
        let index = self.log.len() - 1;
        self.emit(SessionEvent::TranscriptEntry {
            index,
            text,
            finalized: false,
        });
        self.sync_snapshot();
    }

    fn on_turn_finished(&mut self, outcome: TurnOutcome) {
        match outcome {
            TurnOutcome::Captured { transcript } => self.on_captured(transcript),
            TurnOutcome::Exchange { utterance, reply } => {
                self.complete_exchange(&utterance, &reply);
                self.finish_turn_idle();
            }
            TurnOutcome::Sent { utterance, reply } => {
                if !reply.is_empty() {
                    self.log.clear();
                    self.emit(SessionEvent::TranscriptCleared);
                }
                self.complete_exchange(&utterance, &reply);
                self.pending_utterance.clear();
                self.finish_turn_idle();
            }
            TurnOutcome::Failed { error, deferred } => {
                warn!(error = %error, "turn failed");
                self.busy = false;
                self.speaking = false;
                self.phase = SessionPhase::Idle;
                if deferred {
                    // A failed send keeps the log so the recording can be
                    // retried, but the single pending utterance is spent.
                    self.pending_utterance.clear();
                }
                self.publish_status(ERROR_STATUS);
                if deferred || self.mode != Mode::Listen {
                    // Chat/care and the send phase restore the idle prompt;
                    // a listen capture failure keeps the error visible next
                    // to the log.
                    self.publish_status(IDLE_STATUS);
                }
            }
        }
    }

    /// Listen-mode capture resolved: enter `AwaitingSend` and release the
    /// lock so another tap can extend the recording without sending.
    fn on_captured(&mut self, transcript: String) {
        match self.log.last_mut() {
            Some(entry) if !entry.finalized => {
                if transcript.is_empty() {
                    // Stray live entry from partials that trimmed to nothing.
                    self.log.pop();
                    self.emit(SessionEvent::TranscriptEntryRemoved {
                        index: self.log.len(),
                    });
                } else {
                    entry.text = transcript.clone();
                    entry.finalized = true;
                    let index = self.log.len() - 1;
                    self.emit(SessionEvent::TranscriptEntry {
                        index,
                        text: transcript.clone(),
                        finalized: true,
                    });
                }
            }
            _ if !transcript.is_empty() => {
                // Capture produced a final transcript without any partials.
                self.log.push(TranscriptEntry {
                    text: transcript.clone(),
                    finalized: true,
                });
                let index = self.log.len() - 1;
                self.emit(SessionEvent::TranscriptEntry {
                    index,
                    text: transcript.clone(),
                    finalized: true,
                });
            }
            _ => {}
        }

        self.pending_utterance = transcript.clone();
        if !self.send_visible {
            self.send_visible = true;
            self.emit(SessionEvent::SendAffordance { visible: true });
        }
        self.busy = false;
        self.phase = SessionPhase::AwaitingSend;
        if transcript.is_empty() {
            self.publish_status(NO_SPEECH_STATUS);
        } else {
            self.publish_status(AWAITING_SEND_STATUS);
        }
    }

    /// Overwrite the rolling context with the completed exchange. An empty
    /// reply means nothing was spoken and the previous context survives.
    fn complete_exchange(&mut self, utterance: &str, reply: &str) {
        if reply.is_empty() {
            return;
        }
        self.context = format!("User: {utterance}\nAI: {reply}");
        self.emit(SessionEvent::ExchangeComplete {
            utterance: utterance.to_owned(),
            reply: reply.to_owned(),
        });
    }

    fn finish_turn_idle(&mut self) {
        self.busy = false;
        self.speaking = false;
        self.phase = SessionPhase::Idle;
        self.publish_status(IDLE_STATUS);
    }

    // ── state publication ─────────────────────────────────────────

    fn publish_status(&mut self, text: &str) {
        self.status = text.to_owned();
        self.emit(SessionEvent::Status {
            text: text.to_owned(),
        });
        self.sync_snapshot();
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; the snapshot still reflects the state.
        let _ = self.event_tx.send(event);
    }

    fn sync_snapshot(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            mode: self.mode,
            phase: self.phase,
            status_text: self.status.clone(),
            busy: self.busy,
            speaking: self.speaking,
            has_pending_utterance: !self.pending_utterance.is_empty(),
            send_visible: self.send_visible,
            context: self.context.clone(),
        });
    }
}

// ── turn pipelines ────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
async fn run_capture_turn<C, P>(
    id: Uuid,
    mode: Mode,
    language: String,
    timeout: Duration,
    context: String,
    capture: Arc<C>,
    output: Arc<P>,
    reply: Arc<ReplyClient>,
    turn_tx: mpsc::Sender<TurnEvent>,
    cancel: CancellationToken,
) where
    C: SpeechCapture,
    P: SpeechOutput,
{
    // Forward live partials for the listen-mode display.
    let (partial_tx, mut partial_rx) = mpsc::channel::<String>(PARTIAL_CHANNEL_SIZE);
    let forwarder = {
        let turn_tx = turn_tx.clone();
        tokio::spawn(async move {
            while let Some(text) = partial_rx.recv().await {
                let _ = turn_tx.send(TurnEvent::Partial { turn: id, text }).await;
            }
        })
    };

    let captured = capture_phase(
        capture.as_ref(),
        &language,
        timeout,
        Some(partial_tx),
        &cancel,
    )
    .await;
    // The partial sender is gone, so the forwarder drains and exits.
    let _ = forwarder.await;

    let transcript = match captured {
        Ok(text) => text,
        Err(error) => {
            let _ = turn_tx
                .send(TurnEvent::Finished {
                    turn: id,
                    outcome: TurnOutcome::Failed {
                        error,
                        deferred: false,
                    },
                })
                .await;
            return;
        }
    };

    if cancel.is_cancelled() {
        // Interrupted; the orchestrator has already released the lock.
        return;
    }

    if mode == Mode::Listen {
        let _ = turn_tx
            .send(TurnEvent::Finished {
                turn: id,
                outcome: TurnOutcome::Captured { transcript },
            })
            .await;
        return;
    }

    let reply_text = reply
        .get_reply(&transcript, &context, mode.prompt())
        .await;
    respond_and_speak(id, transcript, reply_text, output, turn_tx, cancel, false).await;
}

#[allow(clippy::too_many_arguments)]
async fn run_send_turn<P>(
    id: Uuid,
    content: String,
    context: String,
    prompt: &'static str,
    reply: Arc<ReplyClient>,
    output: Arc<P>,
    turn_tx: mpsc::Sender<TurnEvent>,
    cancel: CancellationToken,
) where
    P: SpeechOutput,
{
    let reply_text = reply.get_reply(&content, &context, prompt).await;
    if cancel.is_cancelled() {
        return;
    }
    respond_and_speak(id, content, reply_text, output, turn_tx, cancel, true).await;
}

async fn capture_phase<C>(
    capture: &C,
    language: &str,
    timeout: Duration,
    partials: Option<mpsc::Sender<String>>,
    cancel: &CancellationToken,
) -> Result<String>
where
    C: SpeechCapture + ?Sized,
{
    let handle = capture.start(language).await?;
    TranscriptionSession::new(handle, timeout)
        .run(partials, cancel.clone())
        .await
}

enum SpeakResult {
    Completed,
    Cancelled,
    Failed(SolaceError),
}

/// Speak the reply (if any) and report the final outcome. A cancelled
/// playback reports nothing: the orchestrator has moved on and would drop
/// the stale event anyway.
async fn respond_and_speak<P>(
    id: Uuid,
    utterance: String,
    reply_text: String,
    output: Arc<P>,
    turn_tx: mpsc::Sender<TurnEvent>,
    cancel: CancellationToken,
    deferred_send: bool,
) where
    P: SpeechOutput,
{
    if !reply_text.is_empty() {
        let _ = turn_tx.send(TurnEvent::SpeakingStarted { turn: id }).await;
        match speak_phase(output.as_ref(), &reply_text, &cancel).await {
            SpeakResult::Completed => {}
            SpeakResult::Cancelled => return,
            SpeakResult::Failed(error) => {
                let _ = turn_tx
                    .send(TurnEvent::Finished {
                        turn: id,
                        outcome: TurnOutcome::Failed {
                            error,
                            deferred: deferred_send,
                        },
                    })
                    .await;
                return;
            }
        }
    }

    let outcome = if deferred_send {
        TurnOutcome::Sent {
            utterance,
            reply: reply_text,
        }
    } else {
        TurnOutcome::Exchange {
            utterance,
            reply: reply_text,
        }
    };
    let _ = turn_tx
        .send(TurnEvent::Finished { turn: id, outcome })
        .await;
}

async fn speak_phase<P>(output: &P, text: &str, cancel: &CancellationToken) -> SpeakResult
where
    P: SpeechOutput + ?Sized,
{
    let handle = match output.speak(text).await {
        Ok(handle) => handle,
        Err(e) => return SpeakResult::Failed(e),
    };
    let session = PlaybackSession::new(handle);
    let device_cancel = session.cancel_token();

    tokio::select! {
        () = cancel.cancelled() => {
            // Fire-and-forget: a cancelled playback is not guaranteed to
            // settle, so do not wait for confirmation.
            device_cancel.cancel();
            SpeakResult::Cancelled
        }
        result = session.run() => match result {
            Ok(()) => SpeakResult::Completed,
            Err(e) => SpeakResult::Failed(e),
        },
    }
}
