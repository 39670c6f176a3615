//! Commands, events, and snapshot types for the interaction session.

use uuid::Uuid;

use crate::error::SolaceError;
use crate::mode::Mode;

/// External commands driving the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Tap on the primary control (start a turn, or interrupt playback).
    Tap,
    /// Explicit send of accumulated listen-mode transcripts.
    Send,
    /// Select a conversational mode.
    SetMode(Mode),
    /// Stop the session task.
    Shutdown,
}

/// Coarse phase of the interaction state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for a tap.
    #[default]
    Idle,
    /// Capture in flight.
    Listening,
    /// Listen mode only: transcript captured, waiting for an explicit send.
    /// The lock is free so another tap can extend the recording.
    AwaitingSend,
    /// Reply generation and/or playback in flight.
    Responding,
}

/// Snapshot of everything a UI layer needs to render the session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub phase: SessionPhase,
    /// Current status line text.
    pub status_text: String,
    /// The interaction lock: true while a capture or reply exchange is in
    /// flight.
    pub busy: bool,
    /// True while the reply is being spoken (the interruption window).
    pub speaking: bool,
    /// Whether a captured utterance is waiting for an explicit send.
    pub has_pending_utterance: bool,
    /// Whether the send affordance should be shown.
    pub send_visible: bool,
    /// Rolling conversation context: the most recent completed exchange.
    pub context: String,
}

/// Events describing what the session is doing "right now".
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Status line changed.
    Status { text: String },
    /// Mode selection applied.
    ModeChanged { mode: Mode },
    /// Send affordance shown or hidden.
    SendAffordance { visible: bool },
    /// Transcript-log entry created or updated (listen mode). The
    /// in-progress entry is updated in place at a stable `index`.
    TranscriptEntry {
        index: usize,
        text: String,
        finalized: bool,
    },
    /// A live transcript-log entry was dropped because the capture trimmed
    /// to nothing; any rendered row at `index` must be removed.
    TranscriptEntryRemoved { index: usize },
    /// Transcript log cleared (mode switch or completed send).
    TranscriptCleared,
    /// A completed exchange: the reply was spoken and the conversation
    /// context overwritten.
    ExchangeComplete { utterance: String, reply: String },
}

/// A single listen-mode transcript log entry.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub text: String,
    /// False while recognition is still updating this entry in place.
    pub finalized: bool,
}

/// Internal events from turn tasks back to the orchestrator. Tagged with the
/// turn id so events from a cancelled turn can be dropped instead of
/// corrupting the lock of a newer turn.
#[derive(Debug)]
pub(crate) enum TurnEvent {
    /// Live partial transcript (listen-mode display).
    Partial { turn: Uuid, text: String },
    /// Playback started; the reply text is being spoken.
    SpeakingStarted { turn: Uuid },
    /// The turn pipeline finished.
    Finished { turn: Uuid, outcome: TurnOutcome },
}

impl TurnEvent {
    pub(crate) fn turn(&self) -> Uuid {
        match self {
            Self::Partial { turn, .. }
            | Self::SpeakingStarted { turn }
            | Self::Finished { turn, .. } => *turn,
        }
    }
}

/// How a turn pipeline ended.
#[derive(Debug)]
pub(crate) enum TurnOutcome {
    /// Chat/care: capture → reply → playback completed. An empty reply means
    /// nothing was spoken and the context must not be overwritten.
    Exchange { utterance: String, reply: String },
    /// Listen: capture finished; the transcript awaits an explicit send.
    Captured { transcript: String },
    /// Listen send phase completed.
    Sent { utterance: String, reply: String },
    /// Capture or playback failure. `deferred` marks a failure inside the
    /// listen-mode send phase, which cleans up differently from a capture
    /// failure.
    Failed { error: SolaceError, deferred: bool },
}
