//! Solace: a tap-to-talk voice conversation core.
//!
//! One tap starts a turn: speech is captured until a silence timeout, the
//! transcript is posted to a remote reply endpoint together with a rolling
//! one-exchange context, and the generated reply is spoken aloud. A tap
//! during playback interrupts it and starts a fresh turn.
//!
//! # Architecture
//!
//! A single orchestrator task owns all session state and serializes every
//! transition through its event loop:
//! - **Capture**: pluggable speech recognition behind [`SpeechCapture`],
//!   wrapped by [`TranscriptionSession`] which enforces the silence auto-stop
//! - **Reply**: [`ReplyClient`] posts to the configured endpoint and absorbs
//!   every failure into a fixed fallback apology
//! - **Playback**: pluggable speech synthesis behind [`SpeechOutput`]
//! - **Session**: [`session::Orchestrator`] ties the three together per
//!   conversational [`Mode`], including the listen mode that accumulates
//!   transcripts until an explicit send

pub mod capture;
pub mod config;
pub mod error;
pub mod mode;
pub mod playback;
pub mod reply;
pub mod session;
pub mod test_utils;

pub use capture::{CaptureEvent, CaptureHandle, SpeechCapture, TranscriptionSession};
pub use config::SolaceConfig;
pub use error::{Result, SolaceError};
pub use mode::Mode;
pub use playback::{PlaybackEvent, PlaybackHandle, SpeechOutput};
pub use reply::ReplyClient;
pub use session::{
    Command, Orchestrator, SessionEvent, SessionHandle, SessionPhase, SessionSnapshot,
};
