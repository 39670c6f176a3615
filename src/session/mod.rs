//! Interaction session: the orchestrator task and its message types.

pub mod messages;
pub mod orchestrator;

pub use messages::{Command, SessionEvent, SessionPhase, SessionSnapshot, TranscriptEntry};
pub use orchestrator::{Orchestrator, SessionHandle};
