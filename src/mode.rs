//! Conversational modes and their behaviour templates.
//!
//! The mode determines the system prompt sent to the reply endpoint, the
//! status text shown while recording, the capture silence timeout, and what
//! happens after a transcript is captured (chat/care send immediately,
//! listen defers until an explicit send).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::CaptureConfig;

/// The three conversational modes.
///
/// Parsing an unknown mode name yields [`Mode::Chat`] rather than an error,
/// so a stale or garbled mode selection from the UI layer can never wedge
/// the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Casual companion conversation.
    #[default]
    Chat,
    /// Venting mode: transcripts accumulate in a log and are sent only on
    /// explicit confirmation; replies stay minimal.
    Listen,
    /// Extra-supportive conversation.
    Care,
}

impl From<&str> for Mode {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "listen" => Self::Listen,
            "care" => Self::Care,
            // Anything else (including "chat") normalizes to chat.
            _ => Self::Chat,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Listen => write!(f, "listen"),
            Self::Care => write!(f, "care"),
        }
    }
}

impl Mode {
    /// Behaviour template embedded in reply requests for this mode.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Chat => {
                "You are a compassionate friend. Reply briefly, empathically, \
                 and avoid medical advice."
            }
            Self::Listen => {
                "You are now in pure listening mode. Reply only with neutral \
                 acknowledgments like \"I hear you,\" or \"mm-hmm.\" No advice."
            }
            Self::Care => {
                "You are in extra-caring mode. Be warm, validating, and gently \
                 check in."
            }
        }
    }

    /// Status text shown while capture is active in this mode.
    pub fn listening_status(self) -> &'static str {
        match self {
            Self::Listen => "Listening... Share what's on your mind.",
            Self::Chat | Self::Care => "Listening…",
        }
    }

    /// Silence duration after which capture auto-stops in this mode.
    pub fn silence_timeout(self, config: &CaptureConfig) -> Duration {
        let ms = match self {
            Self::Listen => config.listen_silence_timeout_ms,
            Self::Chat | Self::Care => config.silence_timeout_ms,
        };
        Duration::from_millis(ms)
    }
}
