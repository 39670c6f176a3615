//! Configuration types for the interaction core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for a conversation session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolaceConfig {
    /// Speech capture settings.
    pub capture: CaptureConfig,
    /// Reply endpoint settings.
    pub reply: ReplyConfig,
    /// Interaction session settings.
    pub session: SessionConfig,
}

/// Speech capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Recognition language/locale tag passed to the capture capability.
    pub language: String,
    /// Silence duration in ms after which capture auto-stops (chat/care).
    pub silence_timeout_ms: u64,
    /// Silence duration in ms for listen mode. Longer so the user can pause
    /// to collect their thoughts without the recording cutting off.
    pub listen_silence_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            silence_timeout_ms: 5_000,
            listen_silence_timeout_ms: 8_000,
        }
    }
}

/// How the request body for the reply endpoint is shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadShape {
    /// Mode prompt, context, and utterance merged into one prompt string
    /// sent as `{"message": ...}`.
    #[default]
    Merged,
    /// Utterance and context as separate fields (`{"message", "context"}`);
    /// the server applies its own behaviour prompt.
    Structured,
}

/// Reply endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    /// POST endpoint returning `{"response": "..."}`.
    pub endpoint: String,
    /// Request body shape.
    pub payload: PayloadShape,
    /// Fixed user-facing text substituted for any reply failure.
    pub fallback_text: String,
    /// Optional bearer token for the endpoint.
    pub api_key: Option<String>,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/ai-therapy/".to_owned(),
            payload: PayloadShape::Merged,
            fallback_text:
                "I'm having trouble connecting to the server. Please try again later.".to_owned(),
            api_key: None,
        }
    }
}

/// Interaction session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay in ms between cancelling playback on a re-tap and starting the
    /// next turn, so the cancellation can settle first.
    pub restart_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: 50,
        }
    }
}

impl SolaceConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::SolaceError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SolaceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/solace/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("solace").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("solace")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/solace-config/config.toml")
        }
    }
}
