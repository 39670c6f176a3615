//! Remote reply generation client.
//!
//! Absorbs every failure at its boundary: the caller always receives a
//! string, either generated content or the configured fallback apology.
//! This keeps the orchestrator free of any network-specific failure branch.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{PayloadShape, ReplyConfig};
use crate::error::{Result, SolaceError};

/// Request body for the reply endpoint.
#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

/// Response body from the reply endpoint.
#[derive(Debug, Deserialize)]
struct ReplyResponse {
    response: String,
}

/// Client for the remote text-generation endpoint.
pub struct ReplyClient {
    http: reqwest::Client,
    config: ReplyConfig,
}

impl ReplyClient {
    pub fn new(config: ReplyConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// The fixed apology text substituted for any failure.
    pub fn fallback_text(&self) -> &str {
        &self.config.fallback_text
    }

    /// Generate a reply for `utterance` given the rolling conversation
    /// context and the active mode's behaviour `prompt`.
    ///
    /// Never fails past this boundary: any transport failure, non-success
    /// status, or malformed body is logged and replaced by the fallback
    /// text. No timeout and no retries; only the capture phase of a turn
    /// has a deadline.
    pub async fn get_reply(&self, utterance: &str, context: &str, prompt: &str) -> String {
        match self.request(utterance, context, prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "reply request failed, substituting fallback text");
                self.config.fallback_text.clone()
            }
        }
    }

    async fn request(&self, utterance: &str, context: &str, prompt: &str) -> Result<String> {
        let merged;
        let body = match self.config.payload {
            PayloadShape::Merged => {
                merged = build_merged_prompt(prompt, context, utterance);
                ReplyRequest {
                    message: &merged,
                    context: None,
                }
            }
            PayloadShape::Structured => ReplyRequest {
                message: utterance,
                context: Some(context),
            },
        };

        let mut request = self.http.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SolaceError::Reply(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SolaceError::Reply(format!("HTTP {status}")));
        }

        let parsed: ReplyResponse = response
            .json()
            .await
            .map_err(|e| SolaceError::Reply(format!("malformed response body: {e}")))?;

        debug!(chars = parsed.response.len(), "reply received");
        Ok(parsed.response)
    }
}

/// Merge the mode prompt, conversation context, and user utterance into the
/// single prompt string used by [`PayloadShape::Merged`].
pub(crate) fn build_merged_prompt(prompt: &str, context: &str, utterance: &str) -> String {
    format!("{prompt}\n\nContext:\n{context}\nUser: {utterance}\nAI:")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn merged_prompt_embeds_all_three_parts() {
        let merged = build_merged_prompt("Be kind.", "User: hi\nAI: hello", "how are you");
        assert_eq!(
            merged,
            "Be kind.\n\nContext:\nUser: hi\nAI: hello\nUser: how are you\nAI:"
        );
    }

    #[test]
    fn merged_prompt_with_empty_context() {
        let merged = build_merged_prompt("Be kind.", "", "hello");
        assert_eq!(merged, "Be kind.\n\nContext:\n\nUser: hello\nAI:");
    }

    #[test]
    fn structured_request_skips_absent_context() {
        let with = ReplyRequest {
            message: "hi",
            context: Some("ctx"),
        };
        let without = ReplyRequest {
            message: "hi",
            context: None,
        };
        assert_eq!(
            serde_json::to_string(&with).unwrap(),
            r#"{"message":"hi","context":"ctx"}"#
        );
        assert_eq!(
            serde_json::to_string(&without).unwrap(),
            r#"{"message":"hi"}"#
        );
    }
}
