//! Direct Gemini client for rolling meeting summaries.
//!
//! This module provides a client that connects directly to the Gemini
//! generateContent API. Users provide their own API key.

use crate::error::SummaryError;
use crate::session::ChatMessage;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;
use zeroize::Zeroize;

/// Gemini API base endpoint
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Request timeout; summaries of long meetings can take a while
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for direct Gemini generateContent calls.
pub(crate) struct GeminiClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

/// Request body for the generateContent API.
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

/// Role-tagged content entry in the request.
#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

/// Text part of a content entry.
#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

/// Response from the generateContent API.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

/// Candidate in the response.
#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

/// Candidate content.
#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Option<Vec<ResponsePart>>,
}

/// Text part of the candidate content.
#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Safety feedback on the prompt.
#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub(crate) fn new(api_key: &str, model: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client for GeminiClient")?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }

    /// Send one user message with the given prior history and return the
    /// model's reply.
    ///
    /// A failed call is not retried; the caller decides what a missed
    /// reply means.
    #[instrument(skip(self, history, message), fields(history_len = history.len(), message_len = message.len()))]
    pub(crate) async fn send_message(
        &self,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String, SummaryError> {
        let request_body = GenerateContentRequest {
            contents: build_contents(history, message),
        };

        // The key rides in the query string; never log this URL.
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::ServerError {
                status,
                message: body,
            });
        }

        let reply: GenerateContentResponse = response.json().await.map_err(|e| {
            SummaryError::InvalidResponse(format!("Failed to parse Gemini response: {}", e))
        })?;

        if let Some(reason) = reply
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(SummaryError::Blocked { reason });
        }

        Self::extract_text(&reply)
    }

    /// Extract the first candidate's text from the response structure.
    fn extract_text(response: &GenerateContentResponse) -> Result<String, SummaryError> {
        response
            .candidates
            .as_deref()
            .unwrap_or_default()
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .and_then(|content| content.parts.as_ref())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| SummaryError::InvalidResponse("No text content in Gemini response".into()))
    }
}

/// Convert the history plus the new user message into wire contents
fn build_contents(history: &[ChatMessage], message: &str) -> Vec<Content> {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|entry| Content {
            role: entry.role.as_str().to_string(),
            parts: vec![Part {
                text: entry.text.clone(),
            }],
        })
        .collect();
    contents.push(Content {
        role: "user".to_string(),
        parts: vec![Part {
            text: message.to_string(),
        }],
    });
    contents
}

impl Drop for GeminiClient {
    fn drop(&mut self) {
        // Clear API key from memory
        self.api_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[test]
    fn test_request_serialization_keeps_history_order() {
        let history = vec![
            ChatMessage {
                role: Role::User,
                text: "first".to_string(),
            },
            ChatMessage {
                role: Role::Model,
                text: "second".to_string(),
            },
        ];

        let request = GenerateContentRequest {
            contents: build_contents(&history, "new chunk"),
        };
        let json = serde_json::to_string(&request).expect("Failed to serialize");
        let first = json.find("first").unwrap();
        let second = json.find("second").unwrap();
        let chunk = json.find("new chunk").unwrap();
        assert!(first < second && second < chunk);
        assert!(json.contains(r#""role":"model""#));
    }

    #[test]
    fn test_response_deserialization() {
        let json = r###"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "## Minutes\n- topic one"}],
                    "role": "model"
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 8}
        }"###;

        let response: GenerateContentResponse =
            serde_json::from_str(json).expect("Failed to deserialize");
        let text = GeminiClient::extract_text(&response).expect("Failed to extract text");
        assert_eq!(text, "## Minutes\n- topic one");
    }

    #[test]
    fn test_empty_candidates_is_invalid_response() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            GeminiClient::extract_text(&response),
            Err(SummaryError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_blocked_prompt_is_reported() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let reason = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone());
        assert_eq!(reason.as_deref(), Some("SAFETY"));
    }
}
