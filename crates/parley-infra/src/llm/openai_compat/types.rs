//! Chat Completions API wire types.
//!
//! Only the fields Parley sends or reads. Apart from `choices`, response
//! fields are optional; the client decides what a usable reply is.

use serde::{Deserialize, Serialize};

use parley_types::chat::MessageRole;

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<RequestMessage<'a>>,
    pub temperature: f64,
    pub max_tokens: u32,
    /// End-user identifier, forwarded for abuse monitoring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestMessage<'a> {
    pub role: MessageRole,
    pub content: &'a str,
}

/// Successful response body.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<ResponseMessage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

/// Error response body: `{"error": {"message": "..."}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

impl ErrorEnvelope {
    /// Extract `error.message` from a raw error body, if it has that shape.
    pub fn message_from(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error)
            .and_then(|error| error.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_omits_missing_user() {
        let request = ChatCompletionRequest {
            model: "gpt-4o",
            messages: vec![RequestMessage {
                role: MessageRole::System,
                content: "be brief",
            }],
            temperature: 0.7,
            max_tokens: 2000,
            user: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["max_tokens"], 2000);
        assert!(json.get("user").is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        assert_eq!(ErrorEnvelope::message_from(body).as_deref(), Some("Invalid API key"));
        assert!(ErrorEnvelope::message_from("<html>bad gateway</html>").is_none());
        assert!(ErrorEnvelope::message_from(r#"{"detail":"nope"}"#).is_none());
    }

    #[test]
    fn test_response_without_choices_fails_to_parse() {
        assert!(serde_json::from_str::<ChatCompletionResponse>(r#"{"id":"x"}"#).is_err());
    }
}
