//! OpenAI API data models for request/response handling.
//!
//! This module contains types that match the OpenAI API specification.
//! Domain types live in `localgate-core`; this module handles the API layer
//! mapping.

use localgate_core::{ConversationMessage, MessageRole, ModelCard, ModelError};
use serde::{Deserialize, Serialize};

/// `object` value of a non-streaming chat completion.
pub const CHAT_COMPLETION_OBJECT: &str = "chat.completion";
/// `object` value of a streaming chat completion chunk.
pub const CHAT_COMPLETION_CHUNK_OBJECT: &str = "chat.completion.chunk";
/// `object` value of a legacy completion.
pub const TEXT_COMPLETION_OBJECT: &str = "text_completion";

const FINISH_REASON_STOP: &str = "stop";

// =============================================================================
// Chat Completion Request/Response Types
// =============================================================================

/// Request to /v1/chat/completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model name, echoed back in the response.
    pub model: String,
    /// Array of chat messages, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Whether to stream the response.
    #[serde(default)]
    pub stream: Option<bool>,
}

impl ChatCompletionRequest {
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Convert the wire messages into domain conversation messages.
    #[must_use]
    pub fn conversation(&self) -> Vec<ConversationMessage> {
        self.messages
            .iter()
            .map(|m| ConversationMessage::new(m.role, m.content.as_text()))
            .collect()
    }

    /// Character count of all message contents, used as `prompt_tokens`.
    #[must_use]
    pub fn prompt_chars(&self) -> usize {
        self.messages
            .iter()
            .map(|m| m.content.as_text().chars().count())
            .sum()
    }
}

/// A single inbound chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user" or "assistant".
    pub role: MessageRole,
    /// Plain text or an array of content parts.
    pub content: MessageContent,
}

/// Message content as sent by clients: a string or an array of parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text of the message. For part arrays this is the text of the first
    /// part whose type is `"text"`, or an empty string.
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts
                .iter()
                .find(|p| p.r#type == "text")
                .and_then(|p| p.text.as_deref())
                .unwrap_or(""),
        }
    }
}

/// One element of an array-form message content.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    /// Part type ("text", "image_url", ...).
    pub r#type: String,
    /// Text for text parts; other part types carry no text.
    #[serde(default)]
    pub text: Option<String>,
}

/// Assistant message in a non-streaming response.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Response from /v1/chat/completions endpoint (non-streaming).
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

impl ChatCompletionResponse {
    pub fn new(model: impl Into<String>, content: String, prompt_chars: usize) -> Self {
        let usage = Usage::new(prompt_chars, content.chars().count());
        Self {
            id: chat_completion_id(),
            object: CHAT_COMPLETION_OBJECT.to_string(),
            created: unix_now(),
            model: model.into(),
            choices: vec![ChatChoice {
                index: 0,
                message: ResponseMessage {
                    role: MessageRole::Assistant,
                    content,
                },
                finish_reason: FINISH_REASON_STOP.to_string(),
            }],
            usage,
        }
    }
}

/// A single chat completion choice.
#[derive(Debug, Clone, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: String,
}

/// Streaming chunk from /v1/chat/completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChunkChoice>,
}

impl ChatCompletionChunk {
    /// Chunk carrying a content delta. `with_role` marks the first chunk.
    #[must_use]
    pub fn delta(meta: &StreamMeta, content: String, with_role: bool) -> Self {
        Self::from_choice(
            meta,
            ChatChunkChoice {
                index: 0,
                delta: ChatDelta {
                    role: with_role.then_some(MessageRole::Assistant),
                    content: Some(content),
                },
                finish_reason: None,
            },
        )
    }

    /// Terminal chunk: no content, `finish_reason` "stop".
    #[must_use]
    pub fn finish(meta: &StreamMeta) -> Self {
        Self::from_choice(
            meta,
            ChatChunkChoice {
                index: 0,
                delta: ChatDelta::default(),
                finish_reason: Some(FINISH_REASON_STOP.to_string()),
            },
        )
    }

    fn from_choice(meta: &StreamMeta, choice: ChatChunkChoice) -> Self {
        Self {
            id: meta.id.clone(),
            object: CHAT_COMPLETION_CHUNK_OBJECT.to_string(),
            created: meta.created,
            model: meta.model.clone(),
            choices: vec![choice],
        }
    }
}

/// Identity shared by every chunk of one streamed response.
#[derive(Debug, Clone)]
pub struct StreamMeta {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl StreamMeta {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: chat_completion_id(),
            created: unix_now(),
            model: model.into(),
        }
    }
}

/// A single streaming choice.
#[derive(Debug, Clone, Serialize)]
pub struct ChatChunkChoice {
    pub index: u32,
    pub delta: ChatDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Delta content in streaming response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Usage statistics. Counts are characters, not tokenizer tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    #[must_use]
    pub const fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

// =============================================================================
// Legacy Completions Types
// =============================================================================

/// Request to /v1/completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
}

/// Response from /v1/completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn new(model: impl Into<String>, prompt: &str, text: String) -> Self {
        let usage = Usage::new(prompt.chars().count(), text.chars().count());
        Self {
            id: format!("cmpl-{}", uuid::Uuid::new_v4()),
            object: TEXT_COMPLETION_OBJECT.to_string(),
            created: unix_now(),
            model: model.into(),
            choices: vec![CompletionChoice {
                text,
                index: 0,
                finish_reason: FINISH_REASON_STOP.to_string(),
            }],
            usage,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionChoice {
    pub text: String,
    pub index: u32,
    pub finish_reason: String,
}

// =============================================================================
// Embeddings Types
// =============================================================================

/// Request to /v1/embeddings endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: EmbeddingInput,
}

/// A single string or a batch of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        match self {
            Self::Single(text) => vec![text.as_str()],
            Self::Batch(texts) => texts.iter().map(String::as_str).collect(),
        }
    }
}

/// Response from /v1/embeddings endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingResponse {
    pub object: String,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub usage: Usage,
}

impl EmbeddingResponse {
    #[must_use]
    pub fn new(model: String, data: Vec<EmbeddingData>, input_chars: usize) -> Self {
        Self {
            object: "list".to_string(),
            data,
            model,
            usage: Usage::new(input_chars, 0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingData {
    pub object: String,
    pub embedding: Vec<f64>,
    pub index: usize,
}

impl EmbeddingData {
    #[must_use]
    pub fn new(index: usize, embedding: Vec<f64>) -> Self {
        Self {
            object: "embedding".to_string(),
            embedding,
            index,
        }
    }
}

// =============================================================================
// Models Endpoint Types
// =============================================================================

/// Response from /v1/models endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

impl ModelsResponse {
    /// List containing the loaded model, or nothing.
    #[must_use]
    pub fn from_card(card: Option<&ModelCard>) -> Self {
        Self {
            object: "list".to_string(),
            data: card.map(ModelInfo::from).into_iter().collect(),
        }
    }
}

/// Information about a single model (OpenAI format).
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl From<&ModelCard> for ModelInfo {
    fn from(card: &ModelCard) -> Self {
        Self {
            id: card.id.clone(),
            object: "model".to_string(),
            created: card.created(),
            owned_by: card.owned_by.clone(),
        }
    }
}

// =============================================================================
// Error Response Types
// =============================================================================

/// Error response matching OpenAI format.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail within an error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                code: None,
            },
        }
    }

    /// Create an error response with a code.
    pub fn with_code(
        message: impl Into<String>,
        error_type: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                code: Some(code.into()),
            },
        }
    }

    /// Malformed request body.
    pub fn invalid_request(reason: impl std::fmt::Display) -> Self {
        Self::with_code(
            format!("Invalid request body: {reason}"),
            "invalid_request_error",
            "invalid_request",
        )
    }
}

impl From<&ModelError> for ErrorResponse {
    fn from(err: &ModelError) -> Self {
        let error_type = match err.suggested_status_code() {
            503 => "service_unavailable",
            422 => "invalid_request_error",
            501 => "not_implemented",
            _ => "server_error",
        };
        Self::with_code(err.to_string(), error_type, err.code())
    }
}

fn chat_completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4())
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
