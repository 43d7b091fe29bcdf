//! services/api/src/adapters/interpreter.rs
//!
//! This module contains the adapter for the interpretation LLM.
//! It implements the `InterpretationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tarot_journal_core::domain::Interpretation;
use tarot_journal_core::ports::{InterpretationService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InterpretationService` using an
/// OpenAI-compatible LLM constrained to a JSON response.
#[derive(Clone)]
pub struct OpenAiInterpreterAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiInterpreterAdapter {
    /// Creates a new `OpenAiInterpreterAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Parses the raw model output into the required structured object.
///
/// Fails closed: an empty response, invalid JSON, or any shape mismatch is
/// an error, never a best-effort object.
fn parse_interpretation(raw: &str) -> PortResult<Interpretation> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PortError::MalformedResponse(
            "model returned an empty response".to_string(),
        ));
    }
    serde_json::from_str(raw).map_err(|e| PortError::MalformedResponse(e.to_string()))
}

//=========================================================================================
// `InterpretationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl InterpretationService for OpenAiInterpreterAdapter {
    /// Sends the composed prompt and strictly parses the structured reply.
    async fn interpret(&self, prompt: &str) -> PortResult<Interpretation> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::MalformedResponse(
                    "interpretation LLM returned no text content".to_string(),
                )
            })?;

        parse_interpretation(&content)
    }
}
