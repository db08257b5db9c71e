use async_trait::async_trait;
use serde::Deserialize;

use crate::conversation::{ConversationState, Message};
use crate::error::BackendError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<CompletionUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CompletionUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// The single network boundary of a turn. Implementations receive the full
/// transcript and own any retry policy.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        request: &ConversationState,
    ) -> Result<CompletionResponse, BackendError>;
}

/// Runs one turn: append `outgoing`, call the backend once, append the first
/// choice. On failure the outgoing message stays in `state` with no reply.
pub async fn execute_turn(
    state: &mut ConversationState,
    outgoing: Message,
    client: &dyn CompletionClient,
) -> Result<Message, BackendError> {
    state.push(outgoing);
    tracing::debug!(
        model = %state.model,
        messages = state.messages.len(),
        "sending completion request"
    );

    let response = client.complete(state).await?;
    if let Some(usage) = response.usage {
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "completion usage"
        );
    }

    let reply = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or(BackendError::EmptyChoices)?;
    state.push(reply.clone());
    Ok(reply)
}
