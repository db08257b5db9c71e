//! HTTP client for the OpenAI-compatible REST API.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, header, multipart};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationState;
use crate::error::BackendError;
use crate::turn::{CompletionClient, CompletionResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: String,
    pub n: u32,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub b64_json: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: String,
    pub response_format: String,
    pub speed: f64,
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub file_name: String,
    pub audio: Vec<u8>,
    pub model: String,
    pub language: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub input: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub data: Vec<EmbeddingVector>,
    #[serde(default)]
    pub usage: EmbeddingUsage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingVector {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    pub async fn chat_completion(
        &self,
        request: &ConversationState,
    ) -> Result<CompletionResponse, BackendError> {
        let endpoint = self.endpoint("/chat/completions");
        let builder = self.authorized(self.http.post(&endpoint)).json(request);
        let response = send(&endpoint, builder).await?;
        decode_json(&endpoint, response).await
    }

    pub async fn create_image(&self, request: &ImageRequest) -> Result<ImageResponse, BackendError> {
        let endpoint = self.endpoint("/images/generations");
        let builder = self.authorized(self.http.post(&endpoint)).json(request);
        let response = send(&endpoint, builder).await?;
        decode_json(&endpoint, response).await
    }

    /// Returns the raw audio bytes.
    pub async fn create_speech(&self, request: &SpeechRequest) -> Result<Vec<u8>, BackendError> {
        let endpoint = self.endpoint("/audio/speech");
        let builder = self.authorized(self.http.post(&endpoint)).json(request);
        let response = send(&endpoint, builder).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| BackendError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        Ok(bytes.to_vec())
    }

    pub async fn create_transcription(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, BackendError> {
        let endpoint = self.endpoint("/audio/transcriptions");
        let mut form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(request.audio).file_name(request.file_name),
            )
            .text("model", request.model);
        if let Some(language) = request.language.filter(|value| !value.is_empty()) {
            form = form.text("language", language);
        }
        if let Some(prompt) = request.prompt.filter(|value| !value.is_empty()) {
            form = form.text("prompt", prompt);
        }

        let builder = self.authorized(self.http.post(&endpoint)).multipart(form);
        let response = send(&endpoint, builder).await?;
        decode_json(&endpoint, response).await
    }

    pub async fn create_embeddings(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, BackendError> {
        let endpoint = self.endpoint("/embeddings");
        let builder = self.authorized(self.http.post(&endpoint)).json(request);
        let response = send(&endpoint, builder).await?;
        decode_json(&endpoint, response).await
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let endpoint = self.endpoint("/models");
        let builder = self.authorized(self.http.get(&endpoint));
        let response = send(&endpoint, builder).await?;
        let list: ModelList = decode_json(&endpoint, response).await?;
        Ok(list.data)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        request: &ConversationState,
    ) -> Result<CompletionResponse, BackendError> {
        self.chat_completion(request).await
    }
}

async fn send(endpoint: &str, builder: RequestBuilder) -> Result<Response, BackendError> {
    tracing::debug!(endpoint, "sending API request");
    let response = builder
        .send()
        .await
        .map_err(|source| BackendError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

async fn decode_json<T: DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<T, BackendError> {
    let body = response
        .text()
        .await
        .map_err(|source| BackendError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;

    // Some gateways report failures inside a 200 body.
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        return Err(BackendError::Api {
            endpoint: endpoint.to_string(),
            status: 200,
            message: envelope.error.message,
        });
    }

    serde_json::from_str::<T>(&body).map_err(|err| BackendError::Decode {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    })
}

/// Extracts `error.message` from an API error body, falling back to the raw text.
pub fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if body.trim().is_empty() => "<empty response body>".to_string(),
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_prefers_structured_error() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(body), "Incorrect API key provided");
        assert_eq!(api_error_message("  upstream timeout \n"), "upstream timeout");
        assert_eq!(api_error_message(""), "<empty response body>");
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = OpenAiClient::new("sk-test", "http://localhost:8080/v1/");
        assert_eq!(client.endpoint("/models"), "http://localhost:8080/v1/models");
        assert!(!format!("{client:?}").contains("sk-test"));
    }
}
