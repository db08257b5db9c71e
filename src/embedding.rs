use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::RuntimeConfig;
use crate::error::{ConfigError, redact_sensitive_text};
use crate::image::next_prompt;
use crate::input::{self, Markers};
use crate::openai::{
    EmbeddingRequest, EmbeddingResponse, EmbeddingUsage, EmbeddingVector, OpenAiClient,
};
use crate::theme;

pub const EMBEDDING_MODELS: &[&str] = &[
    "text-embedding-3-small",
    "text-embedding-3-large",
    "text-embedding-ada-002",
];

#[derive(Debug, Serialize)]
pub struct EmbeddingOutput<'a> {
    pub model: &'a str,
    pub dimensions: usize,
    pub data: &'a [EmbeddingVector],
    pub usage: EmbeddingUsage,
}

/// `dimensions == 0` keeps the model's native size.
pub fn build_embedding_request(
    model: &str,
    dimensions: u32,
    input: String,
) -> Result<EmbeddingRequest, ConfigError> {
    let model = model.trim();
    if !EMBEDDING_MODELS.contains(&model) {
        return Err(ConfigError::invalid_flag(
            "model",
            format!("use one of {}", EMBEDDING_MODELS.join(", ")),
        ));
    }
    if dimensions > 0 && model == "text-embedding-ada-002" {
        return Err(ConfigError::invalid_flag(
            "dimensions",
            "text-embedding-ada-002 has a fixed output size",
        ));
    }
    Ok(EmbeddingRequest {
        input,
        model: model.to_string(),
        dimensions: (dimensions > 0).then_some(dimensions),
    })
}

pub fn render_embedding(response: &EmbeddingResponse) -> Result<String> {
    let output = EmbeddingOutput {
        model: &response.model,
        dimensions: response
            .data
            .first()
            .map(|vector| vector.embedding.len())
            .unwrap_or(0),
        data: &response.data,
        usage: response.usage,
    };
    serde_json::to_string_pretty(&output).context("failed to render embedding response")
}

pub async fn run_embedding(cfg: &RuntimeConfig, model: &str, dimensions: u32) -> Result<()> {
    tracing::debug!(model, dimensions, "embedding command called");
    build_embedding_request(model, dimensions, String::new())?;
    let api_key = cfg.require_api_key()?;
    let client = OpenAiClient::new(api_key, cfg.base_url.as_str());

    let mut source = input::stdin_source(Markers::default(), theme::PROMPT)?;
    let mut stdout = io::stdout();
    while let Some(text) = next_prompt(source.as_mut(), &mut stdout)? {
        let request = build_embedding_request(model, dimensions, text)?;
        match client.create_embeddings(&request).await {
            Ok(response) => writeln!(stdout, "{}", render_embedding(&response)?)?,
            Err(err) if source.interactive() => {
                eprintln!(
                    "{}",
                    theme::error_line(&redact_sensitive_text(&err.to_string()))
                );
            }
            Err(err) => return Err(err).context("embedding request failed"),
        }
        if !source.interactive() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimensions_are_left_out() {
        let request = build_embedding_request("text-embedding-3-small", 0, "hi".to_string())
            .expect("valid request");
        assert_eq!(request.dimensions, None);
        let json = serde_json::to_value(&request).expect("request should serialize");
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn ada_rejects_custom_dimensions() {
        assert!(build_embedding_request("text-embedding-ada-002", 256, String::new()).is_err());
        assert!(build_embedding_request("text-embedding-3-large", 256, String::new()).is_ok());
        assert!(build_embedding_request("gpt-4o", 0, String::new()).is_err());
    }

    #[test]
    fn rendered_output_reports_vector_length() {
        let response = EmbeddingResponse {
            model: "text-embedding-3-small".to_string(),
            data: vec![EmbeddingVector {
                index: 0,
                embedding: vec![0.25, -0.5, 1.0],
            }],
            usage: EmbeddingUsage {
                prompt_tokens: 2,
                total_tokens: 2,
            },
        };
        let rendered = render_embedding(&response).expect("render should succeed");
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(value["dimensions"], 3);
        assert_eq!(value["usage"]["total_tokens"], 2);
        assert_eq!(value["data"][0]["embedding"][1], -0.5);
    }
}
