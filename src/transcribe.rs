use std::path::Path;

use anyhow::{Context, Result};

use crate::config::RuntimeConfig;
use crate::error::ConfigError;
use crate::openai::{OpenAiClient, TranscriptionRequest};
use crate::theme;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscribeOptions {
    pub model: String,
    pub language: Option<String>,
    pub prompt: Option<String>,
}

pub fn validate_transcribe_options(
    options: &TranscribeOptions,
    files: &[String],
) -> Result<(), ConfigError> {
    if options.model.trim().is_empty() {
        return Err(ConfigError::invalid_flag("model", "model cannot be empty"));
    }
    if files.iter().all(|file| file.trim().is_empty()) {
        return Err(ConfigError::invalid_flag(
            "file",
            "at least one audio file is required",
        ));
    }
    Ok(())
}

/// Name sent with the multipart upload; the API infers the codec from it.
pub fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("audio")
        .to_string()
}

pub async fn run_transcribe(
    cfg: &RuntimeConfig,
    options: &TranscribeOptions,
    files: &[String],
) -> Result<()> {
    tracing::debug!(model = %options.model, files = files.len(), "transcribe command called");
    validate_transcribe_options(options, files)?;
    let api_key = cfg.require_api_key()?;
    let client = OpenAiClient::new(api_key, cfg.base_url.as_str());
    let interactive = crate::input::stdin_is_terminal();

    for file in files.iter().filter(|file| !file.trim().is_empty()) {
        let path = Path::new(file);
        let audio = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to open audio file '{}'", path.display()))?;
        let request = TranscriptionRequest {
            file_name: upload_file_name(path),
            audio,
            model: options.model.trim().to_string(),
            language: options.language.clone(),
            prompt: options.prompt.clone(),
        };
        let response = client
            .create_transcription(request)
            .await
            .with_context(|| format!("transcription of '{}' failed", path.display()))?;
        if interactive {
            println!("{}{}:{}", theme::BOLD_GREEN, path.display(), theme::RESET);
        }
        println!("{}", response.text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_a_model_and_a_file() {
        let options = TranscribeOptions {
            model: "whisper-1".to_string(),
            ..Default::default()
        };
        assert!(validate_transcribe_options(&options, &["talk.mp3".to_string()]).is_ok());
        assert!(validate_transcribe_options(&options, &[" ".to_string()]).is_err());

        let blank = TranscribeOptions::default();
        assert!(validate_transcribe_options(&blank, &["talk.mp3".to_string()]).is_err());
    }

    #[test]
    fn upload_name_is_the_file_name() {
        assert_eq!(upload_file_name(Path::new("/tmp/calls/standup.m4a")), "standup.m4a");
    }
}
