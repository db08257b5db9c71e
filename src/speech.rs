use std::io::{self, Write};

use anyhow::{Context, Result};

use crate::config::RuntimeConfig;
use crate::error::{ConfigError, redact_sensitive_text};
use crate::image::{OutputNamer, default_output_prefix, next_prompt};
use crate::input::{self, Markers};
use crate::openai::{OpenAiClient, SpeechRequest};
use crate::theme;

pub const SPEECH_MODELS: &[&str] = &["tts-1", "tts-1-hd", "gpt-4o-mini-tts"];
pub const VOICES: &[&str] = &[
    "alloy", "ash", "coral", "echo", "fable", "onyx", "nova", "sage", "shimmer",
];
pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOptions {
    pub model: String,
    pub voice: String,
    pub speed: f64,
}

pub fn build_speech_request(
    options: &SpeechOptions,
    input: String,
) -> Result<SpeechRequest, ConfigError> {
    if !(MIN_SPEED..=MAX_SPEED).contains(&options.speed) {
        return Err(ConfigError::invalid_flag(
            "speed",
            format!("must be between {MIN_SPEED} and {MAX_SPEED}, inclusive"),
        ));
    }
    let model = options.model.trim();
    if !SPEECH_MODELS.contains(&model) {
        return Err(ConfigError::invalid_flag(
            "model",
            format!("use one of {}", SPEECH_MODELS.join(", ")),
        ));
    }
    let voice = options.voice.trim().to_ascii_lowercase();
    if !VOICES.contains(&voice.as_str()) {
        return Err(ConfigError::invalid_flag(
            "voice",
            format!("use one of {}", VOICES.join(", ")),
        ));
    }

    Ok(SpeechRequest {
        model: model.to_string(),
        input,
        voice,
        response_format: "mp3".to_string(),
        speed: options.speed,
    })
}

pub async fn run_speech(
    cfg: &RuntimeConfig,
    options: &SpeechOptions,
    output_prefix: Option<&str>,
) -> Result<()> {
    tracing::debug!(model = %options.model, voice = %options.voice, "text-to-speech command called");
    build_speech_request(options, String::new())?;
    let api_key = cfg.require_api_key()?;
    let client = OpenAiClient::new(api_key, cfg.base_url.as_str());
    let mut namer = OutputNamer::new(
        output_prefix
            .map(str::to_string)
            .unwrap_or_else(|| default_output_prefix("tts")),
    );

    let mut source = input::stdin_source(Markers::default(), theme::PROMPT)?;
    if source.interactive() {
        println!(
            "{}chatgpt-cli{} text-to-speech  model={} voice={} speed={:.2}",
            theme::BOLD_CYAN,
            theme::RESET,
            options.model,
            options.voice,
            options.speed
        );
    }

    let mut stdout = io::stdout();
    while let Some(text) = next_prompt(source.as_mut(), &mut stdout)? {
        let request = build_speech_request(options, text)?;
        match client.create_speech(&request).await {
            Ok(audio) => {
                let path = namer.next_path("mp3");
                std::fs::write(&path, &audio)
                    .with_context(|| format!("failed to write audio file '{}'", path.display()))?;
                writeln!(stdout, "{}", path.display())?;
            }
            Err(err) if source.interactive() => {
                eprintln!(
                    "{}",
                    theme::error_line(&redact_sensitive_text(&err.to_string()))
                );
            }
            Err(err) => return Err(err).context("speech synthesis failed"),
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

    fn options() -> SpeechOptions {
        SpeechOptions {
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
        }
    }

    #[test]
    fn speed_bounds_are_inclusive() {
        let mut opts = options();
        opts.speed = 0.25;
        assert!(build_speech_request(&opts, "hi".to_string()).is_ok());
        opts.speed = 4.0;
        assert!(build_speech_request(&opts, "hi".to_string()).is_ok());
        opts.speed = 4.01;
        let err = build_speech_request(&opts, "hi".to_string()).expect_err("too fast");
        assert!(err.to_string().contains("--speed"));
    }

    #[test]
    fn voice_is_normalized_and_checked() {
        let mut opts = options();
        opts.voice = "Nova".to_string();
        let request = build_speech_request(&opts, "hi".to_string()).expect("valid voice");
        assert_eq!(request.voice, "nova");
        assert_eq!(request.response_format, "mp3");

        opts.voice = "robot".to_string();
        assert!(build_speech_request(&opts, "hi".to_string()).is_err());
    }

    #[test]
    fn unknown_model_is_rejected() {
        let mut opts = options();
        opts.model = "whisper-1".to_string();
        assert!(build_speech_request(&opts, "hi".to_string()).is_err());
    }
}
