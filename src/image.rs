use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{SecondsFormat, Utc};

use crate::config::RuntimeConfig;
use crate::error::{ConfigError, redact_sensitive_text};
use crate::input::{self, Markers, MessageSource};
use crate::openai::{ImageData, ImageRequest, OpenAiClient};
use crate::theme;

pub const MODEL_GPT_IMAGE_1: &str = "gpt-image-1";
pub const MODEL_DALL_E_2: &str = "dall-e-2";
pub const MODEL_DALL_E_3: &str = "dall-e-3";

const DALL_E_2_SIZES: &[&str] = &["256x256", "512x512", "1024x1024"];
const DALL_E_3_SIZES: &[&str] = &["1024x1024", "1792x1024", "1024x1792"];
const GPT_IMAGE_SIZES: &[&str] = &["1024x1024", "1024x1536", "1536x1024", "auto"];
const DALL_E_3_QUALITIES: &[&str] = &["standard", "hd"];
const GPT_IMAGE_QUALITIES: &[&str] = &["low", "medium", "high", "auto"];
const DALL_E_3_STYLES: &[&str] = &["vivid", "natural"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOptions {
    pub model: String,
    pub number: u32,
    pub quality: Option<String>,
    pub size: Option<String>,
    pub style: Option<String>,
}

/// Checks the options against the model's limits and fills per-model
/// defaults. Options a model does not accept are left out of the request.
pub fn build_image_request(
    options: &ImageOptions,
    prompt: String,
) -> Result<ImageRequest, ConfigError> {
    let model = options.model.trim();
    let size = options.size.as_deref().map(str::trim);
    let quality = options.quality.as_deref().map(str::trim);
    let style = options.style.as_deref().map(str::trim);

    match model {
        MODEL_DALL_E_2 => {
            check_number(options.number, 10, model)?;
            let size = check_choice("size", size.unwrap_or("1024x1024"), DALL_E_2_SIZES, model)?;
            Ok(ImageRequest {
                prompt,
                model: model.to_string(),
                n: options.number,
                size,
                quality: None,
                style: None,
                response_format: Some("b64_json".to_string()),
            })
        }
        MODEL_DALL_E_3 => {
            check_number(options.number, 1, model)?;
            let size = check_choice("size", size.unwrap_or("1024x1024"), DALL_E_3_SIZES, model)?;
            let quality = check_choice(
                "quality",
                quality.unwrap_or("standard"),
                DALL_E_3_QUALITIES,
                model,
            )?;
            let style = check_choice("style", style.unwrap_or("vivid"), DALL_E_3_STYLES, model)?;
            Ok(ImageRequest {
                prompt,
                model: model.to_string(),
                n: options.number,
                size,
                quality: Some(quality),
                style: Some(style),
                response_format: Some("b64_json".to_string()),
            })
        }
        MODEL_GPT_IMAGE_1 => {
            check_number(options.number, 10, model)?;
            let size = check_choice("size", size.unwrap_or("1024x1024"), GPT_IMAGE_SIZES, model)?;
            let quality = check_choice(
                "quality",
                quality.unwrap_or("high"),
                GPT_IMAGE_QUALITIES,
                model,
            )?;
            if style.is_some_and(|value| !value.is_empty()) {
                return Err(ConfigError::invalid_flag(
                    "style",
                    format!("style is only supported by {MODEL_DALL_E_3}"),
                ));
            }
            Ok(ImageRequest {
                prompt,
                model: model.to_string(),
                n: options.number,
                size,
                quality: Some(quality),
                style: None,
                response_format: None,
            })
        }
        other => Err(ConfigError::invalid_flag(
            "model",
            format!(
                "'{other}' is not an image model. Use one of {MODEL_GPT_IMAGE_1}, {MODEL_DALL_E_2}, {MODEL_DALL_E_3}"
            ),
        )),
    }
}

fn check_number(number: u32, max: u32, model: &str) -> Result<(), ConfigError> {
    if (1..=max).contains(&number) {
        return Ok(());
    }
    let message = if max == 1 {
        format!("{model} generates exactly 1 image per request")
    } else {
        format!("must be between 1 and {max} for {model}")
    };
    Err(ConfigError::invalid_flag("number", message))
}

fn check_choice(
    flag: &'static str,
    value: &str,
    allowed: &[&str],
    model: &str,
) -> Result<String, ConfigError> {
    if allowed.contains(&value) {
        return Ok(value.to_string());
    }
    Err(ConfigError::invalid_flag(
        flag,
        format!(
            "'{value}' is not supported by {model}. Use one of {}",
            allowed.join(", ")
        ),
    ))
}

/// Default output prefix, e.g. `image-2026-10-19T08:30:00Z`.
pub fn default_output_prefix(kind: &str) -> String {
    format!(
        "{kind}-{}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Hands out `<prefix>-NN.<ext>` names with a counter that runs for the
/// whole process.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    prefix: String,
    next: u32,
}

impl OutputNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }

    pub fn next_path(&mut self, extension: &str) -> PathBuf {
        let count = self.next;
        self.next += 1;
        PathBuf::from(format!("{}-{count:02}.{extension}", self.prefix))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }
}

pub fn sniff_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(ImageFormat::Webp)
    } else {
        None
    }
}

/// Decodes one returned image and writes it under the next output name.
pub fn save_image_data(data: &ImageData, namer: &mut OutputNamer, dir: &Path) -> Result<PathBuf> {
    let Some(encoded) = data.b64_json.as_deref() else {
        return Err(anyhow::anyhow!(
            "response carried no inline image data{}",
            data.url
                .as_deref()
                .map(|url| format!(" (url: {url})"))
                .unwrap_or_default()
        ));
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("base64 decode of returned image failed")?;
    let format = sniff_image_format(&bytes)
        .ok_or_else(|| anyhow::anyhow!("returned image is not PNG, JPEG or WebP"))?;

    let path = dir.join(namer.next_path(format.extension()));
    std::fs::write(&path, &bytes)
        .with_context(|| format!("failed to write image file '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote image");
    Ok(path)
}

pub async fn run_image(
    cfg: &RuntimeConfig,
    options: &ImageOptions,
    output_prefix: Option<&str>,
) -> Result<()> {
    tracing::debug!(model = %options.model, "image command called");
    build_image_request(options, String::new())?;
    let api_key = cfg.require_api_key()?;
    let client = OpenAiClient::new(api_key, cfg.base_url.as_str());
    let mut namer = OutputNamer::new(
        output_prefix
            .map(str::to_string)
            .unwrap_or_else(|| default_output_prefix("image")),
    );

    let mut source = input::stdin_source(Markers::default(), theme::PROMPT)?;
    if source.interactive() {
        println!(
            "{}chatgpt-cli{} image  model={} n={} size={}",
            theme::BOLD_CYAN,
            theme::RESET,
            options.model,
            options.number,
            options.size.as_deref().unwrap_or("default")
        );
    }

    let mut stdout = io::stdout();
    while let Some(prompt) = next_prompt(source.as_mut(), &mut stdout)? {
        let request = build_image_request(options, prompt)?;
        match client.create_image(&request).await {
            Ok(response) => {
                for data in &response.data {
                    if let Some(revised) = data.revised_prompt.as_deref() {
                        tracing::info!(revised_prompt = revised, "model revised the prompt");
                    }
                    match save_image_data(data, &mut namer, Path::new("")) {
                        Ok(path) => writeln!(stdout, "{}", path.display())?,
                        Err(err) => eprintln!("{}", theme::error_line(&format!("{err:#}"))),
                    }
                }
            }
            Err(err) if source.interactive() => {
                eprintln!(
                    "{}",
                    theme::error_line(&redact_sensitive_text(&err.to_string()))
                );
            }
            Err(err) => return Err(err).context("image generation failed"),
        }
        if !source.interactive() {
            break;
        }
    }
    Ok(())
}

/// Next non-blank prompt, or `None` after printing the exit notice.
pub fn next_prompt<W: Write>(
    source: &mut dyn MessageSource,
    out: &mut W,
) -> Result<Option<String>> {
    match source.next_message()? {
        Some(text) if !text.trim().is_empty() => Ok(Some(text)),
        Some(_) => {
            writeln!(out, "{}", crate::chat::NO_MESSAGE_NOTICE)?;
            Ok(None)
        }
        None if !source.interactive() => {
            writeln!(out, "{}", crate::chat::NO_MESSAGE_NOTICE)?;
            Ok(None)
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(model: &str) -> ImageOptions {
        ImageOptions {
            model: model.to_string(),
            number: 1,
            ..Default::default()
        }
    }

    #[test]
    fn dall_e_3_rejects_more_than_one_image() {
        let mut opts = options(MODEL_DALL_E_3);
        opts.number = 2;
        let err = build_image_request(&opts, "a fox".to_string()).expect_err("n=2 should fail");
        assert!(err.to_string().contains("--number"));
    }

    #[test]
    fn dall_e_3_fills_quality_and_style_defaults() {
        let request =
            build_image_request(&options(MODEL_DALL_E_3), "a fox".to_string()).expect("valid");
        assert_eq!(request.size, "1024x1024");
        assert_eq!(request.quality.as_deref(), Some("standard"));
        assert_eq!(request.style.as_deref(), Some("vivid"));
        assert_eq!(request.response_format.as_deref(), Some("b64_json"));
    }

    #[test]
    fn dall_e_2_rejects_widescreen_size_and_drops_quality() {
        let mut opts = options(MODEL_DALL_E_2);
        opts.size = Some("1792x1024".to_string());
        assert!(build_image_request(&opts, String::new()).is_err());

        opts.size = Some("512x512".to_string());
        opts.quality = Some("hd".to_string());
        let request = build_image_request(&opts, String::new()).expect("valid");
        assert_eq!(request.quality, None);
    }

    #[test]
    fn gpt_image_rejects_style_and_unknown_model_fails() {
        let mut opts = options(MODEL_GPT_IMAGE_1);
        opts.style = Some("natural".to_string());
        assert!(build_image_request(&opts, String::new()).is_err());
        assert!(build_image_request(&options("gpt-4o"), String::new()).is_err());
    }

    #[test]
    fn namer_counts_across_calls() {
        let mut namer = OutputNamer::new("sunset");
        assert_eq!(namer.next_path("png"), PathBuf::from("sunset-01.png"));
        assert_eq!(namer.next_path("jpg"), PathBuf::from("sunset-02.jpg"));
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(
            sniff_image_format(b"\x89PNG\r\n\x1a\n rest"),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            sniff_image_format(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            sniff_image_format(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
        assert_eq!(sniff_image_format(b"GIF89a"), None);
    }
}
