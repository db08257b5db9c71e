use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the session store. Load-side variants abort the whole
/// command; `Write`/`Serialize` leave the in-memory conversation intact.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file '{}' not found", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read session file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed session file '{}': {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize session for '{}': {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write session file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    /// Whether the error happened while writing the durable copy.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, SessionError::Write { .. } | SessionError::Serialize { .. })
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
    #[error("completion response contained no choices")]
    EmptyChoices,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "API key not set. Pass --api-key, export CHATGPT_API_KEY or OPENAI_API_KEY, or set api_key in the active profile"
    )]
    MissingApiKey,
    #[error("invalid value for --{flag}: {message}")]
    InvalidFlag { flag: &'static str, message: String },
}

impl ConfigError {
    pub fn invalid_flag(flag: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidFlag {
            flag,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    SessionLoad,
    SessionWrite,
    Backend,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::SessionLoad => "SESSION_LOAD",
            ErrorCategory::SessionWrite => "SESSION_WRITE",
            ErrorCategory::Backend => "BACKEND",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Config => {
                "Check --api-key/CHATGPT_API_KEY and the active profile in your config file."
            }
            ErrorCategory::SessionLoad => {
                "The session file could not be used. Fix or move it; it is never replaced with a fresh session."
            }
            ErrorCategory::SessionWrite => {
                "The session file on disk is stale. Check permissions and free space for --session-file."
            }
            ErrorCategory::Backend => {
                "The API request failed. Retry with --verbose for request details."
            }
            ErrorCategory::Input => "Run chatgpt-cli --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    for cause in err.chain() {
        if let Some(session) = cause.downcast_ref::<SessionError>() {
            return if session.is_write_failure() {
                ErrorCategory::SessionWrite
            } else {
                ErrorCategory::SessionLoad
            };
        }
        if cause.downcast_ref::<BackendError>().is_some() {
            return ErrorCategory::Backend;
        }
        if let Some(config) = cause.downcast_ref::<ConfigError>() {
            return match config {
                ConfigError::MissingApiKey => ErrorCategory::Config,
                ConfigError::InvalidFlag { .. } => ErrorCategory::Input,
            };
        }
    }

    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("profile") || msg.contains("config") || msg.contains("api key") {
        return ErrorCategory::Config;
    }

    if msg.contains("invalid value")
        || msg.contains("failed to read input")
        || msg.contains("failed to open")
    {
        return ErrorCategory::Input;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        redact_sensitive_text(&format!("{err:#}")),
        category.hint()
    )
}

pub fn redact_sensitive_text(text: &str) -> String {
    redact_api_keys(text)
}

/// Masks anything shaped like an OpenAI secret key (`sk-...`).
pub fn redact_api_keys(text: &str) -> String {
    const KEY_PREFIX: &str = "sk-";
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    while let Some(offset) = text[cursor..].find(KEY_PREFIX) {
        let start = cursor + offset;
        let at_boundary = text[..start]
            .chars()
            .next_back()
            .is_none_or(|ch| !ch.is_ascii_alphanumeric());
        out.push_str(&text[cursor..start]);

        let remainder = &text[start..];
        let end = remainder
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
            .unwrap_or(remainder.len());
        let token = &remainder[..end];
        if at_boundary && token.len() > KEY_PREFIX.len() {
            out.push_str(&mask_secret(token));
        } else {
            out.push_str(token);
        }
        cursor = start + end;
    }

    out.push_str(&text[cursor..]);
    out
}

/// Keeps only the first few characters of a secret.
pub fn mask_secret(value: &str) -> String {
    let visible = value.chars().take(5).collect::<String>();
    format!("{visible}...[REDACTED]")
}
