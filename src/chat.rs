use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::cli::{GenerationArgs, ImageDetail, SessionArgs};
use crate::config::RuntimeConfig;
use crate::conversation::{ContentPart, ConversationState, ImageUrl, Message, MessageContent};
use crate::error::redact_sensitive_text;
use crate::input::{self, MessageSource, ScriptedInput};
use crate::lifecycle::{PersistOutcome, SessionHandle, SessionLifecycle};
use crate::openai::OpenAiClient;
use crate::session_store::FileSessionStore;
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::theme;
use crate::turn::{CompletionClient, execute_turn};

pub const NO_MESSAGE_NOTICE: &str = "No message to send, exiting";

/// Collaborators shared by every turn of one invocation.
pub struct TurnContext<'a> {
    pub lifecycle: &'a SessionLifecycle<'a>,
    pub client: &'a dyn CompletionClient,
    pub telemetry: &'a TelemetrySink,
    pub role: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatSummary {
    pub turns_completed: usize,
    pub turns_failed: usize,
    pub persisted: usize,
    pub persist_failures: usize,
}

/// Drives turns until the source is exhausted.
///
/// Each reply is written to `out` and then persisted through the lifecycle.
/// A non-interactive source gets exactly one turn, and any backend or
/// persistence failure is returned. An interactive source reports the
/// failure on stderr and keeps going. Failed turns are never persisted.
pub async fn run_turns<W, F>(
    state: &mut ConversationState,
    source: &mut dyn MessageSource,
    mut compose: F,
    ctx: &TurnContext<'_>,
    out: &mut W,
) -> Result<ChatSummary>
where
    W: Write,
    F: FnMut(String) -> Result<MessageContent>,
{
    let interactive = source.interactive();
    let session = ctx.lifecycle.handle();
    let mut summary = ChatSummary::default();

    loop {
        let text = match source.next_message()? {
            Some(text) if !text.trim().is_empty() => text,
            Some(_) => {
                writeln!(out, "{NO_MESSAGE_NOTICE}")?;
                break;
            }
            None => {
                if !interactive && summary.turns_completed + summary.turns_failed == 0 {
                    writeln!(out, "{NO_MESSAGE_NOTICE}")?;
                }
                break;
            }
        };

        let outgoing = Message::new(ctx.role.clone(), compose(text)?);
        match execute_turn(state, outgoing, ctx.client).await {
            Ok(reply) => {
                summary.turns_completed += 1;
                ctx.telemetry.emit_for_session(
                    session,
                    TelemetryEvent::TurnCompleted {
                        model: state.model.clone(),
                        messages: state.messages.len(),
                    },
                );
                writeln!(out, "{}", reply.text_content())?;
                if interactive {
                    writeln!(out)?;
                }
                out.flush()?;

                match ctx.lifecycle.persist(state) {
                    Ok(PersistOutcome::Written) => {
                        summary.persisted += 1;
                        ctx.telemetry.emit_for_session(
                            session,
                            TelemetryEvent::SessionPersisted {
                                messages: state.messages.len(),
                            },
                        );
                    }
                    Ok(PersistOutcome::Skipped) => {}
                    Err(err) => {
                        summary.persist_failures += 1;
                        ctx.telemetry.emit_for_session(
                            session,
                            TelemetryEvent::SessionPersistFailed {
                                error: err.to_string(),
                            },
                        );
                        tracing::warn!(error = %err, "session persistence failed");
                        if !interactive {
                            return Err(err)
                                .context("reply received but the session file was not updated");
                        }
                        eprintln!("{}", theme::persist_warning(&err.to_string()));
                    }
                }
            }
            Err(err) => {
                summary.turns_failed += 1;
                let rendered = redact_sensitive_text(&err.to_string());
                ctx.telemetry.emit_for_session(
                    session,
                    TelemetryEvent::TurnFailed {
                        error: rendered.clone(),
                    },
                );
                if !interactive {
                    return Err(err).context("chat turn failed");
                }
                tracing::warn!(error = %rendered, "chat turn failed");
                eprintln!("{}", theme::error_line(&rendered));
            }
        }

        if !interactive {
            break;
        }
    }

    Ok(summary)
}

pub async fn run_chat(
    cfg: &RuntimeConfig,
    generation: &GenerationArgs,
    session: &SessionArgs,
    telemetry: &TelemetrySink,
) -> Result<()> {
    tracing::debug!("chat command called");
    let api_key = cfg.require_api_key()?;
    let params = cfg.generation_params(generation);
    let settings = cfg.session_settings(session);

    let store = FileSessionStore::new();
    let handle = SessionHandle::resolve(
        &settings.session_file,
        settings.skip_write_session,
        &store,
    )?;
    let lifecycle = SessionLifecycle::new(&store, handle);
    let mut state = lifecycle.acquire(&params, settings.system_message.as_deref())?;

    let client = OpenAiClient::new(api_key, cfg.base_url.as_str());
    let mut source = input::stdin_source(settings.markers.clone(), theme::PROMPT)?;
    if source.interactive() {
        theme::print_banner(&params, &settings.markers, lifecycle.handle());
    }

    let ctx = TurnContext {
        lifecycle: &lifecycle,
        client: &client,
        telemetry,
        role: params.role.clone(),
    };
    let mut stdout = io::stdout();
    let summary = run_turns(
        &mut state,
        source.as_mut(),
        |text| Ok(MessageContent::Text(text)),
        &ctx,
        &mut stdout,
    )
    .await?;

    tracing::info!(
        turns_completed = summary.turns_completed,
        turns_failed = summary.turns_failed,
        persisted = summary.persisted,
        persist_failures = summary.persist_failures,
        "chat finished"
    );
    Ok(())
}

pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

pub fn image_data_url(path: &Path, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type_for_path(path),
        STANDARD.encode(bytes)
    )
}

/// Text first, then one image part per data URL.
pub fn compose_vision_content(
    text: String,
    image_urls: &[String],
    detail: ImageDetail,
) -> MessageContent {
    let mut parts = Vec::with_capacity(image_urls.len() + 1);
    parts.push(ContentPart::Text { text });
    for url in image_urls {
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl::new(url.clone(), Some(detail.as_str().to_string())),
        });
    }
    MessageContent::Parts(parts)
}

pub async fn load_images(files: &[String]) -> Result<Vec<String>> {
    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        let path = Path::new(file);
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to open image file '{}'", path.display()))?;
        urls.push(image_data_url(path, &bytes));
    }
    Ok(urls)
}

pub async fn run_vision(
    cfg: &RuntimeConfig,
    generation: &GenerationArgs,
    session: &SessionArgs,
    detail: ImageDetail,
    files: &[String],
    prompt: &[String],
    telemetry: &TelemetrySink,
) -> Result<()> {
    tracing::debug!(files = files.len(), detail = detail.as_str(), "vision command called");
    let api_key = cfg.require_api_key()?;
    let params = cfg.generation_params(generation);
    let settings = cfg.session_settings(session);
    let image_urls = load_images(files).await?;

    let store = FileSessionStore::new();
    let handle = SessionHandle::resolve(
        &settings.session_file,
        settings.skip_write_session,
        &store,
    )?;
    let lifecycle = SessionLifecycle::new(&store, handle);
    let mut state = lifecycle.acquire(&params, settings.system_message.as_deref())?;

    let question = prompt.join(" ");
    let question = if question.trim().is_empty() {
        let mut source = input::stdin_source(settings.markers.clone(), theme::PROMPT)?;
        source.next_message()?.unwrap_or_default()
    } else {
        question
    };

    let client = OpenAiClient::new(api_key, cfg.base_url.as_str());
    let ctx = TurnContext {
        lifecycle: &lifecycle,
        client: &client,
        telemetry,
        role: params.role.clone(),
    };
    let mut source = ScriptedInput::single(question);
    let mut stdout = io::stdout();
    run_turns(
        &mut state,
        &mut source,
        |text| Ok(compose_vision_content(text, &image_urls, detail)),
        &ctx,
        &mut stdout,
    )
    .await?;
    Ok(())
}
