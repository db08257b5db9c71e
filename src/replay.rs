//! Read-only rendering of a saved session.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;

use crate::conversation::{ContentPart, ConversationState, Message, MessageContent};
use crate::session_store::{FileSessionStore, SessionStore};
use crate::theme;

/// Renders message content; images become `[image: <detail>]` and parts of
/// other types `[<type>]`.
pub fn render_content(message: &Message) -> String {
    match &message.content {
        None => String::new(),
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.clone(),
                ContentPart::ImageUrl { image_url } => format!(
                    "[image: {}]",
                    image_url.detail.as_deref().unwrap_or("auto")
                ),
                ContentPart::Other(_) => match part.text() {
                    Some(text) => text.to_string(),
                    None => format!("[{}]", part.kind()),
                },
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

pub fn write_transcript<W: Write>(
    state: &ConversationState,
    out: &mut W,
    colored: bool,
) -> io::Result<()> {
    for (index, message) in state.messages.iter().enumerate() {
        if colored {
            writeln!(
                out,
                "{}{}:{}",
                theme::speaker_color(index),
                message.role,
                theme::RESET
            )?;
        } else {
            writeln!(out, "{}:", message.role)?;
        }
        writeln!(out, "{}", render_content(message))?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn run_replay_session(session_file: &str) -> Result<()> {
    tracing::debug!(session_file, "replay-session command called");
    let store = FileSessionStore::new();
    let state = store.load(Path::new(session_file.trim()))?;
    let colored = io::IsTerminal::is_terminal(&io::stdout());
    let mut stdout = io::stdout().lock();
    write_transcript(&state, &mut stdout, colored)?;
    Ok(())
}
