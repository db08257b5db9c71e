use std::collections::VecDeque;
use std::io::{BufRead, IsTerminal, Read};

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

pub const DEFAULT_EOM_MARKER: &str = "\\s";
pub const DEFAULT_EOS_MARKER: &str = "\\q";

/// Supplies raw outgoing text, one message per call. `Ok(None)` ends the session.
pub trait MessageSource {
    fn interactive(&self) -> bool;

    fn next_message(&mut self) -> Result<Option<String>>;
}

pub fn stdin_is_terminal() -> bool {
    std::io::stdin().is_terminal()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub end_of_message: String,
    pub end_of_session: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            end_of_message: DEFAULT_EOM_MARKER.to_string(),
            end_of_session: DEFAULT_EOS_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Pending,
    Message(String),
    EndOfSession,
}

/// Splits multi-line input into messages. A line ending in the
/// end-of-message marker sends everything buffered so far; a line ending in
/// the end-of-session marker quits without sending.
#[derive(Debug, Clone, Default)]
pub struct MessageSegmenter {
    markers: Markers,
    buffer: Vec<String>,
}

impl MessageSegmenter {
    pub fn new(markers: Markers) -> Self {
        Self {
            markers,
            buffer: Vec::new(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn push_line(&mut self, line: &str) -> Segment {
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim_end();

        if !self.markers.end_of_session.is_empty()
            && trimmed.ends_with(&self.markers.end_of_session)
        {
            self.buffer.clear();
            return Segment::EndOfSession;
        }

        if !self.markers.end_of_message.is_empty()
            && let Some(head) = trimmed.strip_suffix(&self.markers.end_of_message)
        {
            if !head.trim().is_empty() {
                self.buffer.push(head.trim_end().to_string());
            }
            let message = self.buffer.join("\n");
            self.buffer.clear();
            return Segment::Message(message);
        }

        self.buffer.push(line.to_string());
        Segment::Pending
    }

    /// Flushes whatever is buffered when input ends without a marker.
    pub fn finish(&mut self) -> Option<String> {
        let message = self.buffer.join("\n");
        self.buffer.clear();
        (!message.trim().is_empty()).then_some(message)
    }
}

/// Line editor on a terminal.
pub struct TerminalInput {
    editor: DefaultEditor,
    segmenter: MessageSegmenter,
    prompt: String,
}

impl TerminalInput {
    pub fn new(markers: Markers, prompt: impl Into<String>) -> Result<Self> {
        let editor = DefaultEditor::new().context("failed to initialize line editor")?;
        Ok(Self {
            editor,
            segmenter: MessageSegmenter::new(markers),
            prompt: prompt.into(),
        })
    }
}

impl MessageSource for TerminalInput {
    fn interactive(&self) -> bool {
        true
    }

    fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            let prompt = if self.segmenter.has_pending() {
                "... "
            } else {
                self.prompt.as_str()
            };
            match self.editor.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = self.editor.add_history_entry(line.as_str());
                    }
                    match self.segmenter.push_line(&line) {
                        Segment::Pending => continue,
                        Segment::Message(message) => return Ok(Some(message)),
                        Segment::EndOfSession => return Ok(None),
                    }
                }
                Err(ReadlineError::Interrupted) => return Ok(None),
                Err(ReadlineError::Eof) => return Ok(self.segmenter.finish()),
                Err(err) => return Err(err).context("failed to read input from terminal"),
            }
        }
    }
}

/// Non-terminal input: the whole stream is one message.
pub struct PipedInput<R> {
    reader: R,
    consumed: bool,
}

impl<R: BufRead> PipedInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            consumed: false,
        }
    }
}

impl<R: BufRead> MessageSource for PipedInput<R> {
    fn interactive(&self) -> bool {
        false
    }

    fn next_message(&mut self) -> Result<Option<String>> {
        if self.consumed {
            return Ok(None);
        }
        self.consumed = true;

        let mut text = String::new();
        self.reader
            .read_to_string(&mut text)
            .context("failed to read input from stdin")?;
        let text = text.trim_end_matches(['\r', '\n']).to_string();
        Ok((!text.trim().is_empty()).then_some(text))
    }
}

/// A fixed list of messages, consumed in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    messages: VecDeque<String>,
    interactive: bool,
}

impl ScriptedInput {
    pub fn new<I, S>(messages: I, interactive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            interactive,
        }
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self::new([message], false)
    }
}

impl MessageSource for ScriptedInput {
    fn interactive(&self) -> bool {
        self.interactive
    }

    fn next_message(&mut self) -> Result<Option<String>> {
        Ok(self.messages.pop_front())
    }
}

/// Picks the terminal editor when stdin is a TTY, the whole-stream reader otherwise.
pub fn stdin_source(markers: Markers, prompt: &str) -> Result<Box<dyn MessageSource>> {
    if stdin_is_terminal() {
        Ok(Box::new(TerminalInput::new(markers, prompt)?))
    } else {
        Ok(Box::new(PipedInput::new(std::io::stdin().lock())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_message_marker_sends_buffered_lines() {
        let mut segmenter = MessageSegmenter::default();
        assert_eq!(segmenter.push_line("first line"), Segment::Pending);
        assert_eq!(
            segmenter.push_line("second line \\s"),
            Segment::Message("first line\nsecond line".to_string())
        );
        assert!(!segmenter.has_pending());
    }

    #[test]
    fn end_of_session_marker_discards_pending_text() {
        let mut segmenter = MessageSegmenter::default();
        segmenter.push_line("draft");
        assert_eq!(segmenter.push_line("\\q"), Segment::EndOfSession);
        assert_eq!(segmenter.finish(), None);
    }

    #[test]
    fn bare_end_of_message_marker_sends_empty_message() {
        let mut segmenter = MessageSegmenter::default();
        assert_eq!(segmenter.push_line("\\s"), Segment::Message(String::new()));
    }

    #[test]
    fn custom_markers_are_honored() {
        let mut segmenter = MessageSegmenter::new(Markers {
            end_of_message: "::send".to_string(),
            end_of_session: "::quit".to_string(),
        });
        assert_eq!(segmenter.push_line("hello \\s"), Segment::Pending);
        assert_eq!(
            segmenter.push_line("::send"),
            Segment::Message("hello \\s".to_string())
        );
        assert_eq!(segmenter.push_line("bye ::quit"), Segment::EndOfSession);
    }

    #[test]
    fn piped_input_yields_whole_stream_once() {
        let mut input = PipedInput::new(std::io::Cursor::new("line one\nline two\n\n"));
        assert!(!input.interactive());
        assert_eq!(
            input.next_message().unwrap().as_deref(),
            Some("line one\nline two")
        );
        assert_eq!(input.next_message().unwrap(), None);
    }

    #[test]
    fn piped_input_treats_blank_stream_as_no_message() {
        let mut input = PipedInput::new(std::io::Cursor::new(" \n"));
        assert_eq!(input.next_message().unwrap(), None);
    }
}
