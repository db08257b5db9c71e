//! Terminal styling for banners, transcripts and warnings.

use crate::input::Markers;
use crate::lifecycle::{SessionHandle, SessionOrigin};
use crate::params::GenerationParams;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const CYAN: &str = "\x1b[36m";
pub const GREEN: &str = "\x1b[32m";
pub const BOLD_CYAN: &str = "\x1b[1;36m";
pub const BOLD_GREEN: &str = "\x1b[1;32m";
pub const BOLD_YELLOW: &str = "\x1b[1;33m";
pub const BOLD_RED: &str = "\x1b[1;31m";

pub const PROMPT: &str = "\x1b[1;36m>\x1b[0m ";

/// Colour for a transcript entry; even and odd positions alternate.
pub fn speaker_color(index: usize) -> &'static str {
    if index % 2 == 0 { BOLD_CYAN } else { BOLD_GREEN }
}

pub fn format_max_tokens(max_tokens: u32) -> String {
    if max_tokens == 0 {
        "unlimited".to_string()
    } else {
        max_tokens.to_string()
    }
}

pub fn banner_lines(params: &GenerationParams, markers: &Markers) -> Vec<String> {
    let version = env!("CARGO_PKG_VERSION");
    vec![
        format!("{BOLD_CYAN}chatgpt-cli{RESET} {DIM}v{version}{RESET}"),
        format!(
            "{DIM}model{RESET} {GREEN}{}{RESET}  {DIM}role{RESET} {}  {DIM}temperature{RESET} {}  {DIM}max tokens{RESET} {}  {DIM}top-p{RESET} {}",
            params.model,
            params.role,
            params.temperature,
            format_max_tokens(params.max_tokens),
            params.top_p
        ),
        format!(
            "End a message with {CYAN}{}{RESET}, quit with {CYAN}{}{RESET} or Ctrl-D.",
            markers.end_of_message, markers.end_of_session
        ),
    ]
}

pub fn session_status_line(handle: &SessionHandle) -> Option<String> {
    let path = handle.path()?.display().to_string();
    let line = match (handle.origin(), handle.persist()) {
        (SessionOrigin::Resumed, true) => {
            format!("{DIM}Continuing session from file:{RESET} {path}")
        }
        (SessionOrigin::Resumed, false) => {
            format!("{DIM}Continuing session from file (read-only):{RESET} {path}")
        }
        (_, true) => format!("{DIM}Session will be saved to:{RESET} {path}"),
        (_, false) => return None,
    };
    Some(line)
}

pub fn print_banner(params: &GenerationParams, markers: &Markers, handle: &SessionHandle) {
    println!();
    for line in banner_lines(params, markers) {
        println!("  {line}");
    }
    if let Some(status) = session_status_line(handle) {
        println!("  {status}");
    }
    println!("  {DIM}{}{RESET}", "━".repeat(68));
    println!();
}

pub fn persist_warning(message: &str) -> String {
    format!("{BOLD_YELLOW}warning:{RESET} {BOLD}session not saved{RESET}: {message}")
}

pub fn error_line(message: &str) -> String {
    format!("{BOLD_RED}error:{RESET} {message}")
}
