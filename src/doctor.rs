use std::path::Path;

use anyhow::Result;

use crate::cli::GenerationArgs;
use crate::config::{RuntimeConfig, display_api_key};
use crate::session_store::{FileSessionStore, SessionStore};
use crate::theme::format_max_tokens;

pub fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

/// One line describing the session file, without modifying it.
pub fn session_file_report(store: &dyn SessionStore, path: &Path) -> String {
    match store.exists(path) {
        Ok(true) => {}
        Ok(false) => {
            return format!(
                "Session file: {} (missing; a new session would be created)",
                path.display()
            );
        }
        Err(err) => return format!("Session file: {} (unusable: {err})", path.display()),
    }
    match store.load(path) {
        Ok(state) => format!(
            "Session file: {} (ok: {} messages, stored model {})",
            path.display(),
            state.messages.len(),
            if state.model.is_empty() {
                "<none>"
            } else {
                state.model.as_str()
            }
        ),
        Err(err) => format!("Session file: {} (unusable: {err})", path.display()),
    }
}

pub fn run_doctor(cfg: &RuntimeConfig, session_file: Option<&str>) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile,
        cfg.config_path_label()
    );

    println!("Credential check:");
    for key in ["CHATGPT_API_KEY", "OPENAI_API_KEY"] {
        let status = if env_present(key) { "set" } else { "missing" };
        println!("- {key}: {status}");
    }
    println!("Resolved API key: {}", display_api_key(cfg));
    if cfg.api_key.is_none() {
        println!("Tip: export OPENAI_API_KEY or pass --api-key");
    }
    println!("Base URL: {}", cfg.base_url);

    let params = cfg.generation_params(&GenerationArgs::default());
    println!(
        "Generation defaults: model={} role={} temperature={} max_tokens={} top_p={}",
        params.model,
        params.role,
        params.temperature,
        format_max_tokens(params.max_tokens),
        params.top_p
    );
    println!("Markers: end-of-message={} end-of-session={}", cfg.eom, cfg.eos);
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );

    let session_file = session_file
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or(cfg.session_file.as_deref());
    if let Some(path) = session_file {
        println!(
            "{}",
            session_file_report(&FileSessionStore::new(), Path::new(path))
        );
    }

    Ok(())
}
