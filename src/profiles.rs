use anyhow::Result;

use crate::cli::GenerationArgs;
use crate::config::{ProfilesFile, RuntimeConfig, display_api_key};
use crate::theme::format_max_tokens;

pub fn profile_names(profiles: &ProfilesFile) -> Vec<String> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();
    names
}

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    println!("Configured profiles (active='{}'):", cfg.profile);
    for name in profile_names(profiles) {
        let marker = if name == cfg.profile { "*" } else { " " };
        let source = if profiles.profiles.contains_key(&name) {
            "configured"
        } else {
            "implicit"
        };
        println!("{marker} {name} ({source})");
    }

    Ok(())
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    let params = cfg.generation_params(&GenerationArgs::default());
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path_label());
    println!("API key: {}", display_api_key(cfg));
    println!("Base URL: {}", cfg.base_url);
    println!("Model: {}", params.model);
    println!("Role: {}", params.role);
    println!("Temperature: {}", params.temperature);
    println!("Max tokens: {}", format_max_tokens(params.max_tokens));
    println!("Top-p: {}", params.top_p);
    println!(
        "Session file: {}",
        cfg.session_file.as_deref().unwrap_or("<none>")
    );
    println!("Skip write session: {}", cfg.skip_write_session);
    println!(
        "System message: {}",
        cfg.system_message.as_deref().unwrap_or("<none>")
    );
    println!("End-of-message marker: {}", cfg.eom);
    println!("End-of-session marker: {}", cfg.eos);
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    Ok(())
}
