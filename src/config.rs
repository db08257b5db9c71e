use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::{Cli, GenerationArgs, SessionArgs};
use crate::error::{ConfigError, mask_secret};
use crate::input::{DEFAULT_EOM_MARKER, DEFAULT_EOS_MARKER, Markers};
use crate::openai::DEFAULT_BASE_URL;
use crate::params::{self, GenerationOverrides, GenerationParams};

pub const CONFIG_FILE_NAME: &str = ".chatgpt-cli.toml";
pub const DEFAULT_TELEMETRY_PATH: &str = ".chatgpt-cli/telemetry/events.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeySource {
    Flag,
    Profile,
    OpenAiEnv,
    Missing,
}

impl ApiKeySource {
    pub fn label(self) -> &'static str {
        match self {
            ApiKeySource::Flag => "--api-key/CHATGPT_API_KEY",
            ApiKeySource::Profile => "profile",
            ApiKeySource::OpenAiEnv => "OPENAI_API_KEY",
            ApiKeySource::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub api_key_source: ApiKeySource,
    pub base_url: String,
    pub profile_generation: GenerationOverrides,
    pub session_file: Option<String>,
    pub skip_write_session: bool,
    pub system_message: Option<String>,
    pub eom: String,
    pub eos: String,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
}

/// Session-related settings for one chat-style command after layering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub session_file: String,
    pub skip_write_session: bool,
    pub system_message: Option<String>,
    pub markers: Markers,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub role: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub session_file: Option<String>,
    pub skip_write_session: Option<bool>,
    pub system_message: Option<String>,
    pub eom: Option<String>,
    pub eos: Option<String>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

impl ProfileConfig {
    fn generation(&self) -> GenerationOverrides {
        GenerationOverrides {
            model: self.model.clone(),
            role: self.role.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        }
    }
}

/// Candidate config files, first existing one wins.
pub fn config_search_paths(home: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = home {
        paths.push(home.join(CONFIG_FILE_NAME));
    }
    paths
}

/// An explicit `--config` is used as given; otherwise the working directory
/// is searched before `$HOME`.
pub fn discover_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = non_blank(explicit) {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME").map(PathBuf::from);
    config_search_paths(home.as_deref())
        .into_iter()
        .find(|path| path.is_file())
}

pub fn load_profiles(config_path: Option<&Path>) -> Result<ProfilesFile> {
    let Some(path) = config_path else {
        return Ok(ProfilesFile::default());
    };
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check value types and field names.",
            path.display()
        )
    })
}

pub fn resolve_runtime_config(
    cli: &Cli,
    profiles: &ProfilesFile,
    config_path: Option<PathBuf>,
) -> Result<RuntimeConfig> {
    let openai_env_key = std::env::var("OPENAI_API_KEY").ok();
    resolve_runtime_config_with_env(cli, profiles, config_path, openai_env_key)
}

pub fn resolve_runtime_config_with_env(
    cli: &Cli,
    profiles: &ProfilesFile,
    config_path: Option<PathBuf>,
    openai_env_key: Option<String>,
) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let config_label = config_path
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| CONFIG_FILE_NAME.to_string());
    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    config_label
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    config_label,
                    names.join(", ")
                )
            }
        })?
    };

    let (api_key, api_key_source) = if let Some(key) = non_blank(cli.api_key.as_deref()) {
        (Some(key.to_string()), ApiKeySource::Flag)
    } else if let Some(key) = non_blank(profile.api_key.as_deref()) {
        (Some(key.to_string()), ApiKeySource::Profile)
    } else if let Some(key) = non_blank(openai_env_key.as_deref()) {
        (Some(key.to_string()), ApiKeySource::OpenAiEnv)
    } else {
        (None, ApiKeySource::Missing)
    };

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path,
        api_key,
        api_key_source,
        base_url: non_blank(cli.base_url.as_deref())
            .or(non_blank(profile.base_url.as_deref()))
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string(),
        profile_generation: profile.generation(),
        session_file: profile.session_file.clone(),
        skip_write_session: profile.skip_write_session.unwrap_or(false),
        system_message: profile.system_message.clone(),
        eom: profile
            .eom
            .clone()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_EOM_MARKER.to_string()),
        eos: profile
            .eos
            .clone()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_EOS_MARKER.to_string()),
        telemetry_enabled: profile.telemetry_enabled.unwrap_or(false),
        telemetry_path: profile
            .telemetry_path
            .clone()
            .unwrap_or_else(|| DEFAULT_TELEMETRY_PATH.to_string()),
    })
}

impl RuntimeConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    /// Profile values underneath flag and environment values.
    pub fn generation_params(&self, args: &GenerationArgs) -> GenerationParams {
        params::resolve(&[&self.profile_generation, &args.overrides()])
    }

    pub fn session_settings(&self, args: &SessionArgs) -> SessionSettings {
        let session_file = args
            .session_file
            .clone()
            .or_else(|| self.session_file.clone())
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        SessionSettings {
            session_file,
            skip_write_session: args.skip_write_session || self.skip_write_session,
            system_message: args
                .system_message
                .clone()
                .or_else(|| self.system_message.clone())
                .filter(|value| !value.trim().is_empty()),
            markers: Markers {
                end_of_message: args
                    .eom
                    .clone()
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| self.eom.clone()),
                end_of_session: args
                    .eos
                    .clone()
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| self.eos.clone()),
            },
        }
    }

    pub fn config_path_label(&self) -> String {
        self.config_path
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    }
}

pub fn display_api_key(cfg: &RuntimeConfig) -> String {
    match cfg.api_key.as_deref() {
        Some(key) => format!("{} (source={})", mask_secret(key), cfg.api_key_source.label()),
        None => "<not set>".to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
