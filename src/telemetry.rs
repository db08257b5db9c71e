//! Optional JSONL event log.
//!
//! Every line is one [`TelemetryEvent`] stamped with the run, command and
//! profile. Events raised inside a chat session also carry the session
//! file and whether it was resumed, fresh or anonymous.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::RuntimeConfig;
use crate::lifecycle::SessionHandle;

pub fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum TelemetryEvent {
    #[serde(rename = "command.started")]
    CommandStarted,
    #[serde(rename = "command.completed")]
    CommandCompleted { duration_ms: u64 },
    #[serde(rename = "command.failed")]
    CommandFailed {
        duration_ms: u64,
        category: &'static str,
        error: String,
    },
    #[serde(rename = "turn.completed")]
    TurnCompleted { model: String, messages: usize },
    #[serde(rename = "turn.failed")]
    TurnFailed { error: String },
    #[serde(rename = "session.persisted")]
    SessionPersisted { messages: usize },
    #[serde(rename = "session.persist_failed")]
    SessionPersistFailed { error: String },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::CommandStarted => "command.started",
            TelemetryEvent::CommandCompleted { .. } => "command.completed",
            TelemetryEvent::CommandFailed { .. } => "command.failed",
            TelemetryEvent::TurnCompleted { .. } => "turn.completed",
            TelemetryEvent::TurnFailed { .. } => "turn.failed",
            TelemetryEvent::SessionPersisted { .. } => "session.persisted",
            TelemetryEvent::SessionPersistFailed { .. } => "session.persist_failed",
        }
    }
}

#[derive(Serialize)]
struct EventRecord<'a> {
    ts_unix_ms: u64,
    run_id: &'a str,
    command: &'a str,
    profile: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_origin: Option<&'static str>,
    #[serde(flatten)]
    event: &'a TelemetryEvent,
}

#[derive(Debug, Clone)]
pub struct TelemetrySink {
    path: Option<PathBuf>,
    run_id: String,
    command: String,
    profile: String,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig, command: String) -> Self {
        Self {
            path: cfg
                .telemetry_enabled
                .then(|| PathBuf::from(&cfg.telemetry_path)),
            run_id: format!("run-{}-{}", unix_ms_now(), std::process::id()),
            command,
            profile: cfg.profile.clone(),
        }
    }

    pub fn disabled(command: impl Into<String>) -> Self {
        Self {
            path: None,
            run_id: String::new(),
            command: command.into(),
            profile: String::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn emit(&self, event: TelemetryEvent) {
        self.record(None, &event);
    }

    /// Like [`emit`](Self::emit), tagging the record with the session it belongs to.
    pub fn emit_for_session(&self, handle: &SessionHandle, event: TelemetryEvent) {
        self.record(Some(handle), &event);
    }

    fn record(&self, handle: Option<&SessionHandle>, event: &TelemetryEvent) {
        let Some(path) = self.path.as_deref() else {
            return;
        };

        let record = EventRecord {
            ts_unix_ms: unix_ms_now(),
            run_id: &self.run_id,
            command: &self.command,
            profile: &self.profile,
            session_file: handle
                .and_then(SessionHandle::path)
                .map(|session| session.display().to_string()),
            session_origin: handle.map(|handle| handle.origin().label()),
            event,
        };
        if let Err(err) = append_line(path, &record) {
            tracing::warn!(
                event = event.name(),
                path = %path.display(),
                error = %err,
                "telemetry write failed"
            );
        }
    }
}

fn append_line(path: &Path, record: &EventRecord<'_>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create telemetry directory '{}'", parent.display()))?;
    }

    let mut line = serde_json::to_string(record).context("failed to encode telemetry event")?;
    line.push('\n');
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.as_bytes()))
        .with_context(|| format!("failed to append to telemetry file '{}'", path.display()))
}
