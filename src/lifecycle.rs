//! Session lifecycle: resume-or-create at startup, persist-or-skip after
//! each successful turn.
//!
//! A [`SessionHandle`] is resolved once per invocation and passed down; the
//! existence probe it records is what [`SessionLifecycle::acquire`] acts on,
//! so the resume decision cannot change mid-flow.

use std::path::{Path, PathBuf};

use crate::conversation::{ConversationState, Message};
use crate::error::SessionError;
use crate::params::GenerationParams;
use crate::session_store::SessionStore;

/// Persistence is allowed only for an explicit path without the skip flag.
pub fn should_persist(session_path: &str, skip_persist: bool) -> bool {
    !session_path.is_empty() && !skip_persist
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    path: Option<PathBuf>,
    exists: bool,
    persist: bool,
}

impl SessionHandle {
    /// In-memory only; never written regardless of later flags.
    pub fn anonymous() -> Self {
        Self {
            path: None,
            exists: false,
            persist: false,
        }
    }

    /// Probes the store once. A path whose existence cannot be determined
    /// fails here instead of silently starting a fresh session.
    pub fn resolve(
        session_path: &str,
        skip_persist: bool,
        store: &dyn SessionStore,
    ) -> Result<Self, SessionError> {
        if session_path.is_empty() {
            return Ok(Self::anonymous());
        }
        let path = PathBuf::from(session_path);
        let exists = store.exists(&path)?;
        Ok(Self {
            path: Some(path),
            exists,
            persist: should_persist(session_path, skip_persist),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn persist(&self) -> bool {
        self.persist
    }

    pub fn origin(&self) -> SessionOrigin {
        match (&self.path, self.exists) {
            (None, _) => SessionOrigin::Anonymous,
            (Some(_), true) => SessionOrigin::Resumed,
            (Some(_), false) => SessionOrigin::Fresh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    Anonymous,
    Resumed,
    Fresh,
}

impl SessionOrigin {
    pub fn label(self) -> &'static str {
        match self {
            SessionOrigin::Anonymous => "anonymous",
            SessionOrigin::Resumed => "resumed",
            SessionOrigin::Fresh => "fresh",
        }
    }
}

/// What happened to the durable copy after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    Skipped,
}

pub struct SessionLifecycle<'a> {
    store: &'a dyn SessionStore,
    handle: SessionHandle,
}

impl<'a> SessionLifecycle<'a> {
    pub fn new(store: &'a dyn SessionStore, handle: SessionHandle) -> Self {
        Self { store, handle }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Produces the conversation for the first turn of this invocation.
    ///
    /// On resume the stored transcript is kept verbatim and model,
    /// temperature, max tokens and top-p are replaced by `params`. A
    /// malformed file fails here; it is never swapped for a fresh session.
    /// `system_message` is prepended only when the conversation is new.
    pub fn acquire(
        &self,
        params: &GenerationParams,
        system_message: Option<&str>,
    ) -> Result<ConversationState, SessionError> {
        let origin = self.handle.origin();
        let state = match (origin, self.handle.path()) {
            (SessionOrigin::Resumed, Some(path)) => {
                let mut state = self.store.load(path)?;
                state.apply_params(params);
                tracing::info!(
                    path = %path.display(),
                    messages = state.messages.len(),
                    model = %state.model,
                    "resuming session"
                );
                state
            }
            _ => {
                let mut state = ConversationState::fresh(params);
                if let Some(system) = system_message.filter(|text| !text.is_empty()) {
                    state.push(Message::system(system));
                }
                tracing::info!(origin = ?origin, model = %state.model, "starting new session");
                state
            }
        };
        Ok(state)
    }

    pub fn should_persist(&self) -> bool {
        self.handle.persist && self.handle.path.is_some()
    }

    /// Rewrites the whole session file when persistence is enabled. Call
    /// only after a turn whose reply was appended.
    pub fn persist(&self, state: &ConversationState) -> Result<PersistOutcome, SessionError> {
        let Some(path) = self.handle.path().filter(|_| self.should_persist()) else {
            tracing::debug!("session persistence skipped");
            return Ok(PersistOutcome::Skipped);
        };
        self.store.save(path, state)?;
        Ok(PersistOutcome::Written)
    }
}
