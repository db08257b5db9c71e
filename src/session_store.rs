use std::io::Write as _;
use std::path::Path;

use crate::conversation::ConversationState;
use crate::error::SessionError;

/// Durable storage for a single conversation document.
pub trait SessionStore {
    /// Probe used to pick resume vs fresh without deserializing. A probe
    /// that cannot be answered (permissions on a parent directory, for
    /// example) is an error rather than "absent".
    fn exists(&self, path: &Path) -> Result<bool, SessionError>;

    /// Loads a conversation. A malformed document is an error, never
    /// coerced into defaults.
    fn load(&self, path: &Path) -> Result<ConversationState, SessionError>;

    /// Replaces the document at `path` with `state`.
    fn save(&self, path: &Path, state: &ConversationState) -> Result<(), SessionError>;
}

/// JSON files on the local filesystem, written pretty-printed and whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSessionStore;

impl FileSessionStore {
    pub fn new() -> Self {
        Self
    }
}

impl SessionStore for FileSessionStore {
    fn exists(&self, path: &Path) -> Result<bool, SessionError> {
        path.try_exists().map_err(|source| SessionError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn load(&self, path: &Path) -> Result<ConversationState, SessionError> {
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SessionError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SessionError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let state = serde_json::from_slice::<ConversationState>(&bytes).map_err(|source| {
            SessionError::Malformed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::debug!(
            path = %path.display(),
            messages = state.messages.len(),
            "loaded session file"
        );
        Ok(state)
    }

    fn save(&self, path: &Path, state: &ConversationState) -> Result<(), SessionError> {
        let mut payload =
            serde_json::to_vec_pretty(state).map_err(|source| SessionError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        payload.push(b'\n');

        write_private_file(path, &payload).map_err(|source| SessionError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            path = %path.display(),
            messages = state.messages.len(),
            bytes = payload.len(),
            "wrote session file"
        );
        Ok(())
    }
}

/// Truncates and rewrites `path`; new files are created owner-only on Unix.
fn write_private_file(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(payload)?;
    file.flush()
}
