use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::session::Session;

pub const DEFAULT_SESSION_KEY: &str = "stockroom.session";

/// Durable home of the current session. Only the store touches persisted session data.
pub trait SessionStore: Send + Sync {
    /// Commit the whole record or leave the previous one in place.
    fn save(&self, session: &Session) -> Result<()>;
    /// Absent when nothing is stored or the stored payload is unusable.
    fn load(&self) -> Option<Session>;
    /// Remove the record. Clearing an empty store is a no-op.
    fn clear(&self) -> Result<()>;
}

fn parse_record(raw: &str, origin: &str) -> Option<Session> {
    match serde_json::from_str::<Session>(raw) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(target: "stockroom::session", "ignoring malformed session record in {}: {}", origin, e);
            None
        }
    }
}

// The record carries a credential, so it is readable by the owner only.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    // mode applies only on create
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut f = opts.open(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    key: String,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self { dir: dir.into(), key: key.into() }
    }

    pub fn record_path(&self) -> PathBuf { self.dir.join(format!("{}.json", self.key)) }

    fn tmp_path(&self) -> PathBuf { self.record_path().with_extension("json.tmp") }

    pub fn dir(&self) -> &Path { &self.dir }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create session dir '{}'", self.dir.display()))?;
        let bytes = serde_json::to_vec_pretty(session)?;
        let tmp = self.tmp_path();
        // write-then-rename so readers never observe a half-written record
        if let Err(e) = write_private(&tmp, &bytes).and_then(|_| std::fs::rename(&tmp, self.record_path())) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("failed to persist session to '{}'", self.record_path().display()));
        }
        debug!(target: "stockroom::session", "session saved user={} role={}", session.email(), session.role());
        Ok(())
    }

    fn load(&self) -> Option<Session> {
        let path = self.record_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(target: "stockroom::session", "cannot read session record '{}': {}", path.display(), e);
                return None;
            }
        };
        parse_record(&raw, &path.display().to_string())
    }

    fn clear(&self) -> Result<()> {
        let path = self.record_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(target: "stockroom::session", "session cleared at '{}'", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove session record '{}'", path.display())),
        }
    }
}

/// In-process store holding the serialized record, so it behaves like the file store
/// (including for corrupted payloads) without touching disk.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    raw: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self { Self::default() }

    /// Seed the store with an arbitrary payload, valid or not.
    pub fn from_raw(raw: impl Into<String>) -> Self { Self { raw: Mutex::new(Some(raw.into())) } }

    pub fn raw(&self) -> Option<String> { self.raw.lock().clone() }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        let s = serde_json::to_string(session)?;
        *self.raw.lock() = Some(s);
        Ok(())
    }

    fn load(&self) -> Option<Session> {
        let raw = self.raw.lock().clone()?;
        parse_record(&raw, "memory")
    }

    fn clear(&self) -> Result<()> {
        self.raw.lock().take();
        Ok(())
    }
}
