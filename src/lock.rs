// ABOUTME: Run lock preventing two pipeline runs for the same app at once.
// ABOUTME: Uses atomic file creation with lock info stored in ~/.local/state/stagehand/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::AppName;

/// State directory below `$HOME` when `$XDG_STATE_HOME` is unset.
const STATE_DIR: &str = ".local/state";
const APP_DIR: &str = "stagehand";

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another run holds the lock: {holder} (pid {pid}) since {started_at}")]
    Held {
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("cannot locate a state directory: neither XDG_STATE_HOME nor HOME is set")]
    NoStateDir,

    #[error("lock file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("lock acquired by another process while breaking {0}")]
    Raced(PathBuf),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockErrorKind {
    Held,
    NoStateDir,
    Io,
    Raced,
}

impl LockError {
    pub fn kind(&self) -> LockErrorKind {
        match self {
            LockError::Held { .. } => LockErrorKind::Held,
            LockError::NoStateDir => LockErrorKind::NoStateDir,
            LockError::Io { .. } => LockErrorKind::Io,
            LockError::Raced(_) => LockErrorKind::Raced,
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        LockError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Information about who holds a run lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    pub app: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(app: &AppName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            app: app.to_string(),
        }
    }

    /// A lock older than `max_age` belongs to a run that can no longer be
    /// in progress.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        let age = Utc::now() - self.started_at;
        age.to_std().is_ok_and(|age| age >= max_age)
    }
}

/// Directory holding lock files: `$XDG_STATE_HOME/stagehand` or
/// `$HOME/.local/state/stagehand`.
pub fn default_lock_dir() -> Result<PathBuf, LockError> {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(state).join(APP_DIR));
    }
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| PathBuf::from(home).join(STATE_DIR).join(APP_DIR))
        .ok_or(LockError::NoStateDir)
}

/// A held run lock that releases on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    broken: Option<LockInfo>,
    released: bool,
}

impl RunLock {
    /// Acquire the run lock for `app` in `dir`.
    ///
    /// Creation is atomic (`create_new`), so two runs cannot both succeed.
    /// Returns `LockError::Held` if a live run holds the lock. Locks older
    /// than `max_age`, unreadable locks, and any lock when `force` is set are
    /// broken with a warning.
    pub fn acquire(dir: &Path, app: &AppName, max_age: Duration, force: bool) -> Result<Self, LockError> {
        fs::create_dir_all(dir).map_err(|e| LockError::io(dir, e))?;
        let path = dir.join(format!("{app}.lock"));
        let info = LockInfo::new(app);

        match Self::try_create(&path, &info) {
            Ok(()) => return Ok(Self::held(path, None)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(LockError::io(&path, e)),
        }

        let existing = Self::read(&path);
        let broken = match existing {
            Some(existing) if force => {
                tracing::warn!(
                    "Breaking lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                Some(existing)
            }
            Some(existing) if existing.is_stale(max_age) => {
                tracing::warn!(
                    "Auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                Some(existing)
            }
            Some(existing) => {
                return Err(LockError::Held {
                    holder: existing.holder,
                    pid: existing.pid,
                    started_at: existing.started_at,
                });
            }
            None => {
                tracing::warn!("Lock info at {} corrupted, breaking lock", path.display());
                None
            }
        };

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(LockError::io(&path, e)),
        }

        match Self::try_create(&path, &info) {
            Ok(()) => Ok(Self::held(path, broken)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(LockError::Raced(path)),
            Err(e) => Err(LockError::io(&path, e)),
        }
    }

    fn held(path: PathBuf, broken: Option<LockInfo>) -> Self {
        tracing::debug!("Acquired run lock {}", path.display());
        Self {
            path,
            broken,
            released: false,
        }
    }

    fn try_create(path: &Path, info: &LockInfo) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let json = serde_json::to_string(info).map_err(io::Error::other)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()
    }

    fn read(path: &Path) -> Option<LockInfo> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The lock that was broken to acquire this one, if any.
    pub fn broken(&self) -> Option<&LockInfo> {
        self.broken.as_ref()
    }

    /// Release the lock, reporting a failure to remove the file.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io(&self.path, e)),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = fs::remove_file(&self.path)
        {
            tracing::debug!("Failed to remove lock {} on drop: {}", self.path.display(), e);
        }
    }
}
