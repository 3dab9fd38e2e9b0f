//! Active version pointers.
//!
//! A pointer records which stored version of a task is live. Readers
//! observe either the previous or the new target, never a partial one.

use std::fmt::Debug;
use std::fs;
use std::path::Path;

use loop_core::errors::{ErrorInfo, LoopError};
use parking_lot::Mutex;

/// Name of the symlink used by [`SymlinkPointer`].
pub const ACTIVE_LINK: &str = "active";
/// Name of the marker file used by [`MarkerFilePointer`].
pub const MARKER_FILE: &str = ".active_version";

/// Directory name of a stored version (`v3`).
pub fn version_dir_name(version: u32) -> String {
    format!("v{version}")
}

/// Parses a version directory name, rejecting anything but the exact
/// `v<N>` spelling [`version_dir_name`] produces (no leading zeros).
pub fn parse_version_dir(name: &str) -> Option<u32> {
    let digits = name.strip_prefix('v')?;
    if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Reads and atomically updates the active version of one task directory.
pub trait ActivePointer: Send + Sync + Debug {
    /// Short mechanism name for logs.
    fn kind(&self) -> &'static str;

    /// Version currently pointed at, if any.
    fn read(&self, task_dir: &Path) -> Result<Option<u32>, LoopError>;

    /// Points at `version`. The caller has checked that it exists.
    fn write(&self, task_dir: &Path, version: u32) -> Result<(), LoopError>;
}

/// Relative symlink `active -> v<N>`, replaced through a temporary link
/// and a rename so the swap is atomic.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkPointer;

#[cfg(unix)]
impl ActivePointer for SymlinkPointer {
    fn kind(&self) -> &'static str {
        "symlink"
    }

    fn read(&self, task_dir: &Path) -> Result<Option<u32>, LoopError> {
        let link = task_dir.join(ACTIVE_LINK);
        let target = match fs::read_link(&link) {
            Ok(target) => target,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(LoopError::storage("loop_store.pointer_read", err, &link)),
        };
        let version = target
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_version_dir);
        if version.is_none() {
            tracing::warn!(
                link = %link.display(),
                target = %target.display(),
                "active link does not name a version directory"
            );
        }
        Ok(version)
    }

    fn write(&self, task_dir: &Path, version: u32) -> Result<(), LoopError> {
        let link = task_dir.join(ACTIVE_LINK);
        let staging = task_dir.join(format!(".{ACTIVE_LINK}.{}", uuid::Uuid::new_v4().simple()));
        std::os::unix::fs::symlink(version_dir_name(version), &staging)
            .map_err(|err| LoopError::storage("loop_store.pointer_write", err, &staging))?;
        if let Err(err) = fs::rename(&staging, &link) {
            let _ = fs::remove_file(&staging);
            return Err(LoopError::storage("loop_store.pointer_write", err, &link));
        }
        Ok(())
    }
}

/// Marker file holding the version number as text.
///
/// Writers inside one process are serialized by a lock. Writers in
/// different processes can interleave, and a reader racing a writer may
/// see a truncated file, which reads as "no active version".
#[derive(Debug, Default)]
pub struct MarkerFilePointer {
    lock: Mutex<()>,
}

impl MarkerFilePointer {
    /// Creates a marker pointer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivePointer for MarkerFilePointer {
    fn kind(&self) -> &'static str {
        "marker"
    }

    fn read(&self, task_dir: &Path) -> Result<Option<u32>, LoopError> {
        let marker = task_dir.join(MARKER_FILE);
        let text = match fs::read_to_string(&marker) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(LoopError::storage("loop_store.pointer_read", err, &marker)),
        };
        match text.trim().parse::<u32>() {
            Ok(version) if version >= 1 => Ok(Some(version)),
            _ => {
                tracing::warn!(marker = %marker.display(), "unreadable active version marker");
                Ok(None)
            }
        }
    }

    fn write(&self, task_dir: &Path, version: u32) -> Result<(), LoopError> {
        let _guard = self.lock.lock();
        let marker = task_dir.join(MARKER_FILE);
        fs::write(&marker, version.to_string()).map_err(|err| {
            LoopError::Storage(
                ErrorInfo::new("loop_store.pointer_write", err.to_string())
                    .with_context("path", marker.display().to_string())
                    .with_context("version", version.to_string()),
            )
        })
    }
}

/// Symlink pointer where symlinks exist, marker file elsewhere.
pub fn default_pointer() -> Box<dyn ActivePointer> {
    #[cfg(unix)]
    {
        Box::new(SymlinkPointer)
    }
    #[cfg(not(unix))]
    {
        Box::new(MarkerFilePointer::new())
    }
}
