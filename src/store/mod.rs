mod entry;
mod error;
mod identity;


pub use entry::{EntryKind, StoreEntry};
pub use error::StoreError;
pub use identity::{
    DEFAULT_IDENTITY, DEFAULT_PRODUCT, MAX_IDENTITY_LEN, platform_data_root, sanitize_identity,
};

use crate::security::PathSanitizer;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-application save area rooted at `<data_root>/<product>/<identity>`.
///
/// Directories are created lazily by write, append and mkdir; queries never
/// create anything. Every operation, rejected or not, counts as first use and
/// locks the identity.
#[derive(Debug)]
pub struct SaveStore {
    data_root: PathBuf,
    product: String,
    identity: String,
    identity_set: bool,
    accessed: bool,
}

impl SaveStore {
    /// Create a store with the default identity
    pub fn new(data_root: impl Into<PathBuf>, product: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
            product: product.into(),
            identity: DEFAULT_IDENTITY.to_string(),
            identity_set: false,
            accessed: false,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Resolved save directory (not created)
    pub fn save_dir(&self) -> PathBuf {
        self.data_root.join(&self.product).join(&self.identity)
    }

    /// Whether any sandbox operation has run since the last reset
    pub fn is_accessed(&self) -> bool {
        self.accessed
    }

    /// Forget identity locks and fall back to a derived identity.
    ///
    /// Called when a new main script is loaded.
    pub fn reset(&mut self, default_identity: &str) {
        self.identity = sanitize_identity(default_identity);
        self.identity_set = false;
        self.accessed = false;
    }

    /// Set the identity explicitly; allowed once and only before first use
    pub fn set_identity(&mut self, raw: &str) -> Result<(), StoreError> {
        if self.identity_set {
            return Err(StoreError::IdentityLocked("setIdentity can only be called once"));
        }
        if self.accessed {
            return Err(StoreError::IdentityLocked(
                "setIdentity must be called before any filesystem operations",
            ));
        }

        self.identity = sanitize_identity(raw);
        self.identity_set = true;
        debug!(identity = %self.identity, "save identity set");
        Ok(())
    }

    /// Read a whole file
    pub fn read(&mut self, path: &str) -> Result<Vec<u8>, StoreError> {
        let (relative, full) = self.locate(path)?;

        if !full.exists() {
            return Err(StoreError::NotFound(relative));
        }
        if !full.is_file() {
            return Err(StoreError::NotAFile(relative));
        }

        fs::read(&full).map_err(|source| io_error("read", &full, source))
    }

    /// Replace a file's contents, creating parent directories as needed
    pub fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        let full = self.locate_file_target(path)?;
        ensure_parent(&full)?;
        fs::write(&full, data).map_err(|source| io_error("write", &full, source))
    }

    /// Append to a file, creating it and its parent directories as needed
    pub fn append(&mut self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        let full = self.locate_file_target(path)?;
        ensure_parent(&full)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .map_err(|source| io_error("open for appending", &full, source))?;
        file.write_all(data)
            .map_err(|source| io_error("append to", &full, source))
    }

    pub fn exists(&mut self, path: &str) -> Result<bool, StoreError> {
        let (_, full) = self.locate(path)?;
        Ok(full.exists())
    }

    pub fn is_file(&mut self, path: &str) -> Result<bool, StoreError> {
        let (_, full) = self.locate(path)?;
        Ok(full.is_file())
    }

    pub fn is_directory(&mut self, path: &str) -> Result<bool, StoreError> {
        let (_, full) = self.locate(path)?;
        Ok(full.is_dir())
    }

    /// Remove a file or an empty directory. The root itself is never removed.
    pub fn remove(&mut self, path: &str) -> Result<(), StoreError> {
        let (relative, full) = self.locate(path)?;

        if relative.is_empty() {
            return Err(StoreError::RootRemoval);
        }
        if !full.exists() {
            return Err(StoreError::NotFound(relative));
        }

        if full.is_dir() {
            let mut children =
                fs::read_dir(&full).map_err(|source| io_error("inspect", &full, source))?;
            if children.next().is_some() {
                return Err(StoreError::DirectoryNotEmpty(relative));
            }
            fs::remove_dir(&full).map_err(|source| io_error("remove", &full, source))
        } else {
            fs::remove_file(&full).map_err(|source| io_error("remove", &full, source))
        }
    }

    /// Create a directory and any missing parents
    pub fn mkdir(&mut self, path: &str) -> Result<(), StoreError> {
        let (_, full) = self.locate(path)?;
        fs::create_dir_all(&full).map_err(|source| io_error("create directory", &full, source))
    }

    /// List the immediate children of a directory, sorted by name
    pub fn list(&mut self, path: &str) -> Result<Vec<StoreEntry>, StoreError> {
        let (relative, full) = self.locate(path)?;

        if !full.exists() {
            return Err(StoreError::NotFound(relative));
        }
        if !full.is_dir() {
            return Err(StoreError::NotADirectory(relative));
        }

        let reader = fs::read_dir(&full).map_err(|source| io_error("list", &full, source))?;
        let mut entries = Vec::new();

        for item in reader {
            let item = item.map_err(|source| io_error("list", &full, source))?;
            let child = item.path();
            let kind = if child.is_file() {
                EntryKind::File
            } else if child.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::Unknown
            };
            entries.push(StoreEntry {
                name: item.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Mark first use and map a script path into the save directory
    fn locate(&mut self, path: &str) -> Result<(String, PathBuf), StoreError> {
        self.accessed = true;
        PathSanitizer::resolve(&self.save_dir(), path)
    }

    /// Like `locate`, for operations that produce a file. The root and
    /// existing directories are never valid targets.
    fn locate_file_target(&mut self, path: &str) -> Result<PathBuf, StoreError> {
        let (relative, full) = self.locate(path)?;

        if relative.is_empty() {
            return Err(StoreError::RootWrite);
        }
        if full.is_dir() {
            return Err(StoreError::NotAFile(relative));
        }
        Ok(full)
    }
}

fn ensure_parent(full: &Path) -> Result<(), StoreError> {
    match full.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|source| io_error("create directory", parent, source)),
        _ => Ok(()),
    }
}

fn io_error(action: &'static str, path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        action,
        path: path.display().to_string(),
        source,
    }
}
