use crate::store::StoreError;
use std::path::{Component, Path, PathBuf};

pub struct PathSanitizer;

impl PathSanitizer {
    /// Sanitize a script-supplied save path to prevent:
    /// - Directory traversal (../), anywhere in the path
    /// - Absolute paths (/etc/passwd, \\server\share)
    /// - Drive-letter paths (C:\Windows)
    ///
    /// The empty string names the save directory root itself.
    /// Returns the normalized relative path joined with forward slashes.
    pub fn sanitize(raw_path: &str) -> Result<String, StoreError> {
        if raw_path.is_empty() {
            return Ok(String::new());
        }

        // Reject absolute and separator-leading paths
        if raw_path.starts_with('/') || raw_path.starts_with('\\') || Path::new(raw_path).is_absolute()
        {
            return Err(StoreError::Violation(format!(
                "Absolute path not allowed: {}",
                raw_path
            )));
        }

        // Reject drive-letter prefixes even on hosts where they are not absolute
        if raw_path.as_bytes().get(1) == Some(&b':') {
            return Err(StoreError::Violation(format!(
                "Drive-letter path not allowed: {}",
                raw_path
            )));
        }

        let mut components = Vec::new();

        for part in raw_path.split(['/', '\\']) {
            match part {
                // Skip empty segments and current directory markers
                "" | "." => continue,
                // Reject parent directory traversal
                ".." => {
                    return Err(StoreError::Violation(format!(
                        "Parent directory traversal not allowed: {}",
                        raw_path
                    )));
                }
                _ => components.push(part),
            }
        }

        Ok(components.join("/"))
    }

    /// Check a path without resolving it
    pub fn is_safe(raw_path: &str) -> bool {
        Self::sanitize(raw_path).is_ok()
    }

    /// Resolve a sanitized path under `root`
    pub fn resolve(root: &Path, raw_path: &str) -> Result<(String, PathBuf), StoreError> {
        let relative = Self::sanitize(raw_path)?;
        let mut full = root.to_path_buf();
        for part in relative.split('/').filter(|part| !part.is_empty()) {
            full.push(part);
        }
        Ok((relative, full))
    }
}

/// Lexically normalize a forward-slash path.
///
/// Backslashes count as separators, `.` and empty segments are dropped and
/// `name/..` pairs fold away. Leading `..` segments that cannot fold are kept.
pub fn lexical_normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut out: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ => out.push(".."),
            },
            _ => out.push(part),
        }
    }

    out.join("/")
}

/// Lexically normalize a native path, keeping any root or prefix
pub fn normalize_native(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    let mut rooted = false;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                out.push(component.as_os_str());
                rooted = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !rooted {
                    out.push("..");
                }
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
        }
    }

    out
}
