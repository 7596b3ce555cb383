use std::env;
use std::path::PathBuf;

/// Identity used when nothing usable remains after sanitizing
pub const DEFAULT_IDENTITY: &str = "unnamed";

/// Product folder under the platform data root
pub const DEFAULT_PRODUCT: &str = "Lime2D";

pub const MAX_IDENTITY_LEN: usize = 64;

/// Reduce an application name to a directory-safe identity.
///
/// ASCII letters, digits, `_` and `-` are kept. Spaces and dots become a
/// single `_`, everything else is dropped.
pub fn sanitize_identity(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            result.push(c);
        } else if (c == ' ' || c == '.') && !result.ends_with('_') {
            result.push('_');
        }
    }

    while result.ends_with('_') {
        result.pop();
    }

    if result.is_empty() {
        return DEFAULT_IDENTITY.to_string();
    }

    result.truncate(MAX_IDENTITY_LEN);
    result
}

/// Per-user data root for the current platform
pub fn platform_data_root() -> PathBuf {
    data_root_from(|name| env::var_os(name).filter(|value| !value.is_empty()).map(PathBuf::from))
}

pub(crate) fn data_root_from(lookup: impl Fn(&str) -> Option<PathBuf>) -> PathBuf {
    let found = if cfg!(windows) {
        lookup("APPDATA")
            .or_else(|| lookup("USERPROFILE").map(|home| home.join("AppData").join("Roaming")))
    } else {
        lookup("XDG_DATA_HOME").or_else(|| lookup("HOME").map(|home| home.join(".local").join("share")))
    };

    found
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
