use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid path (outside sandbox): {0}")]
    Violation(String),

    #[error("identity is locked: {0}")]
    IdentityLocked(&'static str),

    #[error("file does not exist: {0}")]
    NotFound(String),

    #[error("path is not a file: {0}")]
    NotAFile(String),

    #[error("path is not a directory: {0}")]
    NotADirectory(String),

    #[error("directory is not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("cannot remove save directory root")]
    RootRemoval,

    #[error("cannot write to save directory root")]
    RootWrite,

    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}
