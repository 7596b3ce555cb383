use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to read executable image {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No end of central directory record in the trailing window")]
    NoDirectory,

    #[error("Central directory offsets point outside the image")]
    BadOffset,

    #[error("Failed to parse ZIP archive: {0}")]
    ZipParseFailed(String),

    #[error("Archive contains no files")]
    Empty,
}
