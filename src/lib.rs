// Public API exports
pub mod archive;
pub mod config;
pub mod host;
pub mod logging;
pub mod profiler;
pub mod security;
pub mod store;

// Re-export main types for convenience
pub use archive::{ArchiveEntry, ArchiveError, FusedArchive, find_container_start};
pub use config::{ConfigError, HostConfig};
pub use host::{HostError, HostPhase, ScriptHost};
pub use logging::LogLevel;
pub use profiler::{Profiler, ProfilerError, SectionTiming};
pub use security::PathSanitizer;
pub use store::{EntryKind, SaveStore, StoreEntry, StoreError};
