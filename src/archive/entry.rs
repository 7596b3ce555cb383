/// Metadata for a single file in the archive arena
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Byte offset into the arena
    pub offset: usize,
    /// Decompressed length in bytes
    pub length: usize,
    /// Normalized name (e.g., "app/main.lua")
    pub name: String,
}
