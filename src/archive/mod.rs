mod entry;
mod error;

#[cfg(test)]
mod tests;

pub use entry::ArchiveEntry;
pub use error::ArchiveError;

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::debug;

/// End of central directory signature ("PK\x05\x06")
pub const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// Fixed size of the end of central directory record
pub const EOCD_LEN: usize = 22;

/// Largest trailing comment the record can announce
pub const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// ZIP container fused onto the end of an executable, held in memory.
///
/// All entries are decompressed into one contiguous arena at load time and
/// never change afterwards.
#[derive(Debug, Default)]
pub struct FusedArchive {
    /// Single contiguous blob containing all file data
    arena: Vec<u8>,
    /// Index mapping normalized names to arena slices
    index: HashMap<String, ArchiveEntry>,
}

impl FusedArchive {
    /// Create an empty archive table
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the executable at `path` and read the container appended to it
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let mut archive = Self::new();
        archive.load(path)?;
        Ok(archive)
    }

    /// Read the container appended to an in-memory image
    pub fn from_image(image: &[u8]) -> Result<Self, ArchiveError> {
        let mut archive = Self::new();
        archive.load_image(image)?;
        Ok(archive)
    }

    /// Clear the table and rebuild it from the executable at `path`
    pub fn load(&mut self, path: &Path) -> Result<(), ArchiveError> {
        self.clear();

        let image = fs::read(path).map_err(|source| ArchiveError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;

        self.load_image(&image)
    }

    /// Clear the table and rebuild it from an in-memory image.
    ///
    /// On failure the table is left empty.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), ArchiveError> {
        self.clear();

        let start = find_container_start(image)?;
        if start >= image.len() {
            return Err(ArchiveError::BadOffset);
        }
        debug!(offset = start, size = image.len() - start, "found fused container");

        // Parse only the container slice
        let cursor = Cursor::new(&image[start..]);
        let mut zip = zip::ZipArchive::new(cursor)
            .map_err(|e| ArchiveError::ZipParseFailed(e.to_string()))?;

        let mut arena = Vec::new();
        let mut index = HashMap::new();

        // Extract all files into the arena; unreadable entries are skipped
        for i in 0..zip.len() {
            let mut file = match zip.by_index(i) {
                Ok(file) => file,
                Err(e) => {
                    debug!(index = i, error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            // Skip directories
            if file.is_dir() {
                continue;
            }

            let name = normalize_entry_name(file.name());
            if name.is_empty() {
                continue;
            }

            let mut contents = Vec::new();
            if let Err(e) = file.read_to_end(&mut contents) {
                debug!(name = %name, error = %e, "skipping corrupt entry");
                continue;
            }

            let offset = arena.len();
            arena.extend_from_slice(&contents);
            index.insert(
                name.clone(),
                ArchiveEntry {
                    offset,
                    length: contents.len(),
                    name,
                },
            );
        }

        if index.is_empty() {
            return Err(ArchiveError::Empty);
        }

        self.arena = arena;
        self.index = index;
        Ok(())
    }

    /// Get a file's contents as a byte slice (zero-copy)
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.index
            .get(&normalize_entry_name(name))
            .map(|entry| &self.arena[entry.offset..entry.offset + entry.length])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&normalize_entry_name(name))
    }

    /// All file names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.index.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get metadata for a file without reading contents
    pub fn get_entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.index.get(&normalize_entry_name(name))
    }

    /// Get the total number of files
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Get the total arena size in bytes
    pub fn total_size(&self) -> usize {
        self.arena.len()
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.index.clear();
    }
}

/// Locate where an appended container begins inside `data`.
///
/// Scans backwards for the end of central directory record within the
/// largest window a trailing comment allows. A candidate only counts when its
/// comment length ends exactly at the end of `data`, which rules out stray
/// signature bytes inside compressed payloads. The container start follows
/// from where the central directory really sits versus where the record says
/// it sits relative to the container's own byte 0.
pub fn find_container_start(data: &[u8]) -> Result<usize, ArchiveError> {
    if data.len() < EOCD_LEN {
        return Err(ArchiveError::NoDirectory);
    }

    let floor = data.len().saturating_sub(EOCD_LEN + MAX_COMMENT_LEN);
    let mut pos = data.len() - EOCD_LEN;

    loop {
        if data[pos..pos + 4] == EOCD_SIGNATURE {
            let comment_len = read_u16(data, pos + 20) as usize;
            if pos + EOCD_LEN + comment_len == data.len() {
                let cd_size = read_u32(data, pos + 12) as usize;
                let cd_offset = read_u32(data, pos + 16) as usize;

                let cd_actual = pos.checked_sub(cd_size).ok_or(ArchiveError::BadOffset)?;
                return cd_actual
                    .checked_sub(cd_offset)
                    .ok_or(ArchiveError::BadOffset);
            }
        }

        if pos == floor {
            break;
        }
        pos -= 1;
    }

    Err(ArchiveError::NoDirectory)
}

/// Forward slashes, no leading "./"
pub fn normalize_entry_name(name: &str) -> String {
    let mut normalized = name.replace('\\', "/");
    while normalized.starts_with("./") {
        normalized.drain(..2);
    }
    normalized
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
