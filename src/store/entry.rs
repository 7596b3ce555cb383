/// Kind of a save-directory child as seen by `list`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Unknown,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
            EntryKind::Unknown => "unknown",
        }
    }
}

/// Immediate child of a save-directory folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// File name only (e.g., "slot1.dat")
    pub name: String,
    pub kind: EntryKind,
}
