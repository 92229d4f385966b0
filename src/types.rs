use chrono::{DateTime, FixedOffset};

/// A file as recorded in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<FixedOffset>,
    /// Set while the current walk has seen this file. Not persisted.
    pub found: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Link,
}

/// One row of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: DateTime<FixedOffset>,
}

impl RemoteEntry {
    /// `.` and `..` as returned by some servers.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    #[must_use]
    pub fn to_file_entry(&self) -> FileEntry {
        FileEntry {
            name: self.name.clone(),
            size: self.size,
            modified: self.modified,
            found: true,
        }
    }
}
