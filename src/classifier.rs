use crate::types::FileEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    Timestamp,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    New,
    Changed(ChangeReason),
    Unchanged,
}

/// Compares an observed file against its snapshot record, if any.
///
/// The timestamp is checked before the size, so a file whose date and size
/// both moved is reported as a timestamp change.
#[must_use]
pub fn classify(existing: Option<&FileEntry>, observed: &FileEntry) -> Classification {
    match existing {
        None => Classification::New,
        Some(entry) if entry.modified != observed.modified => {
            Classification::Changed(ChangeReason::Timestamp)
        }
        Some(entry) if entry.size != observed.size => Classification::Changed(ChangeReason::Size),
        Some(_) => Classification::Unchanged,
    }
}
