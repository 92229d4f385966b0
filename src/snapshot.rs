use crate::classifier::{Classification, classify};
use crate::error::DecodeError;
use crate::types::FileEntry;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use log::warn;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

// ?{<path>?}<name>?|<size>?|<timestamp>
static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\?\{(.*)\?\}(.*)\?\|(\d+)\?\|(.*)$").expect("snapshot line pattern is valid")
});

// Written by older releases, e.g. "2017-03-17 14:39:39 +0000 UTC"
const LEGACY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z UTC";

/// Every file seen so far, keyed by its full remote path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: HashMap<String, FileEntry>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: FileEntry) {
        self.files.insert(path.into(), entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileEntry)> {
        self.files.iter()
    }

    /// Clears every `found` flag ahead of a walk.
    pub fn unmark_all(&mut self) {
        for entry in self.files.values_mut() {
            entry.found = false;
        }
    }

    /// Records a file seen by the walker and returns how it compares to the
    /// previous record.
    ///
    /// New and changed files replace the record wholesale. Unchanged files
    /// only get marked found, keeping the stored values as first written.
    pub fn observe(&mut self, path: &str, observed: FileEntry) -> Classification {
        let classification = classify(self.get(path), &observed);
        match classification {
            Classification::Unchanged => {
                if let Some(entry) = self.files.get_mut(path) {
                    entry.found = true;
                }
            }
            Classification::New | Classification::Changed(_) => {
                self.files.insert(
                    path.to_string(),
                    FileEntry {
                        found: true,
                        ..observed
                    },
                );
            }
        }
        classification
    }

    /// Drops every entry the last walk did not see and resets the flag on the
    /// rest. Returns the dropped paths in sorted order.
    ///
    /// Only call this after a walk that covered the whole tree.
    pub fn sweep(&mut self) -> Vec<String> {
        let mut deleted = Vec::new();
        self.files.retain(|path, entry| {
            if entry.found {
                entry.found = false;
                true
            } else {
                deleted.push(path.clone());
                false
            }
        });
        deleted.sort();
        deleted
    }

    /// Renders the snapshot as sorted, newline-terminated lines.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut lines: Vec<String> = self
            .files
            .iter()
            .map(|(path, entry)| encode_line(path, entry))
            .collect();
        lines.sort();

        let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Parses persisted text line by line. Lines that do not decode,
    /// including ones that are not valid UTF-8, are logged and skipped.
    #[must_use]
    pub fn decode(data: impl AsRef<[u8]>) -> Self {
        let mut snapshot = Self::new();
        for (index, raw) in data.as_ref().split(|&b| b == b'\n').enumerate() {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = match std::str::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!(
                        "Skipping snapshot line {}: {} ({})",
                        index + 1,
                        DecodeError::from(e),
                        String::from_utf8_lossy(raw)
                    );
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(line) {
                Ok((path, entry)) => snapshot.insert(path, entry),
                Err(e) => warn!("Skipping snapshot line {}: {e} ({line})", index + 1),
            }
        }
        snapshot
    }
}

#[must_use]
pub fn encode_line(path: &str, entry: &FileEntry) -> String {
    format!(
        "?{{{}?}}{}?|{}?|{}",
        path,
        entry.name,
        entry.size,
        encode_time(&entry.modified)
    )
}

pub fn decode_line(line: &str) -> Result<(String, FileEntry), DecodeError> {
    let caps = LINE_RE.captures(line).ok_or(DecodeError::Malformed)?;

    let size = caps[3]
        .parse::<u64>()
        .map_err(|_| DecodeError::Size(caps[3].to_string()))?;
    let modified = decode_time(&caps[4])?;

    Ok((
        caps[1].to_string(),
        FileEntry {
            name: caps[2].to_string(),
            size,
            modified,
            found: false,
        },
    ))
}

fn encode_time(t: &DateTime<FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn decode_time(s: &str) -> Result<DateTime<FixedOffset>, DecodeError> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|e| DateTime::parse_from_str(s, LEGACY_TIME_FORMAT).map_err(|_| e))
        .map_err(|source| DecodeError::Timestamp {
            value: s.to_string(),
            source,
        })
}
