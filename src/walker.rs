use crate::classifier::Classification;
use crate::error::{Error, TransportError};
use crate::notify::{Change, Sink};
use crate::snapshot::Snapshot;
use crate::transport::{RemoteDir, join_path};
use crate::types::EntryKind;
use log::debug;
use regex::Regex;
use std::io::Write;

/// Which files are tracked and which folders are skipped.
#[derive(Debug, Clone)]
pub struct Filters {
    file_mask: Regex,
    exclude: Option<Regex>,
}

impl Filters {
    pub fn new(file_mask: &str, exclude: Option<&str>) -> Result<Self, Error> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|source| Error::Pattern {
                pattern: pattern.to_string(),
                source,
            })
        };
        Ok(Self {
            file_mask: compile(file_mask)?,
            exclude: exclude.map(compile).transpose()?,
        })
    }

    /// Matched against the bare file name.
    #[must_use]
    pub fn accepts_file(&self, name: &str) -> bool {
        self.file_mask.is_match(name)
    }

    /// Matched against the full folder path.
    #[must_use]
    pub fn excludes_dir(&self, path: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(path))
    }
}

/// Counters for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub directories: usize,
    pub files: usize,
    pub new: usize,
    pub changed: usize,
}

/// Single status line showing the directory being listed. The cursor is
/// left at column 0 so other output overwrites it cleanly.
#[derive(Debug, Default)]
struct Progress {
    enabled: bool,
    last_width: usize,
}

impl Progress {
    fn show(&mut self, path: &str) {
        if !self.enabled {
            return;
        }
        print!("{}", self.render(path));
        std::io::stdout().flush().ok();
    }

    fn render(&mut self, path: &str) -> String {
        let width = path.chars().count();
        let line = format!("{path:<pad$}\r", pad = self.last_width.max(width));
        self.last_width = width;
        line
    }

    fn clear(&mut self) {
        if !self.enabled || self.last_width == 0 {
            return;
        }
        print!("\r{:width$}\r", "", width = self.last_width);
        std::io::stdout().flush().ok();
        self.last_width = 0;
    }
}

/// Depth-first traversal of the remote tree, one directory at a time.
pub struct Walker {
    filters: Filters,
    progress: Progress,
}

impl Walker {
    #[must_use]
    pub fn new(filters: Filters, show_progress: bool) -> Self {
        Self {
            filters,
            progress: Progress {
                enabled: show_progress,
                last_width: 0,
            },
        }
    }

    /// Walks everything below the session's current directory, which must
    /// be `current`. Each accepted file is classified against `snapshot`
    /// and every new or changed one is reported to `sink`.
    ///
    /// The first transport error stops the walk. Snapshot updates made
    /// before it are kept.
    pub fn walk<D: RemoteDir>(
        &mut self,
        dir: &mut D,
        current: &str,
        snapshot: &mut Snapshot,
        sink: &mut dyn Sink,
    ) -> Result<WalkStats, TransportError> {
        let mut stats = WalkStats::default();
        let result = self.walk_dir(dir, current, snapshot, sink, &mut stats);
        self.progress.clear();
        result.map(|()| stats)
    }

    fn walk_dir<D: RemoteDir>(
        &mut self,
        dir: &mut D,
        current: &str,
        snapshot: &mut Snapshot,
        sink: &mut dyn Sink,
        stats: &mut WalkStats,
    ) -> Result<(), TransportError> {
        self.progress.show(current);
        let entries = dir.list(None)?;
        stats.directories += 1;
        debug!("LIST {current}: {} entries", entries.len());

        for entry in entries {
            if entry.is_marker() {
                continue;
            }
            match entry.kind {
                EntryKind::File => {
                    if !self.filters.accepts_file(&entry.name) {
                        continue;
                    }
                    let path = join_path(current, &entry.name);
                    stats.files += 1;

                    let classification = snapshot.observe(&path, entry.to_file_entry());
                    match classification {
                        Classification::New => stats.new += 1,
                        Classification::Changed(_) => stats.changed += 1,
                        Classification::Unchanged => {}
                    }
                    if let Some(change) = Change::from_classification(&path, classification) {
                        sink.report(&change);
                    }
                }
                EntryKind::Directory => {
                    let path = join_path(current, &entry.name);
                    if self.filters.excludes_dir(&path) {
                        debug!("WALK: ignoring folder {path:?}");
                        continue;
                    }
                    dir.change_dir(&entry.name)?;
                    self.walk_dir(dir, &path, snapshot, sink, stats)?;
                    dir.change_to_parent()?;
                }
                EntryKind::Link => {}
            }
        }
        Ok(())
    }
}
