use crate::error::TransportError;
use crate::transport::{Connector, RemoteDir, join_path, parent_path};
use crate::types::{EntryKind, RemoteEntry};
use chrono::{DateTime, Utc};
use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Serves a locally mounted directory through the same interface as FTP.
/// Paths are virtual: `/` is the mount base.
pub struct LocalConnector {
    base: PathBuf,
}

impl LocalConnector {
    #[must_use]
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }
}

impl Connector for LocalConnector {
    type Dir = LocalDir;

    fn connect(&self) -> Result<LocalDir, TransportError> {
        if !self.base.is_dir() {
            return Err(TransportError::Connect {
                addr: self.base.display().to_string(),
                message: "not a directory (is the share mounted?)".to_string(),
            });
        }
        Ok(LocalDir {
            base: self.base.clone(),
            cwd: "/".to_string(),
        })
    }

    fn describe(&self) -> String {
        self.base.display().to_string()
    }
}

pub struct LocalDir {
    base: PathBuf,
    cwd: String,
}

impl LocalDir {
    fn resolve(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            join_path(&self.cwd, path)
        }
    }

    fn native(&self, virtual_path: &str) -> PathBuf {
        self.base.join(virtual_path.trim_start_matches('/'))
    }
}

impl RemoteDir for LocalDir {
    fn list(&mut self, path: Option<&str>) -> Result<Vec<RemoteEntry>, TransportError> {
        let dir = path.map_or_else(|| self.cwd.clone(), |p| self.resolve(p));
        let mut entries = Vec::new();

        for item in WalkDir::new(self.native(&dir))
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let item = item.map_err(|e| TransportError::operation("LIST", &dir, e))?;
            let file_type = item.file_type();
            let kind = if file_type.is_symlink() {
                EntryKind::Link
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                continue;
            };

            // A lossy name could not be navigated back to
            let Some(name) = item.file_name().to_str().map(str::to_string) else {
                warn!(
                    "LIST {dir}: skipping entry with a non-UTF-8 name {:?}",
                    item.file_name()
                );
                continue;
            };
            let metadata = item
                .metadata()
                .map_err(|e| TransportError::operation("STAT", join_path(&dir, &name), e))?;
            let modified = metadata
                .modified()
                .map_err(|e| TransportError::operation("STAT", join_path(&dir, &name), e))?;

            entries.push(RemoteEntry {
                name,
                kind,
                size: metadata.len(),
                modified: DateTime::<Utc>::from(modified).fixed_offset(),
            });
        }

        Ok(entries)
    }

    fn change_dir(&mut self, path: &str) -> Result<(), TransportError> {
        let target = self.resolve(path);
        if !self.native(&target).is_dir() {
            return Err(TransportError::operation("CWD", target, "no such directory"));
        }
        self.cwd = target;
        Ok(())
    }

    fn change_to_parent(&mut self) -> Result<(), TransportError> {
        if self.cwd == "/" {
            return Err(TransportError::operation("CDUP", "/", "already at the root"));
        }
        self.cwd = parent_path(&self.cwd);
        Ok(())
    }

    fn current_dir(&mut self) -> Result<String, TransportError> {
        Ok(self.cwd.clone())
    }

    fn quit(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
