use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use fs2::FileExt;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable file yields an empty snapshot. Damaged lines
    /// are skipped one by one.
    #[must_use]
    pub fn load(&self) -> Snapshot {
        debug!("Loading {:?}...", self.path);
        match fs::read(&self.path) {
            Ok(data) => {
                let snapshot = Snapshot::decode(&data);
                debug!("Snapshot loaded: {} entries", snapshot.len());
                snapshot
            }
            Err(e) => {
                warn!("{:?} not loaded ({e}), starting with an empty snapshot", self.path);
                Snapshot::new()
            }
        }
    }

    /// Replaces the file in one rename so readers never see a partial write.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let persist_err = |source: std::io::Error| Error::Persist {
            path: self.path.clone(),
            source,
        };

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let temp_path = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            file.write_all(snapshot.encode().as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        };

        if let Err(e) = write() {
            fs::remove_file(&temp_path).ok();
            return Err(persist_err(e));
        }
        debug!("Snapshot saved: {} entries", snapshot.len());
        Ok(())
    }

    /// Holds `<snapshot>.lock` exclusively until the returned file is dropped.
    pub fn lock(&self) -> Result<File> {
        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| Error::Io {
                path: lock_path.clone(),
                source,
            })?;
        file.try_lock_exclusive().map_err(|_| Error::Locked {
            path: self.path.clone(),
        })?;
        Ok(file)
    }
}
