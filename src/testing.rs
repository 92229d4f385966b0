//! In-memory remote tree for walker and cycle tests.

use crate::error::TransportError;
use crate::transport::{Connector, RemoteDir, join_path, parent_path};
use crate::types::{EntryKind, RemoteEntry};
use chrono::{DateTime, FixedOffset};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

#[derive(Debug, Clone, Default)]
pub struct FakeTree {
    dirs: HashMap<String, Vec<RemoteEntry>>,
    failing: HashSet<String>,
}

impl FakeTree {
    pub fn new() -> Self {
        let mut tree = Self::default();
        tree.dirs.insert("/".to_string(), Vec::new());
        tree
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.ensure_dir(path);
        self
    }

    pub fn file(mut self, path: &str, size: u64, modified: &str) -> Self {
        self.put(path, EntryKind::File, size, modified);
        self
    }

    pub fn link(mut self, path: &str) -> Self {
        self.put(path, EntryKind::Link, 0, "2000-01-01T00:00:00Z");
        self
    }

    pub fn fail_listing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn remove(&mut self, path: &str) {
        let parent = parent_path(path);
        let name = path.rsplit('/').next().unwrap_or_default();
        if let Some(entries) = self.dirs.get_mut(&parent) {
            entries.retain(|e| e.name != name);
        }
    }

    pub fn set_file(&mut self, path: &str, size: u64, modified: &str) {
        self.remove(path);
        self.put(path, EntryKind::File, size, modified);
    }

    pub fn set_failing(&mut self, path: &str, failing: bool) {
        if failing {
            self.failing.insert(path.to_string());
        } else {
            self.failing.remove(path);
        }
    }

    fn put(&mut self, path: &str, kind: EntryKind, size: u64, modified: &str) {
        let parent = parent_path(path);
        self.ensure_dir(&parent);
        let name = path.rsplit('/').next().unwrap().to_string();
        self.dirs.get_mut(&parent).unwrap().push(RemoteEntry {
            name,
            kind,
            size,
            modified: ts(modified),
        });
    }

    fn ensure_dir(&mut self, path: &str) {
        if self.dirs.contains_key(path) {
            return;
        }
        self.dirs.insert(path.to_string(), Vec::new());
        let parent = parent_path(path);
        self.ensure_dir(&parent);
        let name = path.rsplit('/').next().unwrap().to_string();
        self.dirs.get_mut(&parent).unwrap().push(RemoteEntry {
            name,
            kind: EntryKind::Directory,
            size: 0,
            modified: ts("2000-01-01T00:00:00Z"),
        });
    }
}

#[derive(Debug, Default)]
struct Calls {
    listed: RefCell<Vec<String>>,
    quits: Cell<usize>,
}

pub struct FakeConnector {
    pub tree: FakeTree,
    pub fail_connect: bool,
    calls: Rc<Calls>,
}

impl FakeConnector {
    pub fn new(tree: FakeTree) -> Self {
        Self {
            tree,
            fail_connect: false,
            calls: Rc::new(Calls::default()),
        }
    }

    pub fn quits(&self) -> usize {
        self.calls.quits.get()
    }

    /// Directories listed so far, in order.
    pub fn listed(&self) -> Vec<String> {
        self.calls.listed.borrow().clone()
    }
}

impl Connector for FakeConnector {
    type Dir = FakeDir;

    fn connect(&self) -> Result<FakeDir, TransportError> {
        if self.fail_connect {
            return Err(TransportError::Connect {
                addr: "fake".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(FakeDir {
            tree: self.tree.clone(),
            cwd: "/".to_string(),
            calls: Rc::clone(&self.calls),
        })
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

pub struct FakeDir {
    tree: FakeTree,
    cwd: String,
    calls: Rc<Calls>,
}

impl RemoteDir for FakeDir {
    fn list(&mut self, path: Option<&str>) -> Result<Vec<RemoteEntry>, TransportError> {
        let dir = path.map_or_else(|| self.cwd.clone(), str::to_string);
        if self.tree.failing.contains(&dir) {
            return Err(TransportError::operation("LIST", dir, "550 listing refused"));
        }
        self.calls.listed.borrow_mut().push(dir.clone());

        let marker = |name: &str| RemoteEntry {
            name: name.to_string(),
            kind: EntryKind::Directory,
            size: 0,
            modified: ts("2000-01-01T00:00:00Z"),
        };
        let mut entries = vec![marker("."), marker("..")];
        entries.extend(self.tree.dirs.get(&dir).cloned().unwrap_or_default());
        Ok(entries)
    }

    fn change_dir(&mut self, path: &str) -> Result<(), TransportError> {
        let target = if path.starts_with('/') {
            path.to_string()
        } else {
            join_path(&self.cwd, path)
        };
        if !self.tree.dirs.contains_key(&target) {
            return Err(TransportError::operation("CWD", target, "550 no such directory"));
        }
        self.cwd = target;
        Ok(())
    }

    fn change_to_parent(&mut self) -> Result<(), TransportError> {
        self.cwd = parent_path(&self.cwd);
        Ok(())
    }

    fn current_dir(&mut self) -> Result<String, TransportError> {
        Ok(self.cwd.clone())
    }

    fn quit(&mut self) -> Result<(), TransportError> {
        self.calls.quits.set(self.calls.quits.get() + 1);
        Ok(())
    }
}
