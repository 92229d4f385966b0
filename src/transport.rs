use crate::error::TransportError;
use crate::types::RemoteEntry;
use log::{debug, warn};
use std::ops::{Deref, DerefMut};

/// Navigation and listing over a remote directory tree.
pub trait RemoteDir {
    /// Lists `path`, or the current directory when `None`.
    fn list(&mut self, path: Option<&str>) -> Result<Vec<RemoteEntry>, TransportError>;

    fn change_dir(&mut self, path: &str) -> Result<(), TransportError>;

    fn change_to_parent(&mut self) -> Result<(), TransportError>;

    fn current_dir(&mut self) -> Result<String, TransportError>;

    /// Ends the session. Called once by [`Session`] on drop.
    fn quit(&mut self) -> Result<(), TransportError>;
}

/// Opens one session per cycle.
pub trait Connector {
    type Dir: RemoteDir;

    fn connect(&self) -> Result<Self::Dir, TransportError>;

    /// Human-readable target for log lines.
    fn describe(&self) -> String;
}

/// Owns a connected session and closes it when dropped.
pub struct Session<D: RemoteDir> {
    dir: D,
}

impl<D: RemoteDir> Session<D> {
    pub fn new(dir: D) -> Self {
        Self { dir }
    }
}

impl<D: RemoteDir> Deref for Session<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.dir
    }
}

impl<D: RemoteDir> DerefMut for Session<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.dir
    }
}

impl<D: RemoteDir> Drop for Session<D> {
    fn drop(&mut self) {
        match self.dir.quit() {
            Ok(()) => debug!("QUIT: connection closed"),
            Err(e) => warn!("QUIT: {e}"),
        }
    }
}

/// Appends `name` to a slash-delimited directory path.
#[must_use]
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Parent of a slash-delimited path; `/` is its own parent.
#[must_use]
pub fn parent_path(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeConnector, FakeTree};

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "a.mxf"), "/a.mxf");
        assert_eq!(join_path("/AMEDIATEKA", "PROMO"), "/AMEDIATEKA/PROMO");
        assert_eq!(join_path("/x/", "y"), "/x/y");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/"), "/");
        assert_eq!(parent_path("/a"), "/");
        assert_eq!(parent_path("/a/b"), "/a");
        assert_eq!(parent_path("/a/b/"), "/a");
    }

    #[test]
    fn test_session_quits_on_drop() {
        let connector = FakeConnector::new(FakeTree::new());
        {
            let mut session = Session::new(connector.connect().unwrap());
            session.change_dir("/").unwrap();
            assert_eq!(connector.quits(), 0);
        }
        assert_eq!(connector.quits(), 1);
    }

    #[test]
    fn test_session_quits_on_early_return() {
        fn failing(connector: &FakeConnector) -> Result<(), TransportError> {
            let mut session = Session::new(connector.connect()?);
            session.change_dir("/missing")?;
            Ok(())
        }

        let connector = FakeConnector::new(FakeTree::new());
        assert!(failing(&connector).is_err());
        assert_eq!(connector.quits(), 1);
    }
}
