use crate::error::{Result, TransportError};
use crate::notify::{Change, Sink};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use crate::transport::{Connector, RemoteDir, Session};
use crate::walker::{WalkStats, Walker};
use log::{debug, error, info};
use std::fmt;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Connecting,
    Walking,
    Reconciled,
    Failed,
    Sleeping,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "IDLE",
            CycleState::Connecting => "CONNECTING",
            CycleState::Walking => "WALKING",
            CycleState::Reconciled => "RECONCILED",
            CycleState::Failed => "FAILED",
            CycleState::Sleeping => "SLEEPING",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    Reconciled { stats: WalkStats, deleted: usize },
    Failed(TransportError),
}

impl CycleOutcome {
    #[must_use]
    pub fn is_reconciled(&self) -> bool {
        matches!(self, CycleOutcome::Reconciled { .. })
    }

    #[must_use]
    pub fn state(&self) -> CycleState {
        match self {
            CycleOutcome::Reconciled { .. } => CycleState::Reconciled,
            CycleOutcome::Failed(_) => CycleState::Failed,
        }
    }
}

/// Pause after a cycle: long after success, short after failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub success: Duration,
    pub failure: Duration,
}

impl Intervals {
    #[must_use]
    pub fn after(&self, outcome: &CycleOutcome) -> Duration {
        if outcome.is_reconciled() {
            self.success
        } else {
            self.failure
        }
    }
}

/// Runs one scan of `root` and reconciles `snapshot` against it.
///
/// Deletions are only judged, and the snapshot only persisted, when the
/// walk covered the whole tree. A transport error leaves the file on disk
/// as it was. The only error returned is a failed save.
pub fn run_cycle<C: Connector>(
    connector: &C,
    root: &str,
    walker: &mut Walker,
    snapshot: &mut Snapshot,
    store: &SnapshotStore,
    sink: &mut dyn Sink,
) -> Result<CycleOutcome> {
    let stats = match scan(connector, root, walker, snapshot, sink) {
        Ok(stats) => stats,
        Err(e) => {
            error!("{}: {e}", CycleState::Failed);
            return Ok(CycleOutcome::Failed(e));
        }
    };

    let deleted = snapshot.sweep();
    for path in &deleted {
        sink.report(&Change::deleted(path.as_str()));
    }
    store.save(snapshot)?;

    info!(
        "{}: {} dirs, {} files ({} new, {} changed, {} deleted)",
        CycleState::Reconciled,
        stats.directories,
        stats.files,
        stats.new,
        stats.changed,
        deleted.len()
    );
    Ok(CycleOutcome::Reconciled {
        stats,
        deleted: deleted.len(),
    })
}

fn scan<C: Connector>(
    connector: &C,
    root: &str,
    walker: &mut Walker,
    snapshot: &mut Snapshot,
    sink: &mut dyn Sink,
) -> std::result::Result<WalkStats, TransportError> {
    debug!("{}: {}", CycleState::Connecting, connector.describe());
    let mut session = Session::new(connector.connect()?);
    session.change_dir(root)?;
    let current = session.current_dir()?;

    debug!("{}: looking for new files under {current}", CycleState::Walking);
    snapshot.unmark_all();
    walker.walk(&mut *session, &current, snapshot, sink)
}

/// Owns the snapshot for the life of the process and polls forever.
pub struct Monitor<C: Connector> {
    connector: C,
    root: String,
    walker: Walker,
    snapshot: Snapshot,
    store: SnapshotStore,
    intervals: Intervals,
}

impl<C: Connector> Monitor<C> {
    /// Loads the persisted snapshot from `store`.
    pub fn new(
        connector: C,
        root: impl Into<String>,
        walker: Walker,
        store: SnapshotStore,
        intervals: Intervals,
    ) -> Self {
        let snapshot = store.load();
        info!("Loaded {} tracked file(s) from {:?}", snapshot.len(), store.path());
        Self {
            connector,
            root: root.into(),
            walker,
            snapshot,
            store,
            intervals,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn run_once(&mut self, sink: &mut dyn Sink) -> Result<CycleOutcome> {
        let outcome = run_cycle(
            &self.connector,
            &self.root,
            &mut self.walker,
            &mut self.snapshot,
            &self.store,
            sink,
        );
        sink.flush();
        outcome
    }

    /// Returns only when the snapshot cannot be saved.
    pub fn run(&mut self, sink: &mut dyn Sink) -> Result<()> {
        loop {
            debug!("{}", CycleState::Idle);
            let outcome = self.run_once(sink)?;
            let pause = self.intervals.after(&outcome);
            info!(
                "{} for {} min after {}",
                CycleState::Sleeping,
                pause.as_secs() / 60,
                outcome.state()
            );
            thread::sleep(pause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::notify::ChangeKind;
    use crate::testing::{FakeConnector, FakeTree};
    use crate::walker::Filters;
    use std::fs;

    const T0: &str = "2017-03-17T14:39:39+00:00";
    const T1: &str = "2017-03-17T14:39:40+00:00";

    fn walker() -> Walker {
        Walker::new(Filters::new(r"\.mxf$", None).unwrap(), false)
    }

    fn tree() -> FakeTree {
        // /drop lists movie.mxf before show/
        FakeTree::new()
            .file("/drop/movie.mxf", 300, T0)
            .file("/drop/show/e01.mxf", 100, T0)
            .file("/drop/show/e02.mxf", 200, T0)
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: SnapshotStore,
        connector: FakeConnector,
        snapshot: Snapshot,
        walker: Walker,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = SnapshotStore::new(dir.path().join("snapshot.txt"));
            Self {
                _dir: dir,
                store,
                connector: FakeConnector::new(tree()),
                snapshot: Snapshot::new(),
                walker: walker(),
            }
        }

        fn cycle(&mut self) -> (CycleOutcome, Vec<Change>) {
            let mut changes: Vec<Change> = Vec::new();
            let outcome = run_cycle(
                &self.connector,
                "/drop",
                &mut self.walker,
                &mut self.snapshot,
                &self.store,
                &mut changes,
            )
            .unwrap();
            (outcome, changes)
        }

        fn on_disk(&self) -> String {
            fs::read_to_string(self.store.path()).unwrap()
        }
    }

    #[test]
    fn test_first_cycle_reports_everything_and_persists() {
        let mut fx = Fixture::new();
        let (outcome, changes) = fx.cycle();

        assert!(outcome.is_reconciled());
        assert_eq!(changes.len(), 3);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::New));
        assert_eq!(fx.on_disk().lines().count(), 3);
        assert!(fx.snapshot.iter().all(|(_, e)| !e.found));
        assert_eq!(fx.connector.quits(), 1);
    }

    #[test]
    fn test_second_cycle_is_quiet() {
        let mut fx = Fixture::new();
        fx.cycle();
        let before = fx.on_disk();

        let (outcome, changes) = fx.cycle();
        assert!(outcome.is_reconciled());
        assert!(changes.is_empty());
        assert_eq!(fx.on_disk(), before);
    }

    #[test]
    fn test_restart_does_not_rereport() {
        let mut fx = Fixture::new();
        fx.cycle();

        fx.snapshot = fx.store.load();
        let (_, changes) = fx.cycle();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_deletion_reported_once() {
        let mut fx = Fixture::new();
        fx.cycle();

        fx.connector.tree.remove("/drop/show/e02.mxf");
        let (outcome, changes) = fx.cycle();
        assert!(matches!(
            outcome,
            CycleOutcome::Reconciled { deleted: 1, .. }
        ));
        assert_eq!(changes, vec![Change::deleted("/drop/show/e02.mxf")]);
        assert!(fx.snapshot.get("/drop/show/e02.mxf").is_none());
        assert!(!fx.on_disk().contains("e02.mxf"));

        let (_, changes) = fx.cycle();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_changed_file_reported() {
        let mut fx = Fixture::new();
        fx.cycle();

        fx.connector.tree.set_file("/drop/movie.mxf", 300, T1);
        let (_, changes) = fx.cycle();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "/drop/movie.mxf");
        assert_eq!(changes[0].kind.reason(), "datetime changed");
        assert!(fx.on_disk().contains("2017-03-17T14:39:40+00:00"));
    }

    #[test]
    fn test_failed_walk_leaves_disk_untouched() {
        let mut fx = Fixture::new();
        fx.cycle();
        let before = fx.on_disk();

        fx.connector.tree.remove("/drop/movie.mxf");
        fx.connector.tree.set_failing("/drop/show", true);
        let (outcome, changes) = fx.cycle();

        assert!(matches!(outcome, CycleOutcome::Failed(_)));
        assert!(changes.iter().all(|c| c.kind != ChangeKind::Deleted));
        assert_eq!(fx.on_disk(), before);
        assert_eq!(fx.snapshot.len(), 3);
        assert_eq!(fx.connector.quits(), 2);

        // Recovery judges the deletion exactly once
        fx.connector.tree.set_failing("/drop/show", false);
        let (outcome, changes) = fx.cycle();
        assert!(outcome.is_reconciled());
        assert_eq!(changes, vec![Change::deleted("/drop/movie.mxf")]);
    }

    #[test]
    fn test_found_in_failed_cycle_does_not_survive_later_deletion() {
        let mut fx = Fixture::new();
        fx.cycle();

        // movie.mxf is marked found, then the walk dies in /drop/show
        fx.connector.tree.set_failing("/drop/show", true);
        fx.connector.tree.remove("/drop/show/e01.mxf");
        let (outcome, _) = fx.cycle();
        assert!(!outcome.is_reconciled());

        fx.connector.tree.set_failing("/drop/show", false);
        fx.connector.tree.remove("/drop/movie.mxf");
        let (_, changes) = fx.cycle();
        let mut deleted: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        deleted.sort_unstable();
        assert_eq!(deleted, vec!["/drop/movie.mxf", "/drop/show/e01.mxf"]);
    }

    #[test]
    fn test_connect_failure() {
        let mut fx = Fixture::new();
        fx.connector.fail_connect = true;
        let (outcome, changes) = fx.cycle();

        assert!(matches!(
            outcome,
            CycleOutcome::Failed(TransportError::Connect { .. })
        ));
        assert!(changes.is_empty());
        assert!(!fx.store.path().exists());
        assert_eq!(fx.connector.quits(), 0);
    }

    #[test]
    fn test_missing_root_fails_cycle() {
        let mut fx = Fixture::new();
        let mut changes: Vec<Change> = Vec::new();
        let outcome = run_cycle(
            &fx.connector,
            "/nope",
            &mut fx.walker,
            &mut fx.snapshot,
            &fx.store,
            &mut changes,
        )
        .unwrap();
        assert_eq!(outcome.state(), CycleState::Failed);
        assert_eq!(fx.connector.quits(), 1);
    }

    #[test]
    fn test_persist_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("gone/snapshot.txt"));
        let connector = FakeConnector::new(tree());
        let mut changes: Vec<Change> = Vec::new();

        let result = run_cycle(
            &connector,
            "/drop",
            &mut walker(),
            &mut Snapshot::new(),
            &store,
            &mut changes,
        );
        assert!(matches!(result, Err(Error::Persist { .. })));
    }

    #[test]
    fn test_intervals() {
        let intervals = Intervals {
            success: Duration::from_secs(1800),
            failure: Duration::from_secs(60),
        };
        let ok = CycleOutcome::Reconciled {
            stats: WalkStats::default(),
            deleted: 0,
        };
        let failed = CycleOutcome::Failed(TransportError::operation("LIST", "/", "timeout"));
        assert_eq!(intervals.after(&ok), Duration::from_secs(1800));
        assert_eq!(intervals.after(&failed), Duration::from_secs(60));
    }

    #[test]
    fn test_monitor_run_once_loads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshot.txt"));
        fs::write(
            store.path(),
            "?{/drop/movie.mxf?}movie.mxf?|300?|2017-03-17T14:39:39+00:00\n?{/drop/old.mxf?}old.mxf?|1?|2017-03-17T14:39:39+00:00\n",
        )
        .unwrap();

        let mut monitor = Monitor::new(
            FakeConnector::new(tree()),
            "/drop",
            walker(),
            store,
            Intervals {
                success: Duration::from_secs(1800),
                failure: Duration::from_secs(60),
            },
        );
        assert_eq!(monitor.snapshot().len(), 2);

        let mut changes: Vec<Change> = Vec::new();
        let outcome = monitor.run_once(&mut changes).unwrap();
        assert!(outcome.is_reconciled());

        let news = changes.iter().filter(|c| c.kind == ChangeKind::New).count();
        assert_eq!(news, 2);
        assert!(changes.contains(&Change::deleted("/drop/old.mxf")));
        assert_eq!(monitor.snapshot().len(), 3);
    }
}
