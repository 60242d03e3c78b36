mod snapshot_finder;

pub use snapshot_finder::{load_snapshot, SnapshotFile, SnapshotFinder};
