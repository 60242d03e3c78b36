//! classshrink - Removes unused code from a JVM class path
//!
//! Works on an in-memory model of class files (constant pools, members,
//! attributes and Kotlin metadata) loaded from JSON snapshots.
//!
//! # Architecture
//!
//! The shrinking pipeline consists of:
//! 1. **Discovery** - Find and merge the input snapshots
//! 2. **Linking** - Resolve symbolic references into arena ids
//! 3. **Keep rules** - Mark the entry points that must survive
//! 4. **Marking** - Mark everything reachable from the entry points
//! 5. **Shrinking** - Remove everything unmarked and compact what remains
//! 6. **Reporting** - Summaries, `usage.txt` and keep explanations

pub mod config;
pub mod discovery;
pub mod keep;
pub mod model;
pub mod report;
pub mod shrink;

pub use config::Config;
pub use discovery::SnapshotFinder;
pub use keep::{KeepMatcher, KeepRule};
pub use model::{ClassBuilder, ClassPath, Linker, Snapshot};
pub use report::{ReportFormat, Reporter, UsageReport};
pub use shrink::{ShrinkConfig, ShrinkError, ShrinkPipeline, ShrinkSummary};
