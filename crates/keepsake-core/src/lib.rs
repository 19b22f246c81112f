//! Tracking and versioning engine for keepsake.
//!
//! Files can be supervised in one of two modes:
//! - **Backup**: one copy taken at `track`, resolved by `keep`, `undo` or
//!   `abort` ([`BackupTracker`])
//! - **Versioned**: a numbered history with commit, checkout and diff
//!   between any two versions ([`VersionManager`])
//!
//! A file is in at most one mode at a time. Every mutation runs through a
//! [`Transaction`] so a failure part way through is rolled back in process.
//!
//! # Example
//!
//! ```no_run
//! use keepsake_core::{Workspace, WorkspaceLocation};
//!
//! # async fn example() -> keepsake_core::CoreResult<()> {
//! let workspace = Workspace::open_or_init(WorkspaceLocation::from_env()).await?;
//! let versions = workspace.versions();
//!
//! versions.create_initial_version("notes.txt", "initial").await?;
//! // ... edit notes.txt ...
//! versions.commit_version("notes.txt", "rework intro").await?;
//!
//! let diff = versions.version_diff("notes.txt", Some(1), Some(2)).await?;
//! println!("{}", diff.diff_text);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod diff;
pub mod error;
pub mod lock;
pub mod record;
pub mod transaction;
pub mod version;
pub mod workspace;

pub use backup::BackupTracker;
pub use config::{DiffSettings, Settings};
pub use diff::{generate_diff, DiffOptions, DiffResult, DiffStrategy, LineChange};
pub use error::{CoreError, CoreResult, TrackingMode};
pub use record::{BackupState, TrackedFile, VersionHistory, VersionRecord};
pub use transaction::{FileOperation, OperationKind, Transaction, TransactionState};
pub use version::{VersionManager, VersionedFile};
pub use workspace::{
    FileStatus, TrackingState, Workspace, WorkspaceConfig, WorkspaceInfo, WorkspaceKind,
    WorkspaceLocation,
};
