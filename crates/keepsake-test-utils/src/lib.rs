//! Testing utilities and fixtures for keepsake.
//!
//! - **Fixtures**: temporary project directories with a workspace location
//! - **Assertions**: file and text assertions with readable failures
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use keepsake_test_utils::TestProject;
//!
//! #[tokio::test]
//! async fn test_track() {
//!     let project = TestProject::new()
//!         .with_file("notes.txt", "line1\nline2\n")
//!         .build();
//!
//!     let workspace = Workspace::init(WorkspaceLocation::Explicit(project.workspace_dir()))
//!         .await
//!         .unwrap();
//!     workspace.backups().track(project.file_path("notes.txt")).await.unwrap();
//! }
//! ```

pub mod assertions;
pub mod fixtures;

pub use fixtures::{BuiltTestProject, TestProject};
#[cfg(unix)]
pub use fixtures::ReadOnlyDir;
