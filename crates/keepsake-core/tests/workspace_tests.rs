//! Workspace lifecycle integration tests.

use anyhow::Result;
use keepsake_core::{
    CoreError, DiffStrategy, Settings, TrackingMode, TrackingState, Workspace, WorkspaceLocation,
};
use keepsake_test_utils::assertions::assert_file_equals;
use keepsake_test_utils::fixtures::content::{NOTES, NOTES_EDITED};
use keepsake_test_utils::{assert_err, TestProject};

/// Clean drops every store but keeps the root and its config.
#[tokio::test]
async fn test_clean_resets_state() -> Result<()> {
    let project = TestProject::new()
        .with_file("a.txt", NOTES)
        .with_file("b.txt", NOTES)
        .build();
    let workspace = Workspace::init(WorkspaceLocation::Explicit(project.workspace_dir())).await?;
    workspace.backups().track(project.file_path("a.txt")).await?;
    workspace
        .versions()
        .create_initial_version(project.file_path("b.txt"), "initial")
        .await?;

    let before = workspace.info().await;
    assert_eq!(before.tracked_files, 1);
    assert_eq!(before.versioned_files, 1);

    workspace.clean().await?;

    let after = workspace.info().await;
    assert!(after.exists);
    assert!(after.is_healthy);
    assert_eq!(after.tracked_files, 0);
    assert_eq!(after.versioned_files, 0);
    assert_eq!(after.created_at, before.created_at);
    assert!(project.workspace_dir().join("config.json").is_file());

    // The working files themselves are untouched
    assert_file_equals(&project.file_path("a.txt"), NOTES);
    assert_eq!(
        workspace.tracking_state(project.file_path("b.txt")).await?,
        TrackingState::Untracked
    );
    Ok(())
}

/// A workspace reopened from disk sees what the first handle recorded.
#[tokio::test]
async fn test_reopen_sees_existing_state() -> Result<()> {
    let project = TestProject::new().with_file("notes.txt", NOTES).build();
    let location = WorkspaceLocation::Explicit(project.workspace_dir());
    let notes = project.file_path("notes.txt");

    {
        let workspace = Workspace::init(location.clone()).await?;
        workspace.versions().create_initial_version(&notes, "initial").await?;
        project.write("notes.txt", NOTES_EDITED);
        workspace.versions().commit_version(&notes, "edit").await?;
    }

    let workspace = Workspace::open(location).await?;
    assert_eq!(workspace.versions().current_version(&notes).await?, 2);
    assert_eq!(workspace.versions().version(&notes, 1).await?.content, NOTES);
    Ok(())
}

/// Missing config means no workspace; a broken config means corruption.
#[tokio::test]
async fn test_open_failures() -> Result<()> {
    let project = TestProject::new().build();
    let location = WorkspaceLocation::Explicit(project.workspace_dir());

    let err = assert_err!(Workspace::open(location.clone()).await);
    assert!(matches!(err, CoreError::WorkspaceNotFound(_)));

    std::fs::create_dir_all(project.workspace_dir())?;
    let err = assert_err!(Workspace::open(location.clone()).await);
    assert!(matches!(err, CoreError::WorkspaceNotFound(_)));

    Workspace::init(location.clone()).await?;
    std::fs::write(project.workspace_dir().join("config.json"), "[]")?;
    let err = assert_err!(Workspace::open(location.clone()).await);
    assert!(matches!(err, CoreError::WorkspaceCorrupted { .. }));

    let info = Workspace::inspect(location).await?;
    assert!(info.exists);
    assert!(!info.is_healthy);
    Ok(())
}

/// Status lists both modes and skips files that can no longer be read.
#[tokio::test]
async fn test_status_across_modes() -> Result<()> {
    let project = TestProject::new()
        .with_file("backed.txt", NOTES)
        .with_file("versioned.txt", NOTES)
        .with_file("gone.txt", NOTES)
        .build();
    let workspace = Workspace::init(WorkspaceLocation::Explicit(project.workspace_dir())).await?;
    workspace
        .backups()
        .track(project.file_path("backed.txt"))
        .await?;
    workspace
        .versions()
        .create_initial_version(project.file_path("versioned.txt"), "initial")
        .await?;
    workspace
        .versions()
        .create_initial_version(project.file_path("gone.txt"), "initial")
        .await?;

    project.write("versioned.txt", NOTES_EDITED);
    // Swap the file for a directory so reading it fails
    project.remove("gone.txt");
    std::fs::create_dir(project.file_path("gone.txt"))?;

    let status = workspace.status().await?;
    assert_eq!(status.len(), 2);

    let backed = status
        .iter()
        .find(|s| s.path.ends_with("backed.txt"))
        .expect("backed.txt listed");
    assert_eq!(backed.mode, TrackingMode::Backup);
    assert!(!backed.has_changes);

    let versioned = status
        .iter()
        .find(|s| s.path.ends_with("versioned.txt"))
        .expect("versioned.txt listed");
    assert_eq!(versioned.mode, TrackingMode::Versioned);
    assert!(versioned.has_changes);
    assert_eq!(versioned.current_version, Some(1));
    Ok(())
}

/// Settings persist in config.json and drive the diff strategy.
#[tokio::test]
async fn test_positional_strategy_from_settings() -> Result<()> {
    let project = TestProject::new()
        .with_file("notes.txt", "a\nb\nc\n")
        .build();
    let mut settings = Settings::default();
    settings.diff.strategy = DiffStrategy::Positional;
    let location = WorkspaceLocation::Explicit(project.workspace_dir());
    Workspace::init_with(location.clone(), settings).await?;

    let workspace = Workspace::open(location).await?;
    assert_eq!(
        workspace.config().settings.diff.strategy,
        DiffStrategy::Positional
    );

    let notes = project.file_path("notes.txt");
    workspace.backups().track(&notes).await?;
    project.write("notes.txt", "new\na\nb\nc\n");

    // An inserted first line shifts every positional comparison
    let diff = workspace.backups().diff(&notes).await?;
    assert_eq!(diff.modified_lines, 3);
    assert_eq!(diff.added_lines, 1);
    Ok(())
}
