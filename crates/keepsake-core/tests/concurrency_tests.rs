//! Concurrent access within one process.

use anyhow::Result;
use keepsake_core::{CoreError, Workspace, WorkspaceLocation};
use keepsake_test_utils::TestProject;

/// Racing commits on one file never lose or duplicate a version.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_keep_every_version() -> Result<()> {
    let project = TestProject::new().with_file("notes.txt", "v0\n").build();
    let workspace = Workspace::init(WorkspaceLocation::Explicit(project.workspace_dir())).await?;
    let notes = project.file_path("notes.txt");
    workspace
        .versions()
        .create_initial_version(&notes, "initial")
        .await?;

    let mut handles = Vec::new();
    for i in 1..=8 {
        let versions = workspace.versions();
        let notes = notes.clone();
        handles.push(tokio::spawn(async move {
            tokio::fs::write(&notes, format!("v{i}\n")).await?;
            match versions.commit_version(&notes, format!("commit {i}")).await {
                Ok(_) => Ok::<_, anyhow::Error>(true),
                // Another task already committed this exact content
                Err(CoreError::NoChanges(_)) => Ok(false),
                Err(e) => Err(e.into()),
            }
        }));
    }

    let mut committed = 0;
    for handle in handles {
        if handle.await?? {
            committed += 1;
        }
    }

    let history = workspace.versions().version_history(&notes).await?;
    assert!(committed >= 1);
    assert_eq!(history.len(), committed + 1);

    let numbers: Vec<u32> = history.iter().map(|r| r.version).collect();
    let expected: Vec<u32> = (1..=history.len() as u32).collect();
    assert_eq!(numbers, expected);
    Ok(())
}

/// Tracking many files at once keeps every record in state.json.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tracks_share_state() -> Result<()> {
    let mut builder = TestProject::new();
    for i in 0..10 {
        builder = builder.with_file(format!("file{i}.txt"), format!("content {i}\n"));
    }
    let project = builder.build();
    let workspace = Workspace::init(WorkspaceLocation::Explicit(project.workspace_dir())).await?;

    let mut handles = Vec::new();
    for i in 0..10 {
        let backups = workspace.backups();
        let path = project.file_path(format!("file{i}.txt"));
        handles.push(tokio::spawn(async move { backups.track(path).await }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(workspace.backups().list().await?.len(), 10);
    Ok(())
}

/// Read-only calls run alongside each other without interfering.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_reads() -> Result<()> {
    let project = TestProject::new()
        .with_file("a.txt", "a\n")
        .with_file("b.txt", "b\n")
        .build();
    let workspace = Workspace::init(WorkspaceLocation::Explicit(project.workspace_dir())).await?;
    let a = project.file_path("a.txt");
    let b = project.file_path("b.txt");
    workspace.versions().create_initial_version(&a, "a").await?;
    workspace.versions().create_initial_version(&b, "b").await?;

    let versions = workspace.versions();
    let (history_a, history_b, diff_a, status) = tokio::join!(
        versions.version_history(&a),
        versions.version_history(&b),
        versions.version_diff(&a, None, None),
        workspace.status(),
    );

    assert_eq!(history_a?.len(), 1);
    assert_eq!(history_b?.len(), 1);
    assert!(!diff_a?.has_changes);
    assert_eq!(status?.len(), 2);
    Ok(())
}

/// Separate handles on one root share locks, so no track record is lost.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tracks_through_two_handles() -> Result<()> {
    let mut builder = TestProject::new();
    for i in 0..8 {
        builder = builder.with_file(format!("file{i}.txt"), format!("content {i}\n"));
    }
    let project = builder.build();
    let location = WorkspaceLocation::Explicit(project.workspace_dir());
    let first = Workspace::init(location.clone()).await?;
    let second = Workspace::open(location).await?;

    let mut handles = Vec::new();
    for i in 0..8 {
        let workspace = if i % 2 == 0 { &first } else { &second };
        let backups = workspace.backups();
        let path = project.file_path(format!("file{i}.txt"));
        handles.push(tokio::spawn(async move { backups.track(path).await }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(first.backups().list().await?.len(), 8);
    assert_eq!(second.backups().list().await?.len(), 8);
    let backups = std::fs::read_dir(project.workspace_dir().join("backups"))?.count();
    assert_eq!(backups, 8);
    Ok(())
}

/// Clean never interleaves with a commit: any surviving store is complete.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clean_waits_for_commits() -> Result<()> {
    let mut builder = TestProject::new();
    for i in 0..6 {
        builder = builder.with_file(format!("file{i}.txt"), "v0\n");
    }
    let project = builder.build();
    let location = WorkspaceLocation::Explicit(project.workspace_dir());
    let writer = Workspace::init(location.clone()).await?;
    let cleaner = Workspace::open(location).await?;

    let mut paths = Vec::new();
    for i in 0..6 {
        let path = project.file_path(format!("file{i}.txt"));
        writer.versions().create_initial_version(&path, "initial").await?;
        std::fs::write(&path, "v1\n")?;
        paths.push(path);
    }

    let mut handles = Vec::new();
    for path in paths {
        let versions = writer.versions();
        // Commits that land after the clean fail with NotTracked
        handles.push(tokio::spawn(async move {
            let _ = versions.commit_version(&path, "edit").await;
        }));
    }
    cleaner.clean().await?;
    for handle in handles {
        handle.await?;
    }

    for entry in std::fs::read_dir(project.workspace_dir().join("versions"))? {
        let store = entry?.path();
        assert!(store.join("meta.json").is_file(), "{}", store.display());
        assert!(store.join("log.json").is_file(), "{}", store.display());
        assert!(store.join("current").is_file(), "{}", store.display());
    }
    cleaner.health_check().await?;
    Ok(())
}
