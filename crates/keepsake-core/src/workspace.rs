//! Workspace lifecycle.
//!
//! A workspace is the directory holding all tracking metadata:
//!
//! ```text
//! <root>/
//!   config.json              version, creation time, kind, settings
//!   state.json               backup-mode tracked files
//!   backups/<hash>           backup copies
//!   versions/<hash>/log.json version records
//!   versions/<hash>/current  checked-out version number
//!   versions/<hash>/meta.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use keepsake_core::{Workspace, WorkspaceLocation};
//!
//! let workspace = Workspace::open_or_init(WorkspaceLocation::from_env()).await?;
//! workspace.backups().track("notes.txt").await?;
//! ```

use crate::backup::BackupTracker;
use crate::config::Settings;
use crate::diff::DiffOptions;
use crate::error::{CoreError, CoreResult, TrackingMode};
use crate::lock::FileLocks;
use crate::record::{BackupState, FileKey, TrackedFile};
use crate::version::VersionManager;
use chrono::{DateTime, Utc};
use keepsake_storage::{JsonStorage, Storage, StorageError};
use keepsake_util::{fs, ErrorKind, TimingGuard};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit workspace root.
pub const WORKSPACE_ENV: &str = "KEEPSAKE_WORKSPACE";

/// Layout version written to `config.json`.
pub const CONFIG_VERSION: u32 = 1;

const CONFIG_KEY: &[&str] = &["config"];
const STATE_KEY: &[&str] = &["state"];

/// How a workspace root was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceKind {
    Local,
    Temporary,
    Explicit,
}

/// Where a workspace lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceLocation {
    /// `.keepsake` under the current directory.
    Local,
    /// `keepsake` under the system temp directory.
    Temporary,
    /// A caller-chosen root.
    Explicit(PathBuf),
}

impl WorkspaceLocation {
    /// `Explicit` if `KEEPSAKE_WORKSPACE` is set, `Local` otherwise.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup(WORKSPACE_ENV) {
            Some(root) if !root.trim().is_empty() => Self::Explicit(PathBuf::from(root)),
            _ => Self::Local,
        }
    }

    pub fn kind(&self) -> WorkspaceKind {
        match self {
            Self::Local => WorkspaceKind::Local,
            Self::Temporary => WorkspaceKind::Temporary,
            Self::Explicit(_) => WorkspaceKind::Explicit,
        }
    }

    /// Absolute root directory for this location.
    pub fn root(&self) -> CoreResult<PathBuf> {
        match self {
            Self::Local => {
                let cwd = std::env::current_dir()
                    .map_err(|e| keepsake_util::Error::from_io(e, Path::new(".")))?;
                Ok(keepsake_util::path::local_workspace_dir(&cwd))
            }
            Self::Temporary => Ok(keepsake_util::path::temp_workspace_dir()),
            Self::Explicit(path) => Ok(keepsake_util::path::absolute(path)?),
        }
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub kind: WorkspaceKind,
    #[serde(default)]
    pub settings: Settings,
}

/// Summary returned by [`Workspace::info`] and [`Workspace::inspect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceInfo {
    pub path: PathBuf,
    pub kind: WorkspaceKind,
    pub exists: bool,
    pub is_healthy: bool,
    pub tracked_files: usize,
    pub versioned_files: usize,
    pub created_at: Option<DateTime<Utc>>,
}

/// Which mode, if any, a file is supervised in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingState {
    Untracked,
    Backup(TrackedFile),
    Versioned { current: u32, latest: u32 },
}

impl TrackingState {
    pub fn mode(&self) -> Option<TrackingMode> {
        match self {
            Self::Untracked => None,
            Self::Backup(_) => Some(TrackingMode::Backup),
            Self::Versioned { .. } => Some(TrackingMode::Versioned),
        }
    }

    pub fn is_tracked(&self) -> bool {
        !matches!(self, Self::Untracked)
    }
}

/// One line of [`Workspace::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub path: PathBuf,
    pub mode: TrackingMode,
    pub has_changes: bool,
    /// Checked-out version for versioned files.
    pub current_version: Option<u32>,
}

/// An opened workspace. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Workspace {
    inner: Arc<WorkspaceInner>,
}

#[derive(Debug)]
struct WorkspaceInner {
    root: PathBuf,
    storage: JsonStorage,
    config: WorkspaceConfig,
    /// Persisted settings with environment overrides applied.
    settings: Settings,
    locks: Arc<FileLocks>,
}

impl Workspace {
    /// Create a workspace with default settings.
    pub async fn init(location: WorkspaceLocation) -> CoreResult<Self> {
        Self::init_with(location, Settings::default()).await
    }

    /// Create a workspace with the given persisted settings.
    pub async fn init_with(location: WorkspaceLocation, settings: Settings) -> CoreResult<Self> {
        let _timing = TimingGuard::workspace("init");
        let root = location.root()?;
        let storage = JsonStorage::new(&root);

        if storage.exists(CONFIG_KEY).await? {
            return Err(CoreError::AlreadyInitialized(root));
        }

        fs::create_dir_all(&root).await?;
        fs::create_dir_all(&root.join("backups")).await?;
        fs::create_dir_all(&root.join("versions")).await?;

        let config = WorkspaceConfig {
            version: CONFIG_VERSION,
            created_at: Utc::now(),
            kind: location.kind(),
            settings,
        };
        storage.write(STATE_KEY, &BackupState::default()).await?;
        // Config last: its presence marks the workspace as initialized.
        storage.write(CONFIG_KEY, &config).await?;

        info!(root = %root.display(), kind = ?config.kind, "Initialized workspace");
        Ok(Self::from_parts(root, storage, config))
    }

    /// Open an existing workspace.
    pub async fn open(location: WorkspaceLocation) -> CoreResult<Self> {
        let root = location.root()?;
        let storage = JsonStorage::new(&root);

        let config = load_config(&root, &storage).await?;
        load_state_from(&root, &storage).await?;

        debug!(root = %root.display(), "Opened workspace");
        Ok(Self::from_parts(root, storage, config))
    }

    /// Open the workspace, creating it first if needed.
    pub async fn open_or_init(location: WorkspaceLocation) -> CoreResult<Self> {
        match Self::open(location.clone()).await {
            Err(CoreError::WorkspaceNotFound(_)) => Self::init(location).await,
            other => other,
        }
    }

    /// Describe a location without requiring it to be a healthy workspace.
    pub async fn inspect(location: WorkspaceLocation) -> CoreResult<WorkspaceInfo> {
        match Self::open(location.clone()).await {
            Ok(workspace) => Ok(workspace.info().await),
            Err(CoreError::WorkspaceNotFound(_)) | Err(CoreError::WorkspaceCorrupted { .. }) => {
                let root = location.root()?;
                let storage = JsonStorage::new(&root);
                let created_at = storage
                    .read::<WorkspaceConfig>(CONFIG_KEY)
                    .await
                    .ok()
                    .flatten()
                    .map(|c| c.created_at);

                Ok(WorkspaceInfo {
                    exists: fs::exists(&root).await,
                    path: root,
                    kind: location.kind(),
                    is_healthy: false,
                    tracked_files: 0,
                    versioned_files: 0,
                    created_at,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn from_parts(root: PathBuf, storage: JsonStorage, config: WorkspaceConfig) -> Self {
        let settings = config.settings.clone().with_env_overrides();
        let locks = FileLocks::for_root(&root);
        Self {
            inner: Arc::new(WorkspaceInner {
                root,
                storage,
                config,
                settings,
                locks,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.inner.config
    }

    /// Effective settings, including environment overrides.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn backups(&self) -> BackupTracker {
        BackupTracker::new(self.clone())
    }

    pub fn versions(&self) -> VersionManager {
        VersionManager::new(self.clone())
    }

    /// Verify that the required metadata is present and parseable.
    pub async fn health_check(&self) -> CoreResult<()> {
        load_config(self.root(), &self.inner.storage).await?;
        load_state_from(self.root(), &self.inner.storage).await?;
        Ok(())
    }

    pub async fn info(&self) -> WorkspaceInfo {
        let is_healthy = match self.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(root = %self.root().display(), error = %e, "Workspace is unhealthy");
                false
            }
        };

        let tracked_files = match self.load_state().await {
            Ok(state) => state.tracked_files.len(),
            Err(_) => 0,
        };
        let versioned_files = self.versions().list().await.map(|v| v.len()).unwrap_or(0);

        WorkspaceInfo {
            path: self.root().to_path_buf(),
            kind: self.inner.config.kind,
            exists: fs::exists(self.root()).await,
            is_healthy,
            tracked_files,
            versioned_files,
            created_at: Some(self.inner.config.created_at),
        }
    }

    /// Drop every backup and version store and reset `state.json`.
    ///
    /// The root directory and `config.json` are kept.
    pub async fn clean(&self) -> CoreResult<()> {
        let _timing = TimingGuard::workspace("clean");
        let _all = self.inner.locks.exclusive().await;

        let previous = self.load_state().await.map(|s| s.tracked_files.len()).ok();

        for dir in [self.backups_dir(), self.versions_dir()] {
            fs::remove_dir_all(&dir).await?;
            fs::create_dir_all(&dir).await?;
        }
        self.inner
            .storage
            .write(STATE_KEY, &BackupState::default())
            .await?;

        info!(
            root = %self.root().display(),
            tracked_files = ?previous,
            "Cleaned workspace"
        );
        Ok(())
    }

    /// Which mode `path` is currently supervised in.
    pub async fn tracking_state(&self, path: impl AsRef<Path>) -> CoreResult<TrackingState> {
        let key = FileKey::resolve(path.as_ref())?;
        self.tracking_state_for(&key).await
    }

    pub(crate) async fn tracking_state_for(&self, key: &FileKey) -> CoreResult<TrackingState> {
        let state = self.load_state().await?;
        if let Some(file) = state.find(&key.path) {
            return Ok(TrackingState::Backup(file.clone()));
        }

        let versions = self.versions();
        if versions.store_exists(key).await {
            let history = versions.load_history(key).await?;
            return Ok(TrackingState::Versioned {
                current: history.current_version,
                latest: history.latest_version(),
            });
        }

        Ok(TrackingState::Untracked)
    }

    /// Every supervised file with its change flag.
    ///
    /// Files that cannot be read are skipped rather than failing the listing.
    pub async fn status(&self) -> CoreResult<Vec<FileStatus>> {
        let mut statuses = Vec::new();

        let backups = self.backups();
        for file in backups.list().await? {
            match backups.has_changes(&file.path).await {
                Ok(has_changes) => statuses.push(FileStatus {
                    path: file.path,
                    mode: TrackingMode::Backup,
                    has_changes,
                    current_version: None,
                }),
                Err(e) => warn!(path = %file.path.display(), error = %e, "Skipping unreadable file"),
            }
        }

        let versions = self.versions();
        for file in versions.list().await? {
            match versions.has_changes(&file.path).await {
                Ok(has_changes) => statuses.push(FileStatus {
                    path: file.path,
                    mode: TrackingMode::Versioned,
                    has_changes,
                    current_version: Some(file.current_version),
                }),
                Err(e) => warn!(path = %file.path.display(), error = %e, "Skipping unreadable file"),
            }
        }

        Ok(statuses)
    }

    pub(crate) fn storage(&self) -> &JsonStorage {
        &self.inner.storage
    }

    pub(crate) fn locks(&self) -> &Arc<FileLocks> {
        &self.inner.locks
    }

    pub(crate) fn backups_dir(&self) -> PathBuf {
        self.root().join("backups")
    }

    pub(crate) fn versions_dir(&self) -> PathBuf {
        self.root().join("versions")
    }

    pub(crate) fn state_path(&self) -> CoreResult<PathBuf> {
        Ok(self.inner.storage.path_for(STATE_KEY)?)
    }

    pub(crate) fn diff_options(&self, old_label: String, new_label: String) -> DiffOptions {
        self.inner.settings.diff_options(old_label, new_label)
    }

    pub(crate) async fn load_state(&self) -> CoreResult<BackupState> {
        load_state_from(self.root(), &self.inner.storage).await
    }

    /// Read a supervised file as text.
    ///
    /// A missing file is `NotFound`; oversized or non UTF-8 content is
    /// `InvalidContent`.
    pub(crate) async fn read_text(&self, path: &Path) -> CoreResult<String> {
        let bytes = self.read_bytes(path).await?;
        String::from_utf8(bytes)
            .map_err(|_| CoreError::invalid_content(path, "content is not valid UTF-8"))
    }

    /// Read a supervised file, enforcing `max_file_size`.
    pub(crate) async fn read_bytes(&self, path: &Path) -> CoreResult<Vec<u8>> {
        self.check_file(path).await?;
        fs::read(path).await.map_err(|e| not_found_or(e, path))
    }

    /// Ensure `path` is a regular file within `max_file_size`.
    pub(crate) async fn check_file(&self, path: &Path) -> CoreResult<u64> {
        let stat = fs::stat(path).await.map_err(|e| not_found_or(e, path))?;
        if !stat.is_file {
            return Err(CoreError::invalid_content(path, "not a regular file"));
        }

        let limit = self.inner.settings.max_file_size;
        if stat.len > limit {
            return Err(CoreError::invalid_content(
                path,
                format!("file is {} bytes, limit is {limit}", stat.len),
            ));
        }

        Ok(stat.len)
    }
}

fn not_found_or(err: keepsake_util::Error, path: &Path) -> CoreError {
    match err.kind() {
        ErrorKind::NotFound => CoreError::NotFound(path.to_path_buf()),
        _ => err.into(),
    }
}

async fn load_config(root: &Path, storage: &JsonStorage) -> CoreResult<WorkspaceConfig> {
    if !fs::exists(root).await {
        return Err(CoreError::WorkspaceNotFound(root.to_path_buf()));
    }

    match storage.read::<WorkspaceConfig>(CONFIG_KEY).await {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Err(CoreError::WorkspaceNotFound(root.to_path_buf())),
        Err(e) => Err(corrupted_or(e, root)),
    }
}

async fn load_state_from(root: &Path, storage: &JsonStorage) -> CoreResult<BackupState> {
    match storage.read::<BackupState>(STATE_KEY).await {
        Ok(Some(state)) => Ok(state),
        Ok(None) => Err(CoreError::corrupted(root, "state.json is missing")),
        Err(e) => Err(corrupted_or(e, root)),
    }
}

fn corrupted_or(err: StorageError, root: &Path) -> CoreError {
    if err.is_corrupt() {
        CoreError::corrupted(root, err.to_string())
    } else {
        err.into()
    }
}
