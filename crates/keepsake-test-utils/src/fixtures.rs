//! Temporary project directories for tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directory name used for the workspace inside a test project.
pub const WORKSPACE_DIR: &str = ".keepsake";

/// A temporary project with a configurable set of files.
///
/// # Example
///
/// ```rust
/// use keepsake_test_utils::fixtures::TestProject;
///
/// let project = TestProject::new()
///     .with_file("notes.txt", "line1\nline2\n")
///     .with_file("docs/todo.md", "- write tests\n")
///     .build();
///
/// assert!(project.file_path("docs/todo.md").exists());
/// ```
pub struct TestProject {
    temp_dir: TempDir,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("temp dir"),
            files: BTreeMap::new(),
        }
    }

    /// Add a file, relative to the project root.
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Self {
        self.files
            .insert(path.as_ref().to_path_buf(), contents.as_ref().to_vec());
        self
    }

    /// Create all files on disk.
    pub fn build(self) -> BuiltTestProject {
        for (path, contents) in &self.files {
            put(&self.temp_dir.path().join(path), contents);
        }
        BuiltTestProject {
            temp_dir: self.temp_dir,
        }
    }
}

/// Write `contents` to `path`, creating missing parents. Panics on failure.
fn put(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("cannot create {}: {e}", parent.display()));
    }
    fs::write(path, contents).unwrap_or_else(|e| panic!("cannot write {}: {e}", path.display()));
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A project whose files exist on disk. Removed on drop.
pub struct BuiltTestProject {
    temp_dir: TempDir,
}

impl BuiltTestProject {
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of a project file.
    pub fn file_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.path().join(path.as_ref())
    }

    /// Where tests should put their workspace.
    pub fn workspace_dir(&self) -> PathBuf {
        self.path().join(WORKSPACE_DIR)
    }

    pub fn read(&self, path: impl AsRef<Path>) -> String {
        let path = self.file_path(path);
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
    }

    /// Overwrite a file, as a user editing it would.
    pub fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        put(&self.file_path(path), contents.as_ref());
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = self.file_path(path);
        fs::remove_file(&path).unwrap_or_else(|e| panic!("cannot remove {}: {e}", path.display()));
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.file_path(path).exists()
    }
}

/// Keeps a directory read-only until dropped.
#[cfg(unix)]
pub struct ReadOnlyDir {
    path: PathBuf,
}

#[cfg(unix)]
impl ReadOnlyDir {
    /// Drop write permission on `dir`.
    ///
    /// Returns `None`, leaving the directory writable, when the current user
    /// bypasses permission checks (root), so the caller can skip.
    pub fn new(dir: impl Into<PathBuf>) -> Option<Self> {
        let guard = Self { path: dir.into() };
        set_mode(&guard.path, 0o555);

        let check = guard.path.join(".write-check");
        if fs::write(&check, b"").is_ok() {
            let _ = fs::remove_file(&check);
            return None;
        }
        Some(guard)
    }
}

#[cfg(unix)]
impl Drop for ReadOnlyDir {
    fn drop(&mut self) {
        set_mode(&self.path, 0o755);
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .unwrap_or_else(|e| panic!("cannot chmod {}: {e}", path.display()));
}

/// Common file contents.
pub mod content {
    pub const NOTES: &str = "line1\nline2\n";
    pub const NOTES_EDITED: &str = "line1\nchanged\n";
    pub const NOTES_BRANCHED: &str = "line1\nnewpath\n";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_creates_nested_files() {
        let project = TestProject::new()
            .with_file("a.txt", "a")
            .with_file("nested/dir/b.txt", "b")
            .build();

        assert_eq!(project.read("a.txt"), "a");
        assert_eq!(project.read("nested/dir/b.txt"), "b");
        assert!(!project.workspace_dir().exists());
    }

    #[test]
    fn test_write_and_remove() {
        let project = TestProject::new().with_file("a.txt", "a").build();
        project.write("a.txt", "changed");
        assert_eq!(project.read("a.txt"), "changed");

        project.remove("a.txt");
        assert!(!project.exists("a.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_dir_restores_on_drop() {
        let project = TestProject::new().with_file("locked/a.txt", "a").build();
        let dir = project.file_path("locked");

        if let Some(guard) = ReadOnlyDir::new(&dir) {
            assert!(fs::write(dir.join("b.txt"), "b").is_err());
            drop(guard);
        }
        project.write("locked/b.txt", "b");
        assert!(!project.exists("locked/.write-check"));
    }
}
