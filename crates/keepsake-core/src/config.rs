//! Engine settings.
//!
//! Settings live in the `settings` section of the workspace `config.json` and
//! can be overridden from the environment:
//! - `KEEPSAKE_DIFF_STRATEGY` - `aligned` or `positional`
//! - `KEEPSAKE_DIFF_CONTEXT` - context lines around aligned diff hunks
//! - `KEEPSAKE_MAX_FILE_SIZE` - largest file accepted for tracking, in bytes
//!
//! The workspace location itself is resolved from `KEEPSAKE_WORKSPACE`, see
//! [`WorkspaceLocation::from_env`](crate::WorkspaceLocation::from_env).

use crate::diff::{DiffOptions, DiffStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default upper bound for tracked files (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Diff presentation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffSettings {
    pub strategy: DiffStrategy,
    pub context_lines: usize,
}

impl Default for DiffSettings {
    fn default() -> Self {
        Self {
            strategy: DiffStrategy::Aligned,
            context_lines: 3,
        }
    }
}

/// Engine settings stored with the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub diff: DiffSettings,
    pub max_file_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            diff: DiffSettings::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Settings {
    /// Apply `KEEPSAKE_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("KEEPSAKE_DIFF_STRATEGY") {
            match value.parse() {
                Ok(strategy) => self.diff.strategy = strategy,
                Err(e) => warn!(value = %value, error = %e, "Ignoring KEEPSAKE_DIFF_STRATEGY"),
            }
        }

        if let Some(value) = lookup("KEEPSAKE_DIFF_CONTEXT") {
            match value.trim().parse() {
                Ok(lines) => self.diff.context_lines = lines,
                Err(e) => warn!(value = %value, error = %e, "Ignoring KEEPSAKE_DIFF_CONTEXT"),
            }
        }

        if let Some(value) = lookup("KEEPSAKE_MAX_FILE_SIZE") {
            match value.trim().parse() {
                Ok(bytes) => self.max_file_size = bytes,
                Err(e) => warn!(value = %value, error = %e, "Ignoring KEEPSAKE_MAX_FILE_SIZE"),
            }
        }

        self
    }

    /// Diff options for comparing `old_label` against `new_label`.
    pub fn diff_options(
        &self,
        old_label: impl Into<String>,
        new_label: impl Into<String>,
    ) -> DiffOptions {
        DiffOptions {
            strategy: self.diff.strategy,
            context_lines: self.diff.context_lines,
            old_label: old_label.into(),
            new_label: new_label.into(),
        }
    }
}
