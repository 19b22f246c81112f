//! Duration logging for mutating operations.
//!
//! ```rust,ignore
//! let _timing = TimingGuard::version("commit");
//! // logged when `_timing` goes out of scope
//! ```

use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SLOW: Duration = Duration::from_millis(100);
const VERY_SLOW: Duration = Duration::from_secs(2);

/// Which part of the engine an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Backup,
    Version,
    Workspace,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Component::Backup => "backup",
            Component::Version => "version",
            Component::Workspace => "workspace",
        })
    }
}

/// Logs how long it lived when dropped.
///
/// Anything under 100ms goes to debug, up to 2s to info, the rest to warn.
pub struct TimingGuard {
    component: Component,
    operation: &'static str,
    started: Instant,
    slow: Duration,
    very_slow: Duration,
}

impl TimingGuard {
    pub fn new(component: Component, operation: &'static str) -> Self {
        Self {
            component,
            operation,
            started: Instant::now(),
            slow: SLOW,
            very_slow: VERY_SLOW,
        }
    }

    pub fn backup(operation: &'static str) -> Self {
        Self::new(Component::Backup, operation)
    }

    pub fn version(operation: &'static str) -> Self {
        Self::new(Component::Version, operation)
    }

    pub fn workspace(operation: &'static str) -> Self {
        Self::new(Component::Workspace, operation)
    }

    /// Override the info and warn cut-offs.
    pub fn with_thresholds(mut self, slow: Duration, very_slow: Duration) -> Self {
        self.slow = slow;
        self.very_slow = very_slow;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        if elapsed >= self.very_slow {
            warn!(
                component = %self.component,
                operation = self.operation,
                elapsed_ms,
                "slow operation"
            );
        } else if elapsed >= self.slow {
            info!(
                component = %self.component,
                operation = self.operation,
                elapsed_ms,
                "operation finished"
            );
        } else {
            debug!(
                component = %self.component,
                operation = self.operation,
                elapsed_ms,
                "operation finished"
            );
        }
    }
}
