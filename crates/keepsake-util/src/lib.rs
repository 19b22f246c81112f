//! Shared utilities for keepsake.
//!
//! This crate provides the low-level building blocks used across the keepsake workspace:
//! - Error handling patterns with typed error kinds
//! - Filesystem primitives with typed failures
//! - Deterministic content and path hashing
//! - Logging setup with tracing
//! - Path utilities
//! - RAII-based timing for operation measurement

pub mod error;
pub mod fs;
pub mod hash;
pub mod log;
pub mod path;
pub mod timing;

pub use error::{Error, ErrorKind, Result};
pub use fs::FileStat;
pub use timing::TimingGuard;
