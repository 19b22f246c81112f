//! Compensating file transactions.
//!
//! A [`Transaction`] runs a list of [`FileOperation`]s in order. Each applied
//! operation leaves a rollback token describing how to undo it; if a later
//! operation fails, the completed ones are undone in reverse order and the
//! original error is returned.
//!
//! The guarantee only holds inside one process: nothing is journaled to disk,
//! so a crash in the middle of [`Transaction::execute`] can leave partial
//! results behind. Single-file creates and writes go through a temp file and a
//! rename, so no file is ever observed half-written.

use crate::{CoreError, CoreResult};
use keepsake_util::fs;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

/// A single step of a transaction.
#[derive(Debug, Clone)]
pub enum FileOperation {
    /// Create a new file. Fails if the target exists.
    Create { path: PathBuf, content: Vec<u8> },
    /// Copy a file, replacing the destination.
    Copy { from: PathBuf, to: PathBuf },
    /// Move a file, replacing the destination.
    Move { from: PathBuf, to: PathBuf },
    /// Delete an existing file.
    Delete { path: PathBuf },
    /// Write a file, replacing or creating it.
    Write { path: PathBuf, content: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Copy,
    Move,
    Delete,
    Write,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Copy => "copy",
            OperationKind::Move => "move",
            OperationKind::Delete => "delete",
            OperationKind::Write => "write",
        };
        f.write_str(name)
    }
}

impl FileOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            FileOperation::Create { .. } => OperationKind::Create,
            FileOperation::Copy { .. } => OperationKind::Copy,
            FileOperation::Move { .. } => OperationKind::Move,
            FileOperation::Delete { .. } => OperationKind::Delete,
            FileOperation::Write { .. } => OperationKind::Write,
        }
    }

    /// The file this operation changes.
    pub fn target(&self) -> &Path {
        match self {
            FileOperation::Create { path, .. }
            | FileOperation::Delete { path }
            | FileOperation::Write { path, .. } => path,
            FileOperation::Copy { to, .. } | FileOperation::Move { to, .. } => to,
        }
    }

    async fn apply(&self) -> CoreResult<RollbackToken> {
        match self {
            FileOperation::Create { path, content } => {
                if fs::exists(path).await {
                    return Err(keepsake_util::Error::new(
                        keepsake_util::ErrorKind::AlreadyExists,
                        "already exists",
                    )
                    .at(path)
                    .into());
                }
                fs::write_atomic(path, content).await?;
                Ok(RollbackToken::RemoveCreated { path: path.clone() })
            }
            FileOperation::Copy { from, to } => {
                let previous = fs::read_optional(to).await?;
                fs::copy(from, to).await?;
                Ok(RollbackToken::Restore {
                    path: to.clone(),
                    previous,
                })
            }
            FileOperation::Move { from, to } => {
                let displaced = fs::read_optional(to).await?;
                fs::rename(from, to).await?;
                Ok(RollbackToken::MoveBack {
                    from: from.clone(),
                    to: to.clone(),
                    displaced,
                })
            }
            FileOperation::Delete { path } => {
                let content = fs::read(path).await?;
                fs::remove_file(path).await?;
                Ok(RollbackToken::Restore {
                    path: path.clone(),
                    previous: Some(content),
                })
            }
            FileOperation::Write { path, content } => {
                let previous = fs::read_optional(path).await?;
                fs::write_atomic(path, content).await?;
                Ok(RollbackToken::Restore {
                    path: path.clone(),
                    previous,
                })
            }
        }
    }
}

/// How to undo one applied operation.
#[derive(Debug)]
enum RollbackToken {
    /// Remove a file the transaction created.
    RemoveCreated { path: PathBuf },
    /// Put back the prior bytes of a path, or remove it if it did not exist.
    Restore {
        path: PathBuf,
        previous: Option<Vec<u8>>,
    },
    /// Move a file back to its source and restore whatever it replaced.
    MoveBack {
        from: PathBuf,
        to: PathBuf,
        displaced: Option<Vec<u8>>,
    },
}

impl RollbackToken {
    async fn undo(&self) -> keepsake_util::Result<()> {
        match self {
            RollbackToken::RemoveCreated { path } => {
                fs::remove_file_if_exists(path).await?;
            }
            RollbackToken::Restore {
                path,
                previous: Some(bytes),
            } => fs::write_atomic(path, bytes).await?,
            RollbackToken::Restore {
                path,
                previous: None,
            } => {
                fs::remove_file_if_exists(path).await?;
            }
            RollbackToken::MoveBack {
                from,
                to,
                displaced,
            } => {
                fs::rename(to, from).await?;
                if let Some(bytes) = displaced {
                    fs::write_atomic(to, bytes).await?;
                }
            }
        }
        Ok(())
    }

    fn path(&self) -> &Path {
        match self {
            RollbackToken::RemoveCreated { path } | RollbackToken::Restore { path, .. } => path,
            RollbackToken::MoveBack { to, .. } => to,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Committed,
    RolledBack,
}

/// An ordered batch of file operations with in-process rollback.
#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    operations: Vec<FileOperation>,
    completed: Vec<RollbackToken>,
    state: TransactionState,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            operations: Vec::new(),
            completed: Vec::new(),
            state: TransactionState::Pending,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn operations(&self) -> &[FileOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Queue an operation. Fails once the transaction is terminal.
    pub fn add(&mut self, operation: FileOperation) -> CoreResult<&mut Self> {
        if self.state != TransactionState::Pending {
            return Err(CoreError::TransactionClosed);
        }
        self.operations.push(operation);
        Ok(self)
    }

    pub fn create(
        &mut self,
        path: impl Into<PathBuf>,
        content: impl Into<Vec<u8>>,
    ) -> CoreResult<&mut Self> {
        self.add(FileOperation::Create {
            path: path.into(),
            content: content.into(),
        })
    }

    pub fn copy(
        &mut self,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
    ) -> CoreResult<&mut Self> {
        self.add(FileOperation::Copy {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn move_file(
        &mut self,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
    ) -> CoreResult<&mut Self> {
        self.add(FileOperation::Move {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn delete(&mut self, path: impl Into<PathBuf>) -> CoreResult<&mut Self> {
        self.add(FileOperation::Delete { path: path.into() })
    }

    pub fn write(
        &mut self,
        path: impl Into<PathBuf>,
        content: impl Into<Vec<u8>>,
    ) -> CoreResult<&mut Self> {
        self.add(FileOperation::Write {
            path: path.into(),
            content: content.into(),
        })
    }

    /// Apply every queued operation in order.
    ///
    /// On the first failure the completed operations are rolled back and the
    /// failure is returned. Either way the transaction is terminal afterwards.
    pub async fn execute(&mut self) -> CoreResult<()> {
        if self.state != TransactionState::Pending {
            return Err(CoreError::TransactionClosed);
        }

        let span = info_span!("transaction", id = %self.id, ops = self.operations.len());
        self.run().instrument(span).await
    }

    async fn run(&mut self) -> CoreResult<()> {
        for index in 0..self.operations.len() {
            let operation = &self.operations[index];
            debug!(
                index,
                kind = %operation.kind(),
                target = %operation.target().display(),
                "Applying operation"
            );

            let outcome = operation.apply().await;
            match outcome {
                Ok(token) => self.completed.push(token),
                Err(e) => {
                    warn!(
                        index,
                        kind = %operation.kind(),
                        target = %operation.target().display(),
                        error = %e,
                        "Operation failed, rolling back"
                    );
                    self.rollback().await;
                    return Err(e);
                }
            }
        }

        self.completed.clear();
        self.state = TransactionState::Committed;
        debug!("Transaction committed");
        Ok(())
    }

    /// Undo completed operations in reverse order.
    ///
    /// Failures are logged and skipped so they never replace the error that
    /// triggered the rollback. Returns how many undo steps failed.
    pub async fn rollback(&mut self) -> usize {
        if self.state != TransactionState::Pending {
            return 0;
        }

        let mut failures = 0;
        while let Some(token) = self.completed.pop() {
            if let Err(e) = token.undo().await {
                failures += 1;
                error!(
                    transaction = %self.id,
                    path = %token.path().display(),
                    error = %e,
                    "Rollback step failed"
                );
            }
        }

        self.state = TransactionState::RolledBack;
        failures
    }
}
