use std::fmt;

use tracing::{debug, error, info};
use ts_core::paths::RemotePath;

/// Result of reconciling one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Deleted,
    /// Delete of a path the remote store did not have.
    NotFoundIgnored,
    /// The candidate failed validation; nothing was sent.
    ValidationFailed(Vec<String>),
    /// The remote store rejected the operation.
    RemoteError(Vec<String>),
    /// The local file could not be read.
    LocalIoFailed(String),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Created | SyncOutcome::Deleted | SyncOutcome::NotFoundIgnored
        )
    }

    /// Messages attached to a failure. Empty for successes.
    pub fn messages(&self) -> &[String] {
        match self {
            SyncOutcome::ValidationFailed(m) | SyncOutcome::RemoteError(m) => m,
            SyncOutcome::LocalIoFailed(m) => std::slice::from_ref(m),
            _ => &[],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Created => "created",
            SyncOutcome::Deleted => "deleted",
            SyncOutcome::NotFoundIgnored => "already absent",
            SyncOutcome::ValidationFailed(_) => "validation failed",
            SyncOutcome::RemoteError(_) => "remote error",
            SyncOutcome::LocalIoFailed(_) => "local read failed",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())?;
        let messages = self.messages();
        if !messages.is_empty() {
            write!(f, ": {}", messages.join("; "))?;
        }
        Ok(())
    }
}

/// An outcome keyed by the path it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOutcome {
    pub path: RemotePath,
    pub outcome: SyncOutcome,
}

impl PathOutcome {
    pub fn new(path: RemotePath, outcome: SyncOutcome) -> Self {
        Self { path, outcome }
    }

    /// Emit one log record for the outcome, plus one per failure message.
    pub fn log(&self) {
        let path = &self.path;
        match &self.outcome {
            SyncOutcome::Created => info!(path = %path, "uploaded"),
            SyncOutcome::Deleted => info!(path = %path, "deleted"),
            SyncOutcome::NotFoundIgnored => debug!(path = %path, "delete skipped, not on remote"),
            failure => {
                error!(path = %path, outcome = failure.label(), "sync failed");
                for message in failure.messages() {
                    error!(path = %path, "  {message}");
                }
            }
        }
    }
}

/// Log every outcome and return how many failed.
pub fn report(outcomes: &[PathOutcome]) -> usize {
    outcomes.iter().for_each(PathOutcome::log);
    outcomes.iter().filter(|o| !o.outcome.is_success()).count()
}
