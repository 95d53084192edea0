//! Sync engine: bulk download and the watch → reconcile loop.

pub mod aggregator;
pub mod downloader;
pub mod outcome;
pub mod reconciler;
pub mod session;
pub mod shutdown;

pub use aggregator::ChangeAggregator;
pub use downloader::{download, DownloadError, DownloadFailure, DownloadSummary};
pub use outcome::{PathOutcome, SyncOutcome};
pub use reconciler::Reconciler;
pub use session::{SessionStats, SyncError, SyncSession};
pub use shutdown::ShutdownSignal;
