//! Remote store boundary for theme-sync.
//!
//! Everything the sync engine knows about the remote side goes through the
//! [`RemoteStore`] trait: listing, fetching content, building and validating
//! candidates, saving and deleting by path. Two implementations ship here:
//!
//! - [`http::ThemeApiClient`]: the theme file API over HTTP (`reqwest`)
//! - [`memory::MemoryStore`]: an in-memory store for tests

pub mod http;
pub mod memory;
pub mod types;
pub mod validation;

use async_trait::async_trait;
use thiserror::Error;
use ts_core::paths::{PathError, RemotePath};

pub use types::{CandidateFile, DeleteOutcome, InvalidEntry, Listing, RemoteFile};
pub use validation::ValidationRules;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when talking to the remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The store rejected the credential (HTTP 401/403).
    #[error("unauthorized: {}", .0.join("; "))]
    Unauthorized(Vec<String>),

    /// The addressed file does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The store answered with an error status. `messages` holds the
    /// server-provided messages in order.
    #[error("remote store error ({status}): {}", messages.join("; "))]
    Api { status: u16, messages: Vec<String> },

    /// No authorization token was supplied to the client.
    #[error("missing authorization token")]
    MissingToken,

    /// The store returned a path that is not a valid remote path.
    #[error("invalid remote path: {0}")]
    InvalidPath(#[from] PathError),

    /// Failed to serialize or deserialize JSON data.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// An HTTP-level error occurred (connection, timeout, body decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RemoteError {
    /// Human-readable messages suitable for per-path reporting.
    pub fn messages(&self) -> Vec<String> {
        match self {
            RemoteError::Api { messages, .. } | RemoteError::Unauthorized(messages)
                if !messages.is_empty() =>
            {
                messages.clone()
            }
            other => vec![other.to_string()],
        }
    }
}

/// Result type alias for remote store operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

// ---------------------------------------------------------------------------
// RemoteStore trait
// ---------------------------------------------------------------------------

/// The narrow contract the sync engine needs from a remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List files. Entries carry metadata only; content is fetched
    /// separately with [`RemoteStore::fetch_content`]. Entries with unusable
    /// paths are returned in [`Listing::invalid`] rather than dropped.
    async fn list(&self, recursive: bool) -> Result<Listing>;

    /// Fetch a file's content.
    async fn fetch_content(&self, file: &RemoteFile) -> Result<Vec<u8>>;

    /// Build an unsaved candidate for `path`.
    fn build(&self, path: &RemotePath, content: Vec<u8>) -> CandidateFile {
        CandidateFile::new(path.as_str(), content)
    }

    /// Check a candidate against the store's rules before sending it.
    fn validate(&self, candidate: &CandidateFile) -> std::result::Result<(), Vec<String>>;

    /// Create a file from a candidate.
    async fn save(&self, candidate: CandidateFile) -> Result<()>;

    /// Delete a file. A missing file is reported as
    /// [`DeleteOutcome::NotFound`], not as an error.
    async fn delete(&self, path: &RemotePath) -> Result<DeleteOutcome>;
}
