use ts_core::paths::RemotePath;

/// A file in the remote store.
///
/// Listings only carry the path; `content` stays `None` until fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: RemotePath,
    pub content: Option<Vec<u8>>,
}

impl RemoteFile {
    pub fn new(path: RemotePath) -> Self {
        Self {
            path,
            content: None,
        }
    }
}

/// A listing entry whose path cannot be mapped under a local root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEntry {
    pub path: String,
    pub reason: String,
}

/// Everything a listing returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub files: Vec<RemoteFile>,
    pub invalid: Vec<InvalidEntry>,
}

impl Listing {
    /// Split raw entry paths into usable files and invalid entries.
    pub fn from_paths(paths: impl IntoIterator<Item = String>) -> Self {
        let mut listing = Self::default();
        for raw in paths {
            match RemotePath::parse(raw.clone()) {
                Ok(path) => listing.files.push(RemoteFile::new(path)),
                Err(err) => listing.invalid.push(InvalidEntry {
                    path: raw,
                    reason: err.to_string(),
                }),
            }
        }
        listing
    }

    /// Number of entries, valid or not.
    pub fn len(&self) -> usize {
        self.files.len() + self.invalid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A file that has been built locally but not yet saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: String,
    pub content: Vec<u8>,
}

impl CandidateFile {
    pub fn new(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing was stored under the path.
    NotFound,
}
