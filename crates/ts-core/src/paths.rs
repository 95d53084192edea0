use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors raised while translating between local and remote paths.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The local path does not live under the watch root.
    #[error("{} is outside of {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// A path component cannot be represented as UTF-8, so it has no
    /// remote spelling.
    #[error("{} is not valid UTF-8", .0.display())]
    NonUtf8(PathBuf),

    /// The string is not a well-formed remote path.
    #[error("invalid remote path {path:?}: {reason}")]
    Invalid { path: String, reason: &'static str },
}

// ---------------------------------------------------------------------------
// RemotePath
// ---------------------------------------------------------------------------

/// A path in the remote store: relative, `/`-separated, no `.`/`..` segments.
///
/// Every remote operation is keyed by a `RemotePath`, so host path syntax
/// never leaks past [`WatchRoot::relative`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Parse a remote path, rejecting anything that could escape a local root.
    pub fn parse(raw: impl Into<String>) -> Result<Self, PathError> {
        let raw = raw.into();
        match check(&raw) {
            Ok(()) => Ok(Self(raw)),
            Err(reason) => Err(PathError::Invalid { path: raw, reason }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last segment of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

fn check(raw: &str) -> Result<(), &'static str> {
    if raw.is_empty() {
        return Err("path is empty");
    }
    if raw.starts_with('/') {
        return Err("path must be relative");
    }
    if raw.contains('\\') {
        return Err("path must use forward slashes");
    }
    if raw
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err("path contains an empty, `.` or `..` segment");
    }
    Ok(())
}

impl TryFrom<String> for RemotePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

impl AsRef<str> for RemotePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// WatchRoot
// ---------------------------------------------------------------------------

/// The absolute local directory a run watches or downloads into.
///
/// Existing directories are canonicalized so that paths reported by the OS
/// watcher (which resolves symlinks on some platforms) strip cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot(PathBuf);

impl WatchRoot {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let absolute = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => std::path::absolute(path)?,
            Err(err) => return Err(err),
        };
        Ok(Self(absolute))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Remote spelling of a local path under this root.
    pub fn relative(&self, local: &Path) -> Result<RemotePath, PathError> {
        let outside = || PathError::OutsideRoot {
            path: local.to_path_buf(),
            root: self.0.clone(),
        };
        let rel = local.strip_prefix(&self.0).map_err(|_| outside())?;

        let mut segments = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(segment) => segments.push(
                    segment
                        .to_str()
                        .ok_or_else(|| PathError::NonUtf8(local.to_path_buf()))?,
                ),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(outside())
                }
            }
        }

        RemotePath::parse(segments.join("/"))
    }

    /// Local destination of a remote path under this root.
    pub fn local_path(&self, remote: &RemotePath) -> PathBuf {
        remote
            .segments()
            .fold(self.0.clone(), |acc, segment| acc.join(segment))
    }
}

impl fmt::Display for WatchRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> (tempfile::TempDir, WatchRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = WatchRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn parse_accepts_nested_paths() {
        let path = RemotePath::parse("layouts/theme.liquid").unwrap();
        assert_eq!(path.as_str(), "layouts/theme.liquid");
        assert_eq!(path.file_name(), "theme.liquid");
        assert_eq!(path.segments().collect::<Vec<_>>(), ["layouts", "theme.liquid"]);
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        for raw in ["", "/abs.txt", "a//b", "a/./b", "../escape", "a/..", "dir\\file", "trailing/"] {
            assert!(
                matches!(RemotePath::parse(raw), Err(PathError::Invalid { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn serde_goes_through_validation() {
        let ok: RemotePath = serde_json::from_str("\"a/b.txt\"").unwrap();
        assert_eq!(ok.as_str(), "a/b.txt");
        assert!(serde_json::from_str::<RemotePath>("\"../etc/passwd\"").is_err());
    }

    #[test]
    fn relative_uses_forward_slashes() {
        let (_dir, root) = root();
        let local = root.path().join("assets").join("css").join("main.css");
        let remote = root.relative(&local).unwrap();
        assert_eq!(remote.as_str(), "assets/css/main.css");
    }

    #[test]
    fn relative_rejects_paths_outside_root() {
        let (_dir, root) = root();
        let err = root.relative(Path::new("/definitely/elsewhere.txt")).unwrap_err();
        assert!(matches!(err, PathError::OutsideRoot { .. }));
    }

    #[test]
    fn relative_rejects_the_root_itself() {
        let (_dir, root) = root();
        assert!(root.relative(root.path()).is_err());
    }

    #[test]
    fn remote_path_round_trips_to_local() {
        let (_dir, root) = root();
        let remote = RemotePath::parse("a/b/c.txt").unwrap();
        let local = root.local_path(&remote);
        assert_eq!(local, root.path().join("a").join("b").join("c.txt"));
        assert_eq!(root.relative(&local).unwrap(), remote);
    }

    #[test]
    fn missing_root_is_made_absolute() {
        let (dir, _) = root();
        let missing = dir.path().join("not-yet");
        let root = WatchRoot::new(&missing).unwrap();
        assert!(root.path().is_absolute());
        assert!(root.path().ends_with("not-yet"));
    }

    #[cfg(windows)]
    #[test]
    fn backslashes_become_forward_slashes() {
        let root = WatchRoot(PathBuf::from(r"C:\themes\shop"));
        let remote = root.relative(Path::new(r"C:\themes\shop\layouts\a.liquid")).unwrap();
        assert_eq!(remote.as_str(), "layouts/a.liquid");
    }
}
