use ts_core::config::RemoteConfig;

use crate::types::CandidateFile;

/// Longest path the store accepts, in characters.
pub const DEFAULT_MAX_PATH_LEN: usize = 255;

/// Rules a candidate must pass before it is sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub max_path_len: usize,
    pub max_file_bytes: u64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from_config(&RemoteConfig::default())
    }
}

impl ValidationRules {
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            max_path_len: DEFAULT_MAX_PATH_LEN,
            max_file_bytes: config.max_file_bytes,
        }
    }

    /// Check every rule and return all violations in a stable order.
    pub fn validate(&self, candidate: &CandidateFile) -> Result<(), Vec<String>> {
        let mut messages = Vec::new();
        let path = candidate.path.as_str();

        if path.trim().is_empty() {
            messages.push("Path can't be blank".to_string());
        } else {
            if path.starts_with('/') {
                messages.push("Path must be relative".to_string());
            }
            if path.contains('\\') {
                messages.push("Path must use forward slashes".to_string());
            }
            if path
                .trim_start_matches('/')
                .split('/')
                .any(|s| s.is_empty() || s == "." || s == "..")
            {
                messages.push("Path contains an invalid segment".to_string());
            }
            if path.chars().count() > self.max_path_len {
                messages.push(format!(
                    "Path is too long (maximum is {} characters)",
                    self.max_path_len
                ));
            }
        }

        if candidate.content.len() as u64 > self.max_file_bytes {
            messages.push(format!(
                "Content is too large (maximum is {} bytes)",
                self.max_file_bytes
            ));
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(messages)
        }
    }
}
