use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use ts_core::config::RemoteConfig;
use ts_core::credentials::Credential;
use ts_core::paths::RemotePath;

use crate::types::{CandidateFile, DeleteOutcome, Listing, RemoteFile};
use crate::validation::ValidationRules;
use crate::{RemoteError, RemoteStore, Result};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the theme file API.
///
/// Files live under `{base_url}/files/{path}`; the credential is sent
/// verbatim in the `Authorization` header.
#[derive(Debug, Clone)]
pub struct ThemeApiClient {
    base_url: String,
    credential: Credential,
    client: reqwest::Client,
    rules: ValidationRules,
}

#[derive(Deserialize)]
struct ListEntry {
    path: String,
}

impl ThemeApiClient {
    pub fn new(config: &RemoteConfig, credential: Credential) -> Result<Self> {
        if credential.expose().is_empty() {
            return Err(RemoteError::MissingToken);
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("theme-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credential,
            client,
            rules: ValidationRules::from_config(config),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a single file, with every segment percent-encoded.
    pub fn file_url(&self, path: &str) -> String {
        let encoded: Vec<_> = path.split('/').map(urlencoding::encode).collect();
        format!("{}/files/{}", self.base_url, encoded.join("/"))
    }

    // -- request helpers ----------------------------------------------------

    async fn send(&self, request: reqwest::RequestBuilder, path: &str) -> Result<Response> {
        let resp = request
            .header("Authorization", self.credential.expose())
            .send()
            .await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(error_from_response(resp, path).await)
    }
}

async fn error_from_response(resp: Response, path: &str) -> RemoteError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let messages = parse_messages(status, &body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(messages),
        StatusCode::NOT_FOUND => RemoteError::NotFound(path.to_string()),
        _ => RemoteError::Api {
            status: status.as_u16(),
            messages,
        },
    }
}

/// Extract error messages from a response body.
///
/// Understands `{"errors": ["..."]}`, Rails-style
/// `{"errors": {"path": ["is invalid"]}}` and `{"error": "..."}`; anything
/// else falls back to the raw body or the status line.
pub fn parse_messages(status: StatusCode, body: &str) -> Vec<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("errors") {
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<String> = items
                    .iter()
                    .map(|item| match item.as_str() {
                        Some(s) => s.to_string(),
                        None => item.to_string(),
                    })
                    .collect();
                if !messages.is_empty() {
                    return messages;
                }
            }
            Some(serde_json::Value::Object(fields)) => {
                let messages: Vec<String> = fields
                    .iter()
                    .flat_map(|(field, msgs)| {
                        let field = humanize(field);
                        let msgs: Vec<String> = match msgs {
                            serde_json::Value::Array(list) => list
                                .iter()
                                .filter_map(|m| m.as_str().map(str::to_owned))
                                .collect(),
                            serde_json::Value::String(s) => vec![s.clone()],
                            _ => Vec::new(),
                        };
                        msgs.into_iter().map(move |m| format!("{field} {m}"))
                    })
                    .collect();
                if !messages.is_empty() {
                    return messages;
                }
            }
            _ => {}
        }
        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            return vec![error.to_string()];
        }
    }

    let body = body.trim();
    if body.is_empty() {
        vec![format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .trim_end()
        .to_string()]
    } else {
        vec![body.to_string()]
    }
}

fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl RemoteStore for ThemeApiClient {
    async fn list(&self, recursive: bool) -> Result<Listing> {
        let url = format!("{}/files?recursive={recursive}", self.base_url);
        let resp = self.send(self.client.get(&url), "files").await?;
        let entries: Vec<ListEntry> = serde_json::from_slice(&resp.bytes().await?)?;

        let listing = Listing::from_paths(entries.into_iter().map(|e| e.path));
        for entry in &listing.invalid {
            warn!(path = %entry.path, reason = %entry.reason, "unusable listing entry");
        }
        debug!(count = listing.files.len(), recursive, "listed remote files");
        Ok(listing)
    }

    async fn fetch_content(&self, file: &RemoteFile) -> Result<Vec<u8>> {
        let path = file.path.as_str();
        let resp = self.send(self.client.get(self.file_url(path)), path).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    fn validate(&self, candidate: &CandidateFile) -> std::result::Result<(), Vec<String>> {
        self.rules.validate(candidate)
    }

    async fn save(&self, candidate: CandidateFile) -> Result<()> {
        let request = self
            .client
            .post(self.file_url(&candidate.path))
            .header("Content-Type", "application/octet-stream")
            .body(candidate.content);
        self.send(request, &candidate.path).await?;
        Ok(())
    }

    async fn delete(&self, path: &RemotePath) -> Result<DeleteOutcome> {
        let request = self.client.delete(self.file_url(path.as_str()));
        match self.send(request, path.as_str()).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(RemoteError::NotFound(_)) => Ok(DeleteOutcome::NotFound),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ThemeApiClient {
        let config = RemoteConfig {
            base_url: base.to_string(),
            ..RemoteConfig::default()
        };
        ThemeApiClient::new(&config, Credential::new("tok")).unwrap()
    }

    #[test]
    fn empty_credential_is_rejected() {
        let result = ThemeApiClient::new(&RemoteConfig::default(), Credential::new(""));
        assert!(matches!(result, Err(RemoteError::MissingToken)));
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        assert_eq!(client("http://h/api/").base_url(), "http://h/api");
    }

    #[test]
    fn file_url_encodes_each_segment() {
        assert_eq!(
            client("http://h").file_url("assets/my file#1.css"),
            "http://h/files/assets/my%20file%231.css"
        );
    }

    #[test]
    fn parse_messages_variants() {
        let s = StatusCode::UNPROCESSABLE_ENTITY;
        assert_eq!(
            parse_messages(s, r#"{"errors": ["Path is invalid", "Content is blank"]}"#),
            ["Path is invalid", "Content is blank"]
        );
        assert_eq!(
            parse_messages(s, r#"{"errors": {"path": ["has already been taken"]}}"#),
            ["Path has already been taken"]
        );
        assert_eq!(parse_messages(s, r#"{"error": "nope"}"#), ["nope"]);
        assert_eq!(parse_messages(s, "plain text\n"), ["plain text"]);
        assert_eq!(parse_messages(s, ""), ["422 Unprocessable Entity"]);
    }

    #[test]
    fn humanize_field_names() {
        assert_eq!(humanize("file_size"), "File size");
        assert_eq!(humanize(""), "");
    }
}
