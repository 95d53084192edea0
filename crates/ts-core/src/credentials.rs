use thiserror::Error;

use crate::config::Config;

/// Environment variable consulted after the explicit config file.
pub const AUTHORIZATION_ENV: &str = "THEME_AUTHORIZATION";

/// Opaque authorization token handed to the remote store client.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Could not find authorization.")]
    Unauthorized,
}

/// Where each candidate token comes from, in precedence order.
#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialSources<'a> {
    /// `--authorization` flag.
    pub flag: Option<&'a str>,
    /// File passed with `--config`.
    pub explicit: Option<&'a Config>,
    /// Value of [`AUTHORIZATION_ENV`].
    pub env: Option<&'a str>,
    /// Per-user config file.
    pub implicit: Option<&'a Config>,
}

/// Resolve the authorization token: flag, then explicit config, then
/// environment, then implicit config. Blank values are skipped.
pub fn resolve(sources: CredentialSources<'_>) -> Result<Credential, CredentialError> {
    let from_config = |cfg: Option<&Config>| cfg.and_then(|c| c.authorization.clone());

    [
        sources.flag.map(str::to_owned),
        from_config(sources.explicit),
        sources.env.map(str::to_owned),
        from_config(sources.implicit),
    ]
    .into_iter()
    .flatten()
    .map(|token| token.trim().to_owned())
    .find(|token| !token.is_empty())
    .map(Credential)
    .ok_or(CredentialError::Unauthorized)
}

/// Read [`AUTHORIZATION_ENV`] from the process environment.
pub fn env_authorization() -> Option<String> {
    std::env::var(AUTHORIZATION_ENV).ok()
}
