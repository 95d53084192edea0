pub mod download;
pub mod watch;

use std::path::Path;

use anyhow::Context;
use tracing::warn;
use ts_core::config::Config;
use ts_core::credentials::{self, Credential, CredentialSources};
use ts_remote::RemoteError;

/// Everything a subcommand needs, resolved once before any work starts.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub credential: Credential,
}

/// Load config files and resolve the credential.
///
/// An explicit `--config` file must load; the per-user file is optional and
/// skipped with a warning when broken.
pub fn resolve(flag: Option<&str>, config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let explicit = config_path
        .map(|path| {
            Config::load_from(path)
                .with_context(|| format!("failed to load config {}", path.display()))
        })
        .transpose()?;
    let implicit = match Config::load_implicit() {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %Config::default_path().display(), error = %err, "ignoring config file");
            None
        }
    };
    let env = credentials::env_authorization();

    settings_from(CredentialSources {
        flag,
        explicit: explicit.as_ref(),
        env: env.as_deref(),
        implicit: implicit.as_ref(),
    })
}

/// Settings come from the explicit file, else the implicit one, else
/// defaults.
pub fn settings_from(sources: CredentialSources<'_>) -> anyhow::Result<Settings> {
    let credential = credentials::resolve(sources)?;
    let mut config = sources
        .explicit
        .or(sources.implicit)
        .cloned()
        .unwrap_or_default();
    config.apply_env();
    config.validate()?;
    Ok(Settings { config, credential })
}

/// Map remote errors to messages a user can act on.
pub fn friendly_error(err: RemoteError, base_url: &str) -> anyhow::Error {
    match err {
        RemoteError::Http(e) if e.is_connect() => anyhow::anyhow!(
            "Could not connect to the theme API at {base_url}.\n  \
             (hint: check remote.base_url or THEME_API_URL)"
        ),
        RemoteError::Http(e) if e.is_timeout() => {
            anyhow::anyhow!("Request to {base_url} timed out.")
        }
        RemoteError::Unauthorized(messages) => anyhow::anyhow!(
            "The theme API rejected the authorization: {}",
            messages.join("; ")
        ),
        other => anyhow::Error::new(other),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>, workers: usize) -> Config {
        let mut config = Config {
            authorization: token.map(str::to_owned),
            ..Config::default()
        };
        config.sync.workers = workers;
        config
    }

    #[test]
    fn missing_authorization_is_reported_verbatim() {
        let err = settings_from(CredentialSources::default()).unwrap_err();
        assert_eq!(format!("{err:#}"), "Could not find authorization.");
    }

    #[test]
    fn explicit_config_wins_over_implicit_settings() {
        let explicit = config(None, 2);
        let implicit = config(Some("from-home"), 9);
        let settings = settings_from(CredentialSources {
            explicit: Some(&explicit),
            implicit: Some(&implicit),
            ..CredentialSources::default()
        })
        .unwrap();
        assert_eq!(settings.credential.expose(), "from-home");
        assert_eq!(settings.config.sync.workers, 2);
    }

    #[test]
    fn flag_token_with_defaults() {
        let settings = settings_from(CredentialSources {
            flag: Some("tok"),
            ..CredentialSources::default()
        })
        .unwrap();
        assert_eq!(settings.credential.expose(), "tok");
        assert_eq!(settings.config.download.workers, 8);
    }

    #[test]
    fn unreadable_explicit_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = resolve(Some("tok"), Some(&missing)).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load config"));
    }

    #[test]
    fn explicit_config_file_supplies_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "authorization = \"file-token\"\n[sync]\nworkers = 3\n").unwrap();
        let settings = resolve(None, Some(&path)).unwrap();
        assert_eq!(settings.credential.expose(), "file-token");
        assert_eq!(settings.config.sync.workers, 3);
    }

    #[test]
    fn unauthorized_error_is_friendly() {
        let err = friendly_error(
            RemoteError::Unauthorized(vec!["Invalid token".into()]),
            "http://h",
        );
        assert_eq!(
            err.to_string(),
            "The theme API rejected the authorization: Invalid token"
        );
    }
}
