// Connection settings for the lifecycle client.
//
// Credentials come from (highest priority first):
// 1. explicit CLI flags
// 2. `NEXTBRAIN_*` environment variables
// 3. a token persisted to `~/.nextbrain_token` by an earlier run

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_BACKEND_URL: &str = "https://api.nextbrain.ai";
pub const ACCESS_TOKEN_ENV: &str = "NEXTBRAIN_ACCESS_TOKEN";
pub const BACKEND_URL_ENV: &str = "NEXTBRAIN_BACKEND_URL";
pub const APP_MODE_ENV: &str = "NEXTBRAIN_APP_MODE";

const TOKEN_FILE_NAME: &str = ".nextbrain_token";

/// How the access token travels to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Session mode: token in the `access_token` header.
    App,
    /// API token mode: token in the JSON body of `*_token` endpoints.
    Token,
}

impl AuthMode {
    pub fn from_app_flag(is_app: bool) -> Self {
        if is_app {
            AuthMode::App
        } else {
            AuthMode::Token
        }
    }
}

/// Immutable credentials a client is built from.
#[derive(Clone)]
pub struct Credentials {
    access_token: String,
    backend_url: String,
    mode: AuthMode,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("backend_url", &self.backend_url)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Values given explicitly on the command line. Anything left unset is
/// looked up in the environment, then in the saved token file.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub access_token: Option<String>,
    pub backend_url: Option<String>,
    pub app: bool,
}

impl Credentials {
    pub fn with_backend(
        access_token: impl Into<String>,
        backend_url: impl Into<String>,
        mode: AuthMode,
    ) -> Self {
        let backend_url = backend_url.into().trim_end_matches('/').to_string();
        Credentials {
            access_token: access_token.into(),
            backend_url,
            mode,
        }
    }

    /// Resolve credentials from flags, `NEXTBRAIN_*` variables and
    /// `~/.nextbrain_token`, in that order.
    pub fn resolve(overrides: CredentialOverrides) -> Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok(), &token_path())
    }

    /// [`Self::resolve`] with the environment lookup and token file supplied
    /// by the caller. Empty values count as unset.
    pub fn resolve_with(
        overrides: CredentialOverrides,
        env: impl Fn(&str) -> Option<String>,
        token_file: &Path,
    ) -> Result<Self> {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let access_token = match overrides
            .access_token
            .filter(|t| !t.trim().is_empty())
            .or_else(|| lookup(ACCESS_TOKEN_ENV))
        {
            Some(token) => token,
            None => load_token_from(token_file).map_err(|_| {
                Error::config(format!(
                    "no access token: pass --access-token, set {} or save one with --save-token",
                    ACCESS_TOKEN_ENV
                ))
            })?,
        };
        let backend_url = overrides
            .backend_url
            .filter(|u| !u.trim().is_empty())
            .or_else(|| lookup(BACKEND_URL_ENV))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let is_app = overrides.app || lookup(APP_MODE_ENV).is_some_and(|v| parse_flag(&v));

        Ok(Self::with_backend(
            access_token,
            backend_url,
            AuthMode::from_app_flag(is_app),
        ))
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// `~/.nextbrain_token`, or `./.nextbrain_token` without a home directory.
pub fn token_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(TOKEN_FILE_NAME)
}

/// Persist the access token so later runs need no flag.
pub fn persist_token(token: &str) -> Result<()> {
    persist_token_at(&token_path(), token)
}

pub fn persist_token_at(path: &Path, token: &str) -> Result<()> {
    std::fs::write(path, token)
        .map_err(|e| Error::config(format!("failed to write {}: {}", path.display(), e)))
}

pub fn load_token_from(path: &Path) -> Result<String> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
    let token = data.trim();
    if token.is_empty() {
        return Err(Error::config(format!("{} is empty", path.display())));
    }
    Ok(token.to_string())
}
