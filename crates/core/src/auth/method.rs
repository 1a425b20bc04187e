use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::config::AppleIdConfig;

use super::error::AuthError;
use super::key_file::find_key_file;

/// Password prefix that resolves the value from an environment variable.
pub const ENV_PASSWORD_PREFIX: &str = "@env:";

/// Password prefix naming a keychain item; handed to the tool unchanged.
pub const KEYCHAIN_PASSWORD_PREFIX: &str = "@keychain:";

/// Selected notary credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// App Store Connect API key.
    ApiKey {
        key_id: String,
        issuer: String,
        key_path: PathBuf,
    },
    /// Apple ID with an app-specific password.
    AppleId {
        username: String,
        password: String,
        provider: Option<String>,
    },
}

impl AuthMethod {
    /// Selects credentials from configuration and the process environment.
    pub fn select(config: &AppleIdConfig) -> Result<Self, AuthError> {
        Self::select_with_env(config, |name| std::env::var(name).ok())
    }

    /// Selects credentials, resolving environment lookups through `env`.
    ///
    /// An API key with its issuer takes precedence over Apple ID credentials.
    pub fn select_with_env<F>(config: &AppleIdConfig, env: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_empty(&config.api_key);
        let api_issuer = non_empty(&config.api_issuer);
        let username = non_empty(&config.username);
        let password = non_empty(&config.password);

        match (api_key, api_issuer) {
            (Some(key_id), Some(issuer)) => {
                let key_path = match &config.api_key_path {
                    Some(path) if !path.as_os_str().is_empty() => path.clone(),
                    _ => find_key_file(key_id, &env)?,
                };
                debug!(key_id, "Using API key authentication");
                return Ok(Self::ApiKey {
                    key_id: key_id.to_string(),
                    issuer: issuer.to_string(),
                    key_path,
                });
            }
            (Some(_), None) => return Err(AuthError::MissingApiIssuer),
            (None, Some(_)) => return Err(AuthError::MissingApiKey),
            (None, None) => {}
        }

        match (username, password) {
            (Some(username), Some(password)) => {
                debug!(username, "Using Apple ID authentication");
                Ok(Self::AppleId {
                    username: username.to_string(),
                    password: resolve_password(password, &env)?,
                    provider: non_empty(&config.provider).map(str::to_string),
                })
            }
            (Some(_), None) => Err(AuthError::MissingPassword),
            (None, Some(_)) => Err(AuthError::MissingUsername),
            (None, None) => Err(AuthError::NoCredentials),
        }
    }

    /// Authentication flags for `notarytool`.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::ApiKey {
                key_id,
                issuer,
                key_path,
            } => vec![
                "--key-id".to_string(),
                key_id.clone(),
                "--issuer".to_string(),
                issuer.clone(),
                "--key".to_string(),
                key_path.display().to_string(),
            ],
            Self::AppleId {
                username,
                password,
                provider,
            } => {
                let mut args = vec![
                    "--apple-id".to_string(),
                    username.clone(),
                    "--password".to_string(),
                    password.clone(),
                ];
                if let Some(team) = provider {
                    args.push("--team-id".to_string());
                    args.push(team.clone());
                }
                args
            }
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            Self::ApiKey { .. } => "api_key",
            Self::AppleId { .. } => "apple_id",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey {
                key_id,
                issuer,
                key_path,
            } => f
                .debug_struct("ApiKey")
                .field("key_id", key_id)
                .field("issuer", issuer)
                .field("key_path", key_path)
                .finish(),
            Self::AppleId {
                username, provider, ..
            } => f
                .debug_struct("AppleId")
                .field("username", username)
                .field("password", &"<redacted>")
                .field("provider", provider)
                .finish(),
        }
    }
}

fn non_empty<T: AsRef<str>>(value: &Option<T>) -> Option<&str> {
    value.as_ref().map(|v| v.as_ref()).filter(|v| !v.is_empty())
}

fn resolve_password<F>(password: &str, env: &F) -> Result<String, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(name) = password.strip_prefix(ENV_PASSWORD_PREFIX) {
        return env(name).ok_or_else(|| AuthError::EnvVarMissing {
            name: name.to_string(),
        });
    }
    if password.starts_with(KEYCHAIN_PASSWORD_PREFIX) {
        debug!("Using keychain password reference");
    }
    Ok(password.to_string())
}
