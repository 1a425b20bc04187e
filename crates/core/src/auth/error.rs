use std::path::PathBuf;

use thiserror::Error;

/// Credential selection errors. All of them are raised before any tool runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("api_issuer must be set when api_key is set")]
    MissingApiIssuer,

    #[error("api_key must be set when api_issuer is set")]
    MissingApiKey,

    #[error("password must be set when username is set")]
    MissingPassword,

    #[error("username must be set when password is set")]
    MissingUsername,

    #[error("no authorization info given, specify username + password or api_key + api_issuer")]
    NoCredentials,

    #[error("environment variable {name} referenced by the password is not set")]
    EnvVarMissing { name: String },

    #[error(
        "API key file {file_name} not found (searched: {}), specify api_key_path",
        .searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
    )]
    ApiKeyFileNotFound {
        file_name: String,
        searched: Vec<PathBuf>,
    },
}
