//! Error types for the notarization engine.

use std::path::PathBuf;

use thiserror::Error;

use super::classify::RemoteErrors;
use crate::auth::AuthError;

/// Errors returned by a single upload attempt.
///
/// The adapter reports these verbatim; it never interprets remote codes.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Artifact file does not exist.
    #[error("artifact not found: {path}")]
    ArtifactNotFound { path: PathBuf },

    /// The external upload tool could not be started or exited with failure.
    #[error("upload tool failed: {message}")]
    Tool {
        message: String,
        stderr: Option<String>,
    },

    /// The remote service answered the upload with structured errors.
    #[error("upload rejected by remote service: {0}")]
    Remote(RemoteErrors),

    /// The tool output could not be understood.
    #[error("failed to parse upload response: {reason}")]
    ParseError { reason: String },

    /// I/O error while invoking the tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Creates a tool failure with captured stderr.
    pub fn tool(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Tool {
            message: message.into(),
            stderr,
        }
    }
}

/// Per-artifact failure surfaced to the caller.
#[derive(Debug, Clone, Error)]
pub enum NotaryError {
    /// Submission itself failed; not retried.
    #[error("upload failed: {message}")]
    Upload { message: String },

    /// The artifact was processed and denied.
    #[error("package is invalid{}", rejection_detail(.diagnostic_ref, .log_content))]
    RemoteRejected {
        diagnostic_ref: Option<String>,
        log_content: Option<String>,
    },

    /// A remote error the classifier does not recognise.
    #[error("remote service error: {0}")]
    UnclassifiedRemote(RemoteErrors),

    /// The run was cancelled before this artifact reached a verdict.
    #[error("notarization cancelled")]
    Cancelled,

    /// Stapling the ticket to an accepted artifact failed.
    #[error("stapling failed: {message}")]
    Staple { message: String },

    /// Credentials could not be selected.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The worker for this artifact stopped unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Reference in parentheses, then the log body on the following lines.
fn rejection_detail(diagnostic_ref: &Option<String>, log_content: &Option<String>) -> String {
    let mut detail = String::new();
    if let Some(reference) = diagnostic_ref {
        detail.push_str(&format!(" (see {})", reference));
    }
    if let Some(content) = log_content.as_deref().map(str::trim_end).filter(|c| !c.is_empty()) {
        detail.push_str(":\n");
        detail.push_str(content);
    }
    detail
}

impl From<UploadError> for NotaryError {
    fn from(err: UploadError) -> Self {
        let message = match &err {
            UploadError::Tool {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{}\n{}", err, stderr.trim_end()),
            _ => err.to_string(),
        };
        Self::Upload { message }
    }
}

impl NotaryError {
    /// Short machine-friendly label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::RemoteRejected { .. } => "rejected",
            Self::UnclassifiedRemote(_) => "unclassified_remote",
            Self::Cancelled => "cancelled",
            Self::Staple { .. } => "staple",
            Self::Auth(_) => "auth",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display_with_reference() {
        let err = NotaryError::RemoteRejected {
            diagnostic_ref: Some("https://logs.example/abc".to_string()),
            log_content: None,
        };
        assert_eq!(
            err.to_string(),
            "package is invalid (see https://logs.example/abc)"
        );

        let err = NotaryError::RemoteRejected {
            diagnostic_ref: None,
            log_content: None,
        };
        assert_eq!(err.to_string(), "package is invalid");
    }

    #[test]
    fn test_rejected_display_with_log_content() {
        let err = NotaryError::RemoteRejected {
            diagnostic_ref: None,
            log_content: Some("{\"issues\":[\"not signed\"]}\n".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "package is invalid:\n{\"issues\":[\"not signed\"]}"
        );

        let err = NotaryError::RemoteRejected {
            diagnostic_ref: Some("https://logs.example/abc".to_string()),
            log_content: Some("bad signature".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "package is invalid (see https://logs.example/abc):\nbad signature"
        );
    }

    #[test]
    fn test_upload_error_keeps_stderr() {
        let err = UploadError::tool("exit status 1", Some("Error: bad credentials\n".to_string()));
        let notary: NotaryError = err.into();
        match notary {
            NotaryError::Upload { message } => {
                assert!(message.contains("exit status 1"));
                assert!(message.ends_with("Error: bad credentials"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(NotaryError::Cancelled.kind(), "cancelled");
        assert_eq!(
            NotaryError::UnclassifiedRemote(RemoteErrors::single(7, "x")).kind(),
            "unclassified_remote"
        );
    }
}
