//! Classification of remote-service errors into retry dispositions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The tracking handle is not yet visible to the query endpoint.
pub const CODE_NOT_FOUND_IN_QUEUE: i64 = 1519;

/// The remote service or the local network is temporarily unavailable.
pub const CODE_NETWORK_UNAVAILABLE: i64 = -19000;

/// Code used when the tool failed without reporting a structured error.
pub const CODE_UNSTRUCTURED: i64 = -1;

/// A single structured error reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// All errors returned by one remote call.
///
/// The service may report several product errors at once, so classification
/// looks at every code rather than only the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteErrors(Vec<RemoteError>);

impl RemoteErrors {
    /// Builds the list, substituting an unstructured error when empty.
    pub fn new(errors: Vec<RemoteError>) -> Self {
        if errors.is_empty() {
            Self(vec![RemoteError::new(
                CODE_UNSTRUCTURED,
                "remote call failed without error details",
            )])
        } else {
            Self(errors)
        }
    }

    pub fn single(code: i64, message: impl Into<String>) -> Self {
        Self(vec![RemoteError::new(code, message)])
    }

    pub fn contains_code(&self, code: i64) -> bool {
        self.0.iter().any(|e| e.code == code)
    }

    pub fn errors(&self) -> &[RemoteError] {
        &self.0
    }

    pub fn codes(&self) -> Vec<i64> {
        self.0.iter().map(|e| e.code).collect()
    }
}

impl fmt::Display for RemoteErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("; "))
    }
}

impl std::error::Error for RemoteErrors {}

/// What the poller should do with a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Still waiting in the upstream queue: keep polling at the slow interval.
    QueuedNotFound,
    /// Temporary outage: keep polling at the fast interval, no failure budget.
    TransientNetwork,
    /// Anything else: stop and surface the error unchanged.
    Terminal,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueuedNotFound => "queued_not_found",
            Self::TransientNetwork => "transient_network",
            Self::Terminal => "terminal",
        }
    }

    /// Whether the error is recovered locally rather than surfaced.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Terminal)
    }
}

/// Maps a remote error to exactly one disposition.
///
/// Unknown codes fail closed as [`Disposition::Terminal`]. When both retry
/// codes appear together the queue signal wins, since it implies the
/// service answered.
pub fn classify(errors: &RemoteErrors) -> Disposition {
    if errors.contains_code(CODE_NOT_FOUND_IN_QUEUE) {
        Disposition::QueuedNotFound
    } else if errors.contains_code(CODE_NETWORK_UNAVAILABLE) {
        Disposition::TransientNetwork
    } else {
        Disposition::Terminal
    }
}
