//! Data model for notarization runs.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::NotaryError;

/// One file to notarize. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRequest {
    /// Path to the archive, disk image or installer package.
    pub path: PathBuf,
    /// Bundle identifier associated with the upload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    /// Attach the approval ticket to the file once accepted.
    #[serde(default)]
    pub staple: bool,
}

impl ArtifactRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bundle_id: None,
            staple: false,
        }
    }

    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    pub fn with_staple(mut self, staple: bool) -> Self {
        self.staple = staple;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ArtifactRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if self.staple {
            f.write_str(" (stapled)")?;
        }
        Ok(())
    }
}

/// Opaque identifier returned by the remote service after upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingHandle(String);

impl TrackingHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote processing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Submitted,
    InProgress,
    Accepted,
    Rejected,
}

impl Phase {
    /// Parses the status string the remote service reports.
    ///
    /// Anything that is not recognised as submitted or terminal counts as
    /// in progress, so unknown intermediate phases keep the poller waiting.
    pub fn from_remote(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "accepted" => Self::Accepted,
            "invalid" | "rejected" => Self::Rejected,
            "submitted" => Self::Submitted,
            _ => Self::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::InProgress => "in_progress",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer of the primary status resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub phase: Phase,
    /// Status text exactly as reported.
    pub status_text: String,
    /// Log URL or similar reference, when the service provides one.
    #[serde(default)]
    pub diagnostic_ref: Option<String>,
    /// Raw payload kept for diagnostics.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl StatusReport {
    pub fn new(status_text: impl Into<String>) -> Self {
        let status_text = status_text.into();
        Self {
            phase: Phase::from_remote(&status_text),
            status_text,
            diagnostic_ref: None,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_diagnostic_ref(mut self, reference: impl Into<String>) -> Self {
        self.diagnostic_ref = Some(reference.into());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}

/// Answer of the secondary log/analysis resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogReport {
    pub phase: Phase,
    pub status_text: String,
    /// Log body, if the service returned one inline.
    #[serde(default)]
    pub log_body: Option<String>,
    #[serde(default)]
    pub diagnostic_ref: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl LogReport {
    pub fn new(status_text: impl Into<String>) -> Self {
        let status_text = status_text.into();
        Self {
            phase: Phase::from_remote(&status_text),
            status_text,
            log_body: None,
            diagnostic_ref: None,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_log_body(mut self, body: impl Into<String>) -> Self {
        self.log_body = Some(body.into());
        self
    }

    pub fn with_diagnostic_ref(mut self, reference: impl Into<String>) -> Self {
        self.diagnostic_ref = Some(reference.into());
        self
    }
}

/// Latest known status for one tracking handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub handle: TrackingHandle,
    pub phase: Phase,
    pub diagnostic_ref: Option<String>,
    /// Log body fetched for a rejected artifact.
    pub log_body: Option<String>,
    pub raw: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl PhaseRecord {
    pub fn submitted(handle: TrackingHandle) -> Self {
        Self {
            handle,
            phase: Phase::Submitted,
            diagnostic_ref: None,
            log_body: None,
            raw: serde_json::Value::Null,
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn apply_status(&mut self, report: &StatusReport) {
        self.phase = report.phase;
        if report.diagnostic_ref.is_some() {
            self.diagnostic_ref = report.diagnostic_ref.clone();
        }
        self.raw = report.raw.clone();
        self.updated_at = Utc::now();
    }

    pub(crate) fn apply_log(&mut self, report: &LogReport) {
        if report.diagnostic_ref.is_some() {
            self.diagnostic_ref = report.diagnostic_ref.clone();
        }
        if report.log_body.is_some() {
            self.log_body = report.log_body.clone();
        }
        self.raw = report.raw.clone();
        self.updated_at = Utc::now();
    }
}

/// Final disposition of one artifact.
#[derive(Debug, Clone)]
pub enum ArtifactOutcome {
    Accepted {
        record: PhaseRecord,
    },
    Rejected {
        record: PhaseRecord,
        /// Log URL reported by the remote service.
        diagnostic_ref: Option<String>,
        /// Log body recovered for the rejection, if any.
        log_content: Option<String>,
    },
    Errored {
        cause: NotaryError,
        /// Last known status, if the artifact got far enough to have one.
        record: Option<PhaseRecord>,
    },
}

impl ArtifactOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::Errored { .. } => "errored",
        }
    }

    /// Diagnostic reference for a rejected artifact.
    pub fn diagnostic_ref(&self) -> Option<&str> {
        match self {
            Self::Rejected { diagnostic_ref, .. } => diagnostic_ref.as_deref(),
            _ => None,
        }
    }

    /// Log body recovered for a rejected artifact.
    pub fn log_content(&self) -> Option<&str> {
        match self {
            Self::Rejected { log_content, .. } => log_content.as_deref(),
            _ => None,
        }
    }

    pub fn record(&self) -> Option<&PhaseRecord> {
        match self {
            Self::Accepted { record } | Self::Rejected { record, .. } => Some(record),
            Self::Errored { record, .. } => record.as_ref(),
        }
    }

    /// Failure as an error value, `None` when accepted.
    pub fn error(&self) -> Option<NotaryError> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected {
                diagnostic_ref,
                log_content,
                ..
            } => Some(NotaryError::RemoteRejected {
                diagnostic_ref: diagnostic_ref.clone(),
                log_content: log_content.clone(),
            }),
            Self::Errored { cause, .. } => Some(cause.clone()),
        }
    }
}

/// Outcome for one requested artifact.
#[derive(Debug, Clone)]
pub struct ArtifactResult {
    pub request: ArtifactRequest,
    /// Set once the upload succeeded.
    pub handle: Option<TrackingHandle>,
    pub outcome: ArtifactOutcome,
}

/// Aggregate of a whole run: one result per request, in request order.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub results: Vec<ArtifactResult>,
}

impl RunOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// True when every artifact was accepted (vacuously true for no artifacts).
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_accepted())
    }

    pub fn accepted(&self) -> impl Iterator<Item = &ArtifactResult> {
        self.results.iter().filter(|r| r.outcome.is_accepted())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ArtifactResult> {
        self.results.iter().filter(|r| !r.outcome.is_accepted())
    }

    /// Looks up the result for a path.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&ArtifactResult> {
        self.results.iter().find(|r| r.request.path == path.as_ref())
    }

    /// Aggregate error over every failed artifact, `None` when all succeeded.
    pub fn error(&self) -> Option<RunError> {
        let failures: Vec<ArtifactFailure> = self
            .results
            .iter()
            .filter_map(|r| {
                r.outcome.error().map(|cause| ArtifactFailure {
                    path: r.request.path.clone(),
                    cause,
                })
            })
            .collect();

        if failures.is_empty() {
            None
        } else {
            Some(RunError {
                failures,
                total: self.results.len(),
            })
        }
    }
}

/// One failed artifact inside a [`RunError`].
#[derive(Debug, Clone)]
pub struct ArtifactFailure {
    pub path: PathBuf,
    pub cause: NotaryError,
}

/// Aggregate error summarising every failed artifact of a run.
#[derive(Debug, Clone)]
pub struct RunError {
    pub failures: Vec<ArtifactFailure>,
    /// Number of artifacts in the run.
    pub total: usize,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.failures.len() == 1 {
            "error"
        } else {
            "errors"
        };
        writeln!(
            f,
            "{} {} occurred ({} of {} artifacts failed):",
            self.failures.len(),
            noun,
            self.failures.len(),
            self.total
        )?;
        for failure in &self.failures {
            writeln!(f)?;
            write!(f, "\t* {}: {}", failure.path.display(), failure.cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(path: &str) -> ArtifactResult {
        let handle = TrackingHandle::new(format!("id-{}", path));
        let mut record = PhaseRecord::submitted(handle.clone());
        record.phase = Phase::Accepted;
        ArtifactResult {
            request: ArtifactRequest::new(path),
            handle: Some(handle),
            outcome: ArtifactOutcome::Accepted { record },
        }
    }

    fn errored(path: &str, cause: NotaryError) -> ArtifactResult {
        ArtifactResult {
            request: ArtifactRequest::new(path),
            handle: None,
            outcome: ArtifactOutcome::Errored {
                cause,
                record: None,
            },
        }
    }

    #[test]
    fn test_phase_from_remote() {
        assert_eq!(Phase::from_remote("Accepted"), Phase::Accepted);
        assert_eq!(Phase::from_remote("Invalid"), Phase::Rejected);
        assert_eq!(Phase::from_remote("rejected"), Phase::Rejected);
        assert_eq!(Phase::from_remote("In Progress"), Phase::InProgress);
        assert_eq!(Phase::from_remote("submitted"), Phase::Submitted);
        assert_eq!(Phase::from_remote("something new"), Phase::InProgress);
        assert!(Phase::Accepted.is_terminal());
        assert!(!Phase::InProgress.is_terminal());
    }

    #[test]
    fn test_empty_run_is_success() {
        let outcome = RunOutcome::empty();
        assert!(outcome.is_empty());
        assert!(outcome.is_success());
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_run_error_lists_failures_only() {
        let outcome = RunOutcome {
            results: vec![
                accepted("a.zip"),
                errored(
                    "b.dmg",
                    NotaryError::Upload {
                        message: "boom".to_string(),
                    },
                ),
                errored("c.pkg", NotaryError::Cancelled),
            ],
        };

        assert!(!outcome.is_success());
        assert_eq!(outcome.accepted().count(), 1);
        assert_eq!(outcome.failures().count(), 2);

        let err = outcome.error().unwrap();
        assert_eq!(err.failures.len(), 2);
        assert_eq!(err.total, 3);
        let rendered = err.to_string();
        assert!(rendered.starts_with("2 errors occurred (2 of 3 artifacts failed):"));
        assert!(rendered.contains("b.dmg: upload failed: boom"));
        assert!(rendered.contains("c.pkg: notarization cancelled"));
        assert!(!rendered.contains("a.zip"));
    }

    #[test]
    fn test_record_keeps_last_diagnostic_ref() {
        let mut record = PhaseRecord::submitted(TrackingHandle::new("abc"));
        record.apply_status(&StatusReport::new("In Progress").with_diagnostic_ref("L1"));
        record.apply_status(&StatusReport::new("In Progress"));
        assert_eq!(record.diagnostic_ref.as_deref(), Some("L1"));
        record.apply_log(&LogReport::new("Invalid").with_log_body("body"));
        assert_eq!(record.log_body.as_deref(), Some("body"));
    }

    #[test]
    fn test_artifact_request_display() {
        let request = ArtifactRequest::new("out/app.dmg").with_staple(true);
        assert_eq!(request.to_string(), "out/app.dmg (stapled)");
    }
}
