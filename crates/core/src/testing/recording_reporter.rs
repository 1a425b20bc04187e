//! Reporter that records every notification.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::notary::{
    ArtifactOutcome, ArtifactRequest, LogReport, PhaseRecord, PollState, Reporter, StatusReport,
    TrackingHandle,
};

/// A recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Submitting(PathBuf),
    Submitted(PathBuf, TrackingHandle),
    Status(PathBuf, String),
    LogStatus(PathBuf, String),
    PhaseChanged(PathBuf, PollState),
    /// Outcome label.
    Finished(PathBuf, &'static str),
}

impl ReportEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Submitting(p)
            | Self::Submitted(p, _)
            | Self::Status(p, _)
            | Self::LogStatus(p, _)
            | Self::PhaseChanged(p, _)
            | Self::Finished(p, _) => p,
        }
    }
}

/// Reporter for test assertions on notification order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Events for one artifact, in order.
    pub fn events_for(&self, path: impl AsRef<Path>) -> Vec<ReportEvent> {
        let path = path.as_ref();
        self.events()
            .into_iter()
            .filter(|e| e.path() == path)
            .collect()
    }

    /// Poll state transitions for one artifact, in order.
    pub fn states_for(&self, path: impl AsRef<Path>) -> Vec<PollState> {
        self.events_for(path)
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::PhaseChanged(_, state) => Some(state),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ReportEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

impl Reporter for RecordingReporter {
    fn submitting(&self, request: &ArtifactRequest) {
        self.push(ReportEvent::Submitting(request.path.clone()));
    }

    fn submitted(&self, request: &ArtifactRequest, handle: &TrackingHandle) {
        self.push(ReportEvent::Submitted(request.path.clone(), handle.clone()));
    }

    fn status(&self, request: &ArtifactRequest, report: &StatusReport) {
        self.push(ReportEvent::Status(
            request.path.clone(),
            report.status_text.clone(),
        ));
    }

    fn log_status(&self, request: &ArtifactRequest, report: &LogReport) {
        self.push(ReportEvent::LogStatus(
            request.path.clone(),
            report.status_text.clone(),
        ));
    }

    fn phase_changed(&self, request: &ArtifactRequest, state: PollState, _record: &PhaseRecord) {
        self.push(ReportEvent::PhaseChanged(request.path.clone(), state));
    }

    fn finished(&self, request: &ArtifactRequest, outcome: &ArtifactOutcome) {
        self.push(ReportEvent::Finished(request.path.clone(), outcome.label()));
    }
}
