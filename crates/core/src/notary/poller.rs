//! Status poller: drives one tracking handle to a final verdict.
//!
//! The remote service has an indeterminate, queue-dependent latency and
//! reports "not visible yet" as an error. Each tick is a pure function of
//! the current [`PollState`] and the classified query result, see
//! [`next_step`]; [`StatusPoller`] performs the I/O around it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::metrics;

use super::cancel::CancelSignal;
use super::classify::{classify, Disposition, RemoteErrors};
use super::config::{PollIntervals, PollProtocol};
use super::error::NotaryError;
use super::log_fetch::LogFetcher;
use super::reporter::Reporter;
use super::traits::NotaryService;
use super::types::{ArtifactOutcome, ArtifactRequest, Phase, PhaseRecord, TrackingHandle};

/// Poller state. `Accepted`, `Rejected` and `Errored` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    /// Uploaded, but the handle is not yet visible to the query endpoint.
    AwaitingQueue,
    /// Visible and being processed.
    Polling,
    Accepted,
    Rejected,
    Errored,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Errored)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingQueue => "awaiting_queue",
            Self::Polling => "polling",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Errored => "errored",
        }
    }
}

/// What one tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The query succeeded with this phase.
    Reported(Phase),
    /// The query failed and was classified.
    Failed(Disposition),
}

/// Backoff cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Slow,
    Fast,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Fast => "fast",
        }
    }
}

/// Sleep to take before the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sleep {
    pub cadence: Cadence,
    pub duration: Duration,
}

/// Result of one tick: the next state and, unless stopping, how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub next: PollState,
    pub sleep: Option<Sleep>,
}

impl Step {
    fn stop(next: PollState) -> Self {
        Self { next, sleep: None }
    }

    fn wait(next: PollState, cadence: Cadence, intervals: &PollIntervals) -> Self {
        let duration = match cadence {
            Cadence::Slow => intervals.slow,
            Cadence::Fast => intervals.fast,
        };
        Self {
            next,
            sleep: Some(Sleep { cadence, duration }),
        }
    }
}

/// Transition table for one tick.
pub fn next_step(state: PollState, observation: Observation, intervals: &PollIntervals) -> Step {
    if state.is_terminal() {
        return Step::stop(state);
    }

    match observation {
        Observation::Failed(Disposition::QueuedNotFound) => {
            Step::wait(state, Cadence::Slow, intervals)
        }
        Observation::Failed(Disposition::TransientNetwork) => {
            Step::wait(state, Cadence::Fast, intervals)
        }
        Observation::Failed(Disposition::Terminal) => Step::stop(PollState::Errored),
        Observation::Reported(Phase::Accepted) => Step::stop(PollState::Accepted),
        Observation::Reported(Phase::Rejected) => Step::stop(PollState::Rejected),
        Observation::Reported(Phase::Submitted | Phase::InProgress) => {
            Step::wait(PollState::Polling, Cadence::Slow, intervals)
        }
    }
}

/// Verdict reached by one polled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

/// Combines the status verdict with the optional log verdict.
///
/// Either resource reporting a rejection rejects the artifact.
pub fn combine_verdicts(status: Verdict, log: Option<Verdict>) -> Verdict {
    if status == Verdict::Rejected || log == Some(Verdict::Rejected) {
        Verdict::Rejected
    } else {
        Verdict::Accepted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Status,
    Log,
}

impl Resource {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Log => "log",
        }
    }
}

/// Drives one tracking handle through the remote phases.
///
/// Owns the artifact's [`PhaseRecord`] exclusively. Every sleep and every
/// remote query races the run's cancellation signal.
pub struct StatusPoller<'a> {
    service: &'a dyn NotaryService,
    request: &'a ArtifactRequest,
    reporter: &'a dyn Reporter,
    cancel: &'a CancelSignal,
    intervals: PollIntervals,
    protocol: PollProtocol,
    log_fetcher: Option<&'a LogFetcher>,
    state: PollState,
    record: PhaseRecord,
}

impl<'a> StatusPoller<'a> {
    /// Creates a poller in `AwaitingQueue` for a freshly uploaded handle.
    pub fn new(
        service: &'a dyn NotaryService,
        request: &'a ArtifactRequest,
        handle: TrackingHandle,
        reporter: &'a dyn Reporter,
        cancel: &'a CancelSignal,
    ) -> Self {
        Self {
            service,
            request,
            reporter,
            cancel,
            intervals: PollIntervals::default(),
            protocol: PollProtocol::default(),
            log_fetcher: None,
            state: PollState::AwaitingQueue,
            record: PhaseRecord::submitted(handle),
        }
    }

    pub fn with_intervals(mut self, intervals: PollIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_protocol(mut self, protocol: PollProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_log_fetcher(mut self, fetcher: Option<&'a LogFetcher>) -> Self {
        self.log_fetcher = fetcher;
        self
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Polls until a terminal state and returns the artifact's disposition.
    pub async fn run(mut self) -> ArtifactOutcome {
        match self.drive().await {
            Ok(verdict) => self.conclude(verdict).await,
            Err(cause) => {
                self.transition(PollState::Errored);
                ArtifactOutcome::Errored {
                    cause,
                    record: Some(self.record),
                }
            }
        }
    }

    async fn drive(&mut self) -> Result<Verdict, NotaryError> {
        // A freshly uploaded handle is never visible right away.
        let status = self
            .poll_resource(Resource::Status, Some(self.intervals.slow))
            .await?;

        match self.protocol {
            PollProtocol::StatusOnly => Ok(status),
            PollProtocol::StatusAndLog => {
                self.transition(PollState::Polling);
                let log = self.poll_resource(Resource::Log, None).await?;
                Ok(combine_verdicts(status, Some(log)))
            }
        }
    }

    async fn poll_resource(
        &mut self,
        resource: Resource,
        initial_delay: Option<Duration>,
    ) -> Result<Verdict, NotaryError> {
        let mut state = PollState::AwaitingQueue;
        let mut pending = initial_delay.map(|duration| Sleep {
            cadence: Cadence::Slow,
            duration,
        });
        let mut queued_ticks: u64 = 0;

        loop {
            if let Some(sleep) = pending.take() {
                self.sleep(sleep).await?;
            }

            let (observation, errors) = match self.query(resource).await? {
                Ok(phase) => (Observation::Reported(phase), None),
                Err(errors) => (Observation::Failed(classify(&errors)), Some(errors)),
            };

            metrics::QUERIES_TOTAL
                .with_label_values(&[resource.as_str(), observation_label(observation)])
                .inc();

            match observation {
                Observation::Failed(Disposition::QueuedNotFound) => {
                    queued_ticks += 1;
                    debug!(
                        artifact = %self.request.path.display(),
                        request_id = %self.record.handle,
                        resource = resource.as_str(),
                        ticks = queued_ticks,
                        "Submission not visible yet, still queued"
                    );
                }
                Observation::Failed(Disposition::TransientNetwork) => {
                    warn!(
                        artifact = %self.request.path.display(),
                        resource = resource.as_str(),
                        "Error that network became unavailable, will retry"
                    );
                }
                _ => {}
            }

            let step = next_step(state, observation, &self.intervals);
            match step.next {
                PollState::Accepted => return Ok(Verdict::Accepted),
                PollState::Rejected => return Ok(Verdict::Rejected),
                PollState::Errored => {
                    return Err(NotaryError::UnclassifiedRemote(
                        errors.unwrap_or_else(|| RemoteErrors::new(Vec::new())),
                    ))
                }
                next => {
                    if resource == Resource::Status {
                        self.transition(next);
                    }
                    state = next;
                }
            }
            pending = step.sleep;
        }
    }

    /// Runs one query. The outer error only signals cancellation.
    async fn query(&mut self, resource: Resource) -> Result<Result<Phase, RemoteErrors>, NotaryError> {
        let handle = self.record.handle.clone();
        match resource {
            Resource::Status => {
                let result = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(NotaryError::Cancelled),
                    result = self.service.query_status(&handle) => result,
                };
                Ok(result.map(|report| {
                    self.record.apply_status(&report);
                    self.reporter.status(self.request, &report);
                    report.phase
                }))
            }
            Resource::Log => {
                let result = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(NotaryError::Cancelled),
                    result = self.service.query_log(&handle) => result,
                };
                Ok(result.map(|report| {
                    self.record.apply_log(&report);
                    self.reporter.log_status(self.request, &report);
                    report.phase
                }))
            }
        }
    }

    async fn sleep(&self, sleep: Sleep) -> Result<(), NotaryError> {
        metrics::POLL_SLEEPS
            .with_label_values(&[sleep.cadence.as_str()])
            .inc();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NotaryError::Cancelled),
            _ = tokio::time::sleep(sleep.duration) => Ok(()),
        }
    }

    /// Moves the visible state forward. Never regresses, never leaves a terminal state.
    fn transition(&mut self, next: PollState) {
        if next == self.state || self.state.is_terminal() || next == PollState::AwaitingQueue {
            return;
        }
        debug!(
            artifact = %self.request.path.display(),
            from = self.state.as_str(),
            to = next.as_str(),
            "Poll state transition"
        );
        self.state = next;
        self.reporter.phase_changed(self.request, next, &self.record);
    }

    async fn conclude(mut self, verdict: Verdict) -> ArtifactOutcome {
        match verdict {
            Verdict::Accepted => {
                self.record.phase = Phase::Accepted;
                self.transition(PollState::Accepted);
                ArtifactOutcome::Accepted {
                    record: self.record,
                }
            }
            Verdict::Rejected => {
                self.record.phase = Phase::Rejected;
                self.attach_diagnostics().await;
                self.transition(PollState::Rejected);
                let diagnostic_ref = self.record.diagnostic_ref.clone();
                let log_content = self.record.log_body.clone();
                ArtifactOutcome::Rejected {
                    record: self.record,
                    diagnostic_ref,
                    log_content,
                }
            }
        }
    }

    /// Best-effort enrichment of a rejected record so a human can explain it.
    async fn attach_diagnostics(&mut self) {
        if self.record.diagnostic_ref.is_none() && self.record.log_body.is_none() {
            // The status resource gave no reference: ask the log resource once.
            let handle = self.record.handle.clone();
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                result = self.service.query_log(&handle) => result,
            };
            match result {
                Ok(report) => self.record.apply_log(&report),
                Err(errors) => debug!(
                    artifact = %self.request.path.display(),
                    "No rejection log available: {}", errors
                ),
            }
        }

        let (Some(fetcher), None) = (self.log_fetcher, self.record.log_body.as_ref()) else {
            return;
        };
        let Some(url) = self
            .record
            .diagnostic_ref
            .clone()
            .filter(|r| LogFetcher::is_fetchable(r))
        else {
            return;
        };

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            fetched = fetcher.fetch(&url) => fetched,
        };
        match fetched {
            Ok(body) => self.record.log_body = Some(body),
            Err(e) => warn!(
                artifact = %self.request.path.display(),
                "Failed to fetch rejection log from {}: {}", url, e
            ),
        }
    }
}

fn observation_label(observation: Observation) -> &'static str {
    match observation {
        Observation::Reported(_) => "ok",
        Observation::Failed(disposition) => disposition.as_str(),
    }
}
