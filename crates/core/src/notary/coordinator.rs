//! Concurrency coordinator.
//!
//! Runs one worker per artifact. Uploads are serialized through a single
//! [`UploadSection`]; status polling for different artifacts overlaps
//! freely. Every requested artifact gets exactly one disposition.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::metrics;

use super::cancel::CancelSignal;
use super::config::{NotaryConfig, PollIntervals, PollProtocol};
use super::error::NotaryError;
use super::log_fetch::LogFetcher;
use super::poller::StatusPoller;
use super::reporter::{NoopReporter, Reporter};
use super::traits::{NotaryService, Stapler};
use super::types::{ArtifactOutcome, ArtifactRequest, ArtifactResult, RunOutcome, TrackingHandle};

/// Capability to upload. Held across exactly one `upload` call.
#[derive(Debug, Clone, Default)]
pub struct UploadSection {
    lock: Arc<Mutex<()>>,
}

impl UploadSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive upload access. Released when the guard drops.
    pub async fn enter(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.lock).lock_owned().await
    }
}

/// Notarizes a batch of artifacts concurrently.
pub struct NotarizationCoordinator {
    service: Arc<dyn NotaryService>,
    config: NotaryConfig,
    reporter: Arc<dyn Reporter>,
    stapler: Option<Arc<dyn Stapler>>,
    log_fetcher: Option<Arc<LogFetcher>>,
}

impl NotarizationCoordinator {
    pub fn new(service: Arc<dyn NotaryService>, config: NotaryConfig) -> Self {
        let log_fetcher = if config.fetch_rejection_log {
            match LogFetcher::new(Duration::from_secs(config.log_fetch_timeout_secs)) {
                Ok(fetcher) => Some(Arc::new(fetcher)),
                Err(e) => {
                    warn!("Rejection log fetching disabled, HTTP client failed to build: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            service,
            config,
            reporter: Arc::new(NoopReporter),
            stapler: None,
            log_fetcher,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_stapler(mut self, stapler: Arc<dyn Stapler>) -> Self {
        self.stapler = Some(stapler);
        self
    }

    /// Notarizes every request and waits for all of them.
    pub async fn run(&self, requests: Vec<ArtifactRequest>) -> RunOutcome {
        self.run_with_cancel(requests, CancelSignal::new()).await
    }

    /// Like [`run`](Self::run), stopping early once `cancel` fires.
    ///
    /// Artifacts that had not reached a verdict when cancelled come back as
    /// `Errored(Cancelled)`.
    pub async fn run_with_cancel(
        &self,
        requests: Vec<ArtifactRequest>,
        cancel: CancelSignal,
    ) -> RunOutcome {
        if requests.is_empty() {
            info!("No artifacts to notarize");
            return RunOutcome::empty();
        }

        info!(
            service = self.service.name(),
            artifacts = requests.len(),
            "Starting notarization"
        );

        let section = UploadSection::new();
        let tasks: Vec<_> = requests
            .iter()
            .cloned()
            .map(|request| {
                let worker = ArtifactWorker {
                    service: Arc::clone(&self.service),
                    reporter: Arc::clone(&self.reporter),
                    stapler: self.stapler.clone(),
                    log_fetcher: self.log_fetcher.clone(),
                    intervals: self.config.intervals(),
                    protocol: self.config.protocol,
                    section: section.clone(),
                    cancel: cancel.clone(),
                };
                tokio::spawn(worker.run(request))
            })
            .collect();

        let _workers = AbortOnDrop(tasks.iter().map(JoinHandle::abort_handle).collect());
        let joined = join_all(tasks).await;

        let results: Vec<ArtifactResult> = requests
            .into_iter()
            .zip(joined)
            .map(|(request, joined)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(artifact = %request.path.display(), "Notarization worker failed: {}", e);
                    let outcome = ArtifactOutcome::Errored {
                        cause: NotaryError::Internal(e.to_string()),
                        record: None,
                    };
                    metrics::ARTIFACT_OUTCOMES
                        .with_label_values(&[outcome.label()])
                        .inc();
                    self.reporter.finished(&request, &outcome);
                    ArtifactResult {
                        request,
                        handle: None,
                        outcome,
                    }
                }
            })
            .collect();

        let outcome = RunOutcome { results };
        info!(
            artifacts = outcome.len(),
            accepted = outcome.accepted().count(),
            failed = outcome.failures().count(),
            "Notarization finished"
        );
        outcome
    }
}

/// Aborts the run's workers if the run itself is dropped before they finish.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Everything one artifact's task needs, owned so it can be spawned.
struct ArtifactWorker {
    service: Arc<dyn NotaryService>,
    reporter: Arc<dyn Reporter>,
    stapler: Option<Arc<dyn Stapler>>,
    log_fetcher: Option<Arc<LogFetcher>>,
    intervals: PollIntervals,
    protocol: PollProtocol,
    section: UploadSection,
    cancel: CancelSignal,
}

impl ArtifactWorker {
    async fn run(self, request: ArtifactRequest) -> ArtifactResult {
        let started = Instant::now();

        let (handle, outcome) = match self.submit(&request).await {
            Ok(handle) => {
                self.reporter.submitted(&request, &handle);
                let outcome = self.poll(&request, handle.clone()).await;
                let outcome = self.staple(&request, outcome).await;
                (Some(handle), outcome)
            }
            Err(cause) => (
                None,
                ArtifactOutcome::Errored {
                    cause,
                    record: None,
                },
            ),
        };

        metrics::ARTIFACT_OUTCOMES
            .with_label_values(&[outcome.label()])
            .inc();
        metrics::ARTIFACT_DURATION
            .with_label_values(&[outcome.label()])
            .observe(started.elapsed().as_secs_f64());

        self.reporter.finished(&request, &outcome);

        ArtifactResult {
            request,
            handle,
            outcome,
        }
    }

    async fn submit(&self, request: &ArtifactRequest) -> Result<TrackingHandle, NotaryError> {
        let _upload = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(artifact = %request.path.display(), "Cancelled while waiting to upload");
                return Err(NotaryError::Cancelled);
            }
            guard = self.section.enter() => guard,
        };

        self.reporter.submitting(request);
        info!(artifact = %request.path.display(), "Uploading artifact");

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                metrics::UPLOADS_TOTAL.with_label_values(&["cancelled"]).inc();
                return Err(NotaryError::Cancelled);
            }
            result = self.service.upload(request) => result,
        };

        let label = if result.is_ok() { "success" } else { "failed" };
        metrics::UPLOADS_TOTAL.with_label_values(&[label]).inc();
        metrics::UPLOAD_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        result.map_err(|e| {
            warn!(artifact = %request.path.display(), "Upload failed: {}", e);
            NotaryError::from(e)
        })
    }

    async fn poll(&self, request: &ArtifactRequest, handle: TrackingHandle) -> ArtifactOutcome {
        StatusPoller::new(
            self.service.as_ref(),
            request,
            handle,
            self.reporter.as_ref(),
            &self.cancel,
        )
        .with_intervals(self.intervals)
        .with_protocol(self.protocol)
        .with_log_fetcher(self.log_fetcher.as_deref())
        .run()
        .await
    }

    async fn staple(&self, request: &ArtifactRequest, outcome: ArtifactOutcome) -> ArtifactOutcome {
        let ArtifactOutcome::Accepted { record } = outcome else {
            return outcome;
        };
        if !request.staple {
            return ArtifactOutcome::Accepted { record };
        }
        let Some(stapler) = &self.stapler else {
            warn!(artifact = %request.path.display(), "Stapling requested but no stapler is configured");
            return ArtifactOutcome::Accepted { record };
        };

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NotaryError::Cancelled),
            result = stapler.staple(&request.path) => result,
        };

        match result {
            Ok(()) => {
                info!(artifact = %request.path.display(), "Ticket stapled");
                ArtifactOutcome::Accepted { record }
            }
            Err(cause) => {
                warn!(artifact = %request.path.display(), "Stapling failed: {}", cause);
                ArtifactOutcome::Errored {
                    cause,
                    record: Some(record),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_section_is_exclusive() {
        let section = UploadSection::new();
        let guard = section.enter().await;

        let other = section.clone();
        let waiter = tokio::spawn(async move {
            let _guard = other.enter().await;
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }
}
