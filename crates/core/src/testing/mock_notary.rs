//! Mock notary service for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::notary::{
    ArtifactRequest, LogReport, NotaryService, RemoteErrors, StatusReport, TrackingHandle,
    UploadError,
};

/// One scripted answer to a status query.
pub type StatusStep = Result<StatusReport, RemoteErrors>;

/// One scripted answer to a log query.
pub type LogStep = Result<LogReport, RemoteErrors>;

/// A recorded call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Upload(PathBuf),
    QueryStatus(PathBuf),
    QueryLog(PathBuf),
}

/// How a scripted upload fails.
#[derive(Debug, Clone)]
enum UploadFailure {
    Tool(String),
    Remote(RemoteErrors),
}

/// Mock implementation of the NotaryService trait.
///
/// Provides controllable behavior for testing:
/// - Scripted status and log answers per artifact path
/// - Simulated upload failures and upload duration
/// - Detection of overlapping uploads
/// - Call recording
///
/// Scripts are consumed in order; the last step repeats once the script
/// runs out. Unscripted artifacts are accepted on the first query.
///
/// # Example
///
/// ```rust,ignore
/// use notary_core::testing::{responses, MockNotaryService};
///
/// let service = MockNotaryService::new();
/// service
///     .script_status("app.zip", vec![responses::queued(), responses::accepted()])
///     .await;
///
/// // ... run the coordinator ...
///
/// assert_eq!(service.max_concurrent_uploads(), 1);
/// ```
#[derive(Debug)]
pub struct MockNotaryService {
    status_scripts: Arc<RwLock<HashMap<PathBuf, VecDeque<StatusStep>>>>,
    log_scripts: Arc<RwLock<HashMap<PathBuf, VecDeque<LogStep>>>>,
    upload_failures: Arc<RwLock<HashMap<PathBuf, UploadFailure>>>,
    /// Handle to artifact path.
    handles: Arc<RwLock<HashMap<TrackingHandle, PathBuf>>>,
    calls: Arc<RwLock<Vec<MockCall>>>,
    upload_delay: Arc<RwLock<Duration>>,
    uploads_in_flight: AtomicUsize,
    max_uploads_in_flight: AtomicUsize,
}

impl Default for MockNotaryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNotaryService {
    /// Create a new mock notary service.
    pub fn new() -> Self {
        Self {
            status_scripts: Arc::new(RwLock::new(HashMap::new())),
            log_scripts: Arc::new(RwLock::new(HashMap::new())),
            upload_failures: Arc::new(RwLock::new(HashMap::new())),
            handles: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            upload_delay: Arc::new(RwLock::new(Duration::from_millis(10))),
            uploads_in_flight: AtomicUsize::new(0),
            max_uploads_in_flight: AtomicUsize::new(0),
        }
    }

    /// Script the status answers for an artifact.
    pub async fn script_status(&self, path: impl Into<PathBuf>, steps: Vec<StatusStep>) {
        self.status_scripts
            .write()
            .await
            .insert(path.into(), steps.into());
    }

    /// Script the log answers for an artifact.
    pub async fn script_log(&self, path: impl Into<PathBuf>, steps: Vec<LogStep>) {
        self.log_scripts
            .write()
            .await
            .insert(path.into(), steps.into());
    }

    /// Make the upload of an artifact fail as a tool error.
    pub async fn fail_upload(&self, path: impl Into<PathBuf>, message: impl Into<String>) {
        self.upload_failures
            .write()
            .await
            .insert(path.into(), UploadFailure::Tool(message.into()));
    }

    /// Make the upload of an artifact fail with remote errors.
    pub async fn fail_upload_remote(&self, path: impl Into<PathBuf>, errors: RemoteErrors) {
        self.upload_failures
            .write()
            .await
            .insert(path.into(), UploadFailure::Remote(errors));
    }

    /// How long each upload takes.
    pub async fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.write().await = delay;
    }

    /// All calls in the order they were made.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.read().await.clone()
    }

    pub async fn upload_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Upload(_))).await
    }

    pub async fn status_query_count(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.count(|c| matches!(c, MockCall::QueryStatus(p) if p == path))
            .await
    }

    pub async fn log_query_count(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.count(|c| matches!(c, MockCall::QueryLog(p) if p == path))
            .await
    }

    /// Highest number of uploads that were running at the same time.
    pub fn max_concurrent_uploads(&self) -> usize {
        self.max_uploads_in_flight.load(Ordering::SeqCst)
    }

    async fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.read().await.iter().filter(|c| pred(c)).count()
    }

    async fn path_for(&self, handle: &TrackingHandle) -> Option<PathBuf> {
        self.handles.read().await.get(handle).cloned()
    }

    fn next_step<T: Clone>(script: &mut VecDeque<T>) -> Option<T> {
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

/// Counts an upload as running until dropped, cancelled uploads included.
struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

fn unknown_handle(handle: &TrackingHandle) -> RemoteErrors {
    RemoteErrors::single(1519, format!("unknown submission {}", handle))
}

#[async_trait]
impl NotaryService for MockNotaryService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, request: &ArtifactRequest) -> Result<TrackingHandle, UploadError> {
        let _in_flight = InFlight::enter(&self.uploads_in_flight, &self.max_uploads_in_flight);

        self.calls
            .write()
            .await
            .push(MockCall::Upload(request.path.clone()));

        let delay = *self.upload_delay.read().await;
        tokio::time::sleep(delay).await;

        let failure = self.upload_failures.read().await.get(&request.path).cloned();

        match failure {
            Some(UploadFailure::Tool(message)) => Err(UploadError::tool(message, None)),
            Some(UploadFailure::Remote(errors)) => Err(UploadError::Remote(errors)),
            None => {
                let handle = TrackingHandle::new(uuid::Uuid::new_v4().to_string());
                self.handles
                    .write()
                    .await
                    .insert(handle.clone(), request.path.clone());
                Ok(handle)
            }
        }
    }

    async fn query_status(&self, handle: &TrackingHandle) -> Result<StatusReport, RemoteErrors> {
        let path = self
            .path_for(handle)
            .await
            .ok_or_else(|| unknown_handle(handle))?;
        self.calls
            .write()
            .await
            .push(MockCall::QueryStatus(path.clone()));

        let mut scripts = self.status_scripts.write().await;
        match scripts.get_mut(&path).and_then(Self::next_step) {
            Some(step) => step,
            None => Ok(StatusReport::new("Accepted")),
        }
    }

    async fn query_log(&self, handle: &TrackingHandle) -> Result<LogReport, RemoteErrors> {
        let path = self
            .path_for(handle)
            .await
            .ok_or_else(|| unknown_handle(handle))?;
        self.calls.write().await.push(MockCall::QueryLog(path.clone()));

        let mut scripts = self.log_scripts.write().await;
        match scripts.get_mut(&path).and_then(Self::next_step) {
            Some(step) => step,
            None => Ok(LogReport::new("Accepted")),
        }
    }
}

/// Canned answers for scripts.
pub mod responses {
    use crate::notary::{
        LogReport, RemoteErrors, StatusReport, CODE_NETWORK_UNAVAILABLE, CODE_NOT_FOUND_IN_QUEUE,
    };

    use super::{LogStep, StatusStep};

    /// Submission not visible yet.
    pub fn queued() -> StatusStep {
        Err(RemoteErrors::single(
            CODE_NOT_FOUND_IN_QUEUE,
            "Could not find the RequestUUID.",
        ))
    }

    /// Temporary network outage.
    pub fn network_down() -> StatusStep {
        Err(RemoteErrors::single(
            CODE_NETWORK_UNAVAILABLE,
            "The network connection was lost.",
        ))
    }

    /// Any remote error code.
    pub fn remote_error(code: i64, message: &str) -> StatusStep {
        Err(RemoteErrors::single(code, message))
    }

    pub fn in_progress() -> StatusStep {
        Ok(StatusReport::new("In Progress"))
    }

    pub fn accepted() -> StatusStep {
        Ok(StatusReport::new("Accepted"))
    }

    /// Rejected with a log reference.
    pub fn rejected(log_ref: &str) -> StatusStep {
        Ok(StatusReport::new("Invalid").with_diagnostic_ref(log_ref))
    }

    /// Rejected without any reference.
    pub fn rejected_bare() -> StatusStep {
        Ok(StatusReport::new("Invalid"))
    }

    pub fn log_queued() -> LogStep {
        Err(RemoteErrors::single(
            CODE_NOT_FOUND_IN_QUEUE,
            "Submission log is not yet available.",
        ))
    }

    pub fn log_network_down() -> LogStep {
        Err(RemoteErrors::single(
            CODE_NETWORK_UNAVAILABLE,
            "The network connection was lost.",
        ))
    }

    pub fn log_accepted() -> LogStep {
        Ok(LogReport::new("Accepted").with_log_body("{\"status\":\"Accepted\"}"))
    }

    pub fn log_rejected(body: &str) -> LogStep {
        Ok(LogReport::new("Invalid").with_log_body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_artifact_is_accepted() {
        let service = MockNotaryService::new();
        let handle = service
            .upload(&ArtifactRequest::new("a.zip"))
            .await
            .unwrap();
        let report = service.query_status(&handle).await.unwrap();
        assert_eq!(report.status_text, "Accepted");
        assert_eq!(
            service.calls().await,
            vec![
                MockCall::Upload(PathBuf::from("a.zip")),
                MockCall::QueryStatus(PathBuf::from("a.zip"))
            ]
        );
    }

    #[tokio::test]
    async fn test_script_last_step_repeats() {
        let service = MockNotaryService::new();
        service
            .script_status("a.zip", vec![responses::queued(), responses::in_progress()])
            .await;
        let handle = service
            .upload(&ArtifactRequest::new("a.zip"))
            .await
            .unwrap();

        assert!(service.query_status(&handle).await.is_err());
        for _ in 0..3 {
            let report = service.query_status(&handle).await.unwrap();
            assert_eq!(report.status_text, "In Progress");
        }
        assert_eq!(service.status_query_count("a.zip").await, 4);
    }

    #[tokio::test]
    async fn test_upload_failure() {
        let service = MockNotaryService::new();
        service.fail_upload("a.zip", "boom").await;
        let err = service
            .upload(&ArtifactRequest::new("a.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Tool { .. }));
        assert_eq!(service.upload_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let service = MockNotaryService::new();
        let errors = service
            .query_status(&TrackingHandle::new("nope"))
            .await
            .unwrap_err();
        assert!(errors.contains_code(1519));
    }
}
