//! Trait definitions for the remote notarization service.

use std::path::Path;

use async_trait::async_trait;

use super::classify::RemoteErrors;
use super::error::{NotaryError, UploadError};
use super::types::{ArtifactRequest, LogReport, StatusReport, TrackingHandle};

/// Remote approval service as seen by the engine.
///
/// Implementations invoke the external tool or network exactly once per
/// call. Retry policy belongs to the coordinator and the poller, never here.
#[async_trait]
pub trait NotaryService: Send + Sync {
    /// Returns the name of this service implementation.
    fn name(&self) -> &str;

    /// Uploads one artifact and returns its tracking handle.
    async fn upload(&self, request: &ArtifactRequest) -> Result<TrackingHandle, UploadError>;

    /// Queries the primary status resource.
    async fn query_status(&self, handle: &TrackingHandle) -> Result<StatusReport, RemoteErrors>;

    /// Queries the secondary log/analysis resource.
    async fn query_log(&self, handle: &TrackingHandle) -> Result<LogReport, RemoteErrors>;
}

/// Attaches an approval ticket to an accepted file.
#[async_trait]
pub trait Stapler: Send + Sync {
    async fn staple(&self, path: &Path) -> Result<(), NotaryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notary::types::Phase;

    struct AlwaysAccepted;

    #[async_trait]
    impl NotaryService for AlwaysAccepted {
        fn name(&self) -> &str {
            "always-accepted"
        }

        async fn upload(&self, request: &ArtifactRequest) -> Result<TrackingHandle, UploadError> {
            Ok(TrackingHandle::new(request.path.display().to_string()))
        }

        async fn query_status(
            &self,
            _handle: &TrackingHandle,
        ) -> Result<StatusReport, RemoteErrors> {
            Ok(StatusReport::new("Accepted"))
        }

        async fn query_log(&self, _handle: &TrackingHandle) -> Result<LogReport, RemoteErrors> {
            Ok(LogReport::new("Accepted"))
        }
    }

    #[tokio::test]
    async fn test_service_is_object_safe() {
        let service: Box<dyn NotaryService> = Box::new(AlwaysAccepted);
        let handle = service
            .upload(&ArtifactRequest::new("/tmp/app.zip"))
            .await
            .unwrap();
        assert_eq!(handle.as_str(), "/tmp/app.zip");

        let status = service.query_status(&handle).await.unwrap();
        assert_eq!(status.phase, Phase::Accepted);
        assert_eq!(service.name(), "always-accepted");
    }
}
