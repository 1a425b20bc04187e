//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the notary service,
//! stapler and reporter traits, allowing the coordinator and poller to be
//! exercised without Apple's tools or network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use notary_core::testing::{fixtures, responses, MockNotaryService, RecordingReporter};
//!
//! let service = Arc::new(MockNotaryService::new());
//! service.script_status("artifact-0.zip", vec![responses::queued(), responses::accepted()]).await;
//!
//! let reporter = Arc::new(RecordingReporter::new());
//! let coordinator = NotarizationCoordinator::new(service.clone(), NotaryConfig::default())
//!     .with_reporter(reporter.clone());
//! let outcome = coordinator.run(fixtures::requests(3)).await;
//! ```

mod mock_notary;
mod mock_stapler;
mod recording_reporter;

pub use mock_notary::{responses, LogStep, MockCall, MockNotaryService, StatusStep};
pub use mock_stapler::MockStapler;
pub use recording_reporter::{RecordingReporter, ReportEvent};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::notary::{ArtifactRequest, NotaryConfig};

    /// Path of the `i`-th fixture artifact.
    pub fn artifact_path(i: usize) -> String {
        format!("artifact-{}.zip", i)
    }

    /// `n` requests named `artifact-0.zip`, `artifact-1.zip`, ...
    pub fn requests(n: usize) -> Vec<ArtifactRequest> {
        (0..n)
            .map(|i| ArtifactRequest::new(artifact_path(i)).with_bundle_id("com.example.app"))
            .collect()
    }

    /// Default config with the log protocol enabled.
    pub fn status_and_log_config() -> NotaryConfig {
        NotaryConfig {
            protocol: crate::notary::PollProtocol::StatusAndLog,
            ..Default::default()
        }
    }
}
