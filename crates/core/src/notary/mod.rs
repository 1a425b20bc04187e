//! Notarization engine.
//!
//! Submits artifacts to a remote notary service, polls each submission to
//! a verdict, and collects one disposition per artifact.
//!
//! # Structure
//!
//! - [`NotaryService`]: upload and query seam, implemented by
//!   [`NotarytoolService`] and by the mocks in `crate::testing`
//! - [`classify`]: maps remote error codes to retry dispositions
//! - [`StatusPoller`]: per-artifact state machine over [`next_step`]
//! - [`NotarizationCoordinator`]: one task per artifact, serialized uploads
//! - [`Reporter`]: observation sinks
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use notary_core::notary::{ArtifactRequest, NotarizationCoordinator, NotarytoolService, NotaryConfig};
//!
//! let service = NotarytoolService::new(&auth);
//! let coordinator = NotarizationCoordinator::new(Arc::new(service), NotaryConfig::default());
//!
//! let outcome = coordinator
//!     .run(vec![ArtifactRequest::new("dist/app.zip")])
//!     .await;
//! if let Some(err) = outcome.error() {
//!     eprintln!("{}", err);
//! }
//! ```

mod cancel;
mod classify;
mod config;
mod coordinator;
mod error;
mod log_fetch;
mod notarytool;
mod poller;
mod reporter;
mod traits;
mod types;

pub use cancel::CancelSignal;
pub use classify::{
    classify, Disposition, RemoteError, RemoteErrors, CODE_NETWORK_UNAVAILABLE,
    CODE_NOT_FOUND_IN_QUEUE, CODE_UNSTRUCTURED,
};
pub use config::{NotaryConfig, PollIntervals, PollProtocol};
pub use coordinator::{NotarizationCoordinator, UploadSection};
pub use error::{NotaryError, UploadError};
pub use log_fetch::LogFetcher;
pub use notarytool::{NotarytoolService, XcrunStapler};
pub use poller::{
    combine_verdicts, next_step, Cadence, Observation, PollState, Sleep, StatusPoller, Step,
    Verdict,
};
pub use reporter::{
    status_prefixes, ConsoleReporter, NoopReporter, OutputSection, Reporter, TracingReporter,
};
pub use traits::{NotaryService, Stapler};
pub use types::{
    ArtifactFailure, ArtifactOutcome, ArtifactRequest, ArtifactResult, LogReport, Phase,
    PhaseRecord, RunError, RunOutcome, StatusReport, TrackingHandle,
};
