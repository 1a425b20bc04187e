pub mod auth;
pub mod config;
pub mod metrics;
pub mod notary;
pub mod packaging;
pub mod testing;

pub use auth::{AuthError, AuthMethod};
pub use config::{
    load_config, load_config_from_str, validate_config, AppleIdConfig, Config, ConfigError,
    SanitizedConfig,
};
pub use notary::{
    ArtifactOutcome, ArtifactRequest, CancelSignal, NotarizationCoordinator, NotaryConfig,
    NotaryError, NotaryService, NotarytoolService, RunError, RunOutcome,
};
pub use packaging::{Packager, PackagingError, Signer};
