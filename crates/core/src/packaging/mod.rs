//! Signing and packaging adapters.
//!
//! Thin wrappers around macOS command line tools, driven through
//! `tokio::process`. They run before notarization and never retry.

mod codesign;
mod dmg;
mod error;
mod tool;
mod traits;
mod zip;

pub use codesign::CodesignSigner;
pub use dmg::DmgPackager;
pub use error::PackagingError;
pub use traits::{Packager, Signer};
pub use zip::ZipPackager;
