//! Signing and packaging traits.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::error::PackagingError;

/// Code signs files in place.
#[async_trait]
pub trait Signer: Send + Sync {
    fn name(&self) -> &str;

    /// Signs every file. No retries.
    async fn sign(&self, files: &[PathBuf]) -> Result<(), PackagingError>;
}

/// Bundles files into one distributable artifact.
#[async_trait]
pub trait Packager: Send + Sync {
    fn name(&self) -> &str;

    /// Where the artifact will be written.
    fn output_path(&self) -> &Path;

    /// Creates the artifact and returns its path.
    async fn package(&self, files: &[PathBuf]) -> Result<PathBuf, PackagingError>;
}
