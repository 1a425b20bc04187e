//! Mock stapler for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notary::{NotaryError, Stapler};

/// Mock implementation of the Stapler trait.
///
/// Records stapled paths; the next call fails when an error is set.
#[derive(Debug, Default)]
pub struct MockStapler {
    stapled: Arc<RwLock<Vec<PathBuf>>>,
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockStapler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next staple fail.
    pub async fn set_next_error(&self, message: impl Into<String>) {
        *self.next_error.write().await = Some(message.into());
    }

    /// Paths stapled successfully.
    pub async fn stapled(&self) -> Vec<PathBuf> {
        self.stapled.read().await.clone()
    }
}

#[async_trait]
impl Stapler for MockStapler {
    async fn staple(&self, path: &Path) -> Result<(), NotaryError> {
        if let Some(message) = self.next_error.write().await.take() {
            return Err(NotaryError::Staple { message });
        }
        self.stapled.write().await.push(path.to_path_buf());
        Ok(())
    }
}
