//! Zip archives built with `ditto`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::config::ZipConfig;

use super::error::PackagingError;
use super::tool::{check_inputs, run_tool, Staging};
use super::traits::Packager;

/// Creates a zip the way Finder would, keeping resource forks apart.
///
/// Zip files cannot be stapled.
#[derive(Debug, Clone)]
pub struct ZipPackager {
    ditto_path: PathBuf,
    output_path: PathBuf,
}

impl ZipPackager {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            ditto_path: PathBuf::from("ditto"),
            output_path: output_path.into(),
        }
    }

    pub fn from_config(config: &ZipConfig) -> Self {
        Self::new(&config.output_path)
    }

    pub fn with_ditto_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ditto_path = path.into();
        self
    }

    async fn archive(&self, source: &Path, keep_parent: bool) -> Result<(), PackagingError> {
        let mut args = vec![OsStr::new("-c"), OsStr::new("-k"), OsStr::new("--sequesterRsrc")];
        if keep_parent {
            args.push(OsStr::new("--keepParent"));
        }
        args.push(source.as_os_str());
        args.push(self.output_path.as_os_str());
        run_tool(&self.ditto_path, args).await.map(|_| ())
    }
}

#[async_trait]
impl Packager for ZipPackager {
    fn name(&self) -> &str {
        "zip"
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }

    async fn package(&self, files: &[PathBuf]) -> Result<PathBuf, PackagingError> {
        check_inputs(files)?;

        if let [single] = files {
            self.archive(single, true).await?;
        } else {
            // ditto archives one source, so stage several inputs together.
            let staging = Staging::create(&self.ditto_path, files).await?;
            let result = self.archive(staging.path(), false).await;
            staging.cleanup().await;
            result?;
        }

        info!(output = %self.output_path.display(), files = files.len(), "Zip archive created");
        Ok(self.output_path.clone())
    }
}
