//! Disk images built with `create-dmg`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::config::DmgConfig;

use super::error::PackagingError;
use super::tool::{check_inputs, run_tool, Staging};
use super::traits::Packager;

/// Creates a dmg holding the inputs. Dmg files support stapling.
#[derive(Debug, Clone)]
pub struct DmgPackager {
    create_dmg_path: PathBuf,
    ditto_path: PathBuf,
    output_path: PathBuf,
    volume_name: String,
    skip_prettification: bool,
}

impl DmgPackager {
    pub fn new(output_path: impl Into<PathBuf>, volume_name: impl Into<String>) -> Self {
        Self {
            create_dmg_path: PathBuf::from("create-dmg"),
            ditto_path: PathBuf::from("ditto"),
            output_path: output_path.into(),
            volume_name: volume_name.into(),
            skip_prettification: false,
        }
    }

    pub fn from_config(config: &DmgConfig) -> Self {
        Self::new(&config.output_path, &config.volume_name)
            .skip_prettification(config.skip_prettification)
    }

    /// Skips the Finder layout step, which needs a GUI session.
    pub fn skip_prettification(mut self, skip: bool) -> Self {
        self.skip_prettification = skip;
        self
    }

    pub fn with_tool_paths(
        mut self,
        create_dmg: impl Into<PathBuf>,
        ditto: impl Into<PathBuf>,
    ) -> Self {
        self.create_dmg_path = create_dmg.into();
        self.ditto_path = ditto.into();
        self
    }

    fn build_args(&self, source_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--volname".into(), self.volume_name.clone().into()];
        if self.skip_prettification {
            args.push("--skip-jenkins".into());
        }
        args.push(self.output_path.clone().into_os_string());
        args.push(source_dir.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl Packager for DmgPackager {
    fn name(&self) -> &str {
        "dmg"
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }

    async fn package(&self, files: &[PathBuf]) -> Result<PathBuf, PackagingError> {
        check_inputs(files)?;

        // create-dmg refuses to overwrite.
        if self.output_path.exists() {
            tokio::fs::remove_file(&self.output_path).await?;
        }

        let staging = Staging::create(&self.ditto_path, files).await?;
        let result = run_tool(&self.create_dmg_path, self.build_args(staging.path())).await;
        staging.cleanup().await;
        result?;

        info!(output = %self.output_path.display(), volume = %self.volume_name, "Dmg created");
        Ok(self.output_path.clone())
    }
}
