//! `codesign` based signer.

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::config::SignConfig;

use super::error::PackagingError;
use super::tool::{check_inputs, run_tool};
use super::traits::Signer;

/// Signs with a Developer ID using the hardened runtime.
#[derive(Debug, Clone)]
pub struct CodesignSigner {
    codesign_path: PathBuf,
    identity: String,
    entitlements: Option<PathBuf>,
}

impl CodesignSigner {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            codesign_path: PathBuf::from("codesign"),
            identity: identity.into(),
            entitlements: None,
        }
    }

    pub fn from_config(config: &SignConfig) -> Self {
        let signer = Self::new(&config.application_identity);
        match &config.entitlements_file {
            Some(file) => signer.with_entitlements(file),
            None => signer,
        }
    }

    pub fn with_entitlements(mut self, file: impl Into<PathBuf>) -> Self {
        self.entitlements = Some(file.into());
        self
    }

    pub fn with_codesign_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.codesign_path = path.into();
        self
    }

    fn build_args(&self, files: &[PathBuf]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-s".into(),
            self.identity.clone().into(),
            "-f".into(),
            "-v".into(),
            "--timestamp".into(),
            "--options".into(),
            "runtime".into(),
        ];
        if let Some(entitlements) = &self.entitlements {
            args.push("--entitlements".into());
            args.push(entitlements.clone().into());
        }
        args.extend(files.iter().map(|f| f.clone().into_os_string()));
        args
    }
}

#[async_trait]
impl Signer for CodesignSigner {
    fn name(&self) -> &str {
        "codesign"
    }

    async fn sign(&self, files: &[PathBuf]) -> Result<(), PackagingError> {
        check_inputs(files)?;
        run_tool(&self.codesign_path, self.build_args(files)).await?;
        info!(files = files.len(), identity = %self.identity, "Code signing complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let signer = CodesignSigner::new("Developer ID Application: Example");
        let args = signer.build_args(&[PathBuf::from("bin/a"), PathBuf::from("bin/b")]);
        assert_eq!(
            args,
            [
                "-s",
                "Developer ID Application: Example",
                "-f",
                "-v",
                "--timestamp",
                "--options",
                "runtime",
                "bin/a",
                "bin/b"
            ]
            .map(OsString::from)
            .to_vec()
        );
    }

    #[test]
    fn test_build_args_with_entitlements() {
        let signer = CodesignSigner::from_config(&SignConfig {
            application_identity: "id".to_string(),
            entitlements_file: Some(PathBuf::from("ent.plist")),
        });
        let args = signer.build_args(&[PathBuf::from("app")]);
        let pos = args.iter().position(|a| a == "--entitlements").unwrap();
        assert_eq!(args[pos + 1], "ent.plist");
        assert_eq!(args.last().unwrap(), "app");
    }

    #[tokio::test]
    async fn test_sign_missing_input() {
        let signer = CodesignSigner::new("id");
        let err = signer
            .sign(&[PathBuf::from("/nonexistent/binary")])
            .await
            .unwrap_err();
        assert!(matches!(err, PackagingError::InputNotFound { .. }));
    }
}
