//! Shared helpers for running packaging tools.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use super::error::PackagingError;

/// Runs `program` to completion, failing on a non-zero exit.
pub(crate) async fn run_tool<I, S>(program: &Path, args: I) -> Result<String, PackagingError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    debug!(program = %program.display(), ?args, "Running packaging tool");

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PackagingError::ToolNotFound {
                    tool: program.to_path_buf(),
                }
            } else {
                PackagingError::Io(e)
            }
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = [stdout.trim(), stderr.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(PackagingError::ToolFailed {
            tool: program.display().to_string(),
            status: output.status.to_string(),
            output: combined,
        });
    }
    Ok(stdout)
}

/// Fails if any input is missing or there are no inputs.
pub(crate) fn check_inputs(files: &[PathBuf]) -> Result<(), PackagingError> {
    if files.is_empty() {
        return Err(PackagingError::NoInputs);
    }
    match files.iter().find(|f| !f.exists()) {
        Some(missing) => Err(PackagingError::InputNotFound {
            path: missing.clone(),
        }),
        None => Ok(()),
    }
}

/// Temporary directory holding copies of the inputs. Removed on [`cleanup`](Self::cleanup).
pub(crate) struct Staging {
    root: PathBuf,
}

impl Staging {
    /// Copies every input into a fresh directory with `ditto`.
    pub(crate) async fn create(ditto: &Path, files: &[PathBuf]) -> Result<Self, PackagingError> {
        let root = std::env::temp_dir().join(format!("notary-stage-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&root).await?;
        let staging = Self { root };

        for file in files {
            let Some(name) = file.file_name() else {
                staging.cleanup().await;
                return Err(PackagingError::InputNotFound { path: file.clone() });
            };
            let dest = staging.root.join(name);
            if let Err(e) = run_tool(ditto, [file.as_os_str(), dest.as_os_str()]).await {
                staging.cleanup().await;
                return Err(e);
            }
        }
        Ok(staging)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.root
    }

    pub(crate) async fn cleanup(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            warn!(path = %self.root.display(), "Failed to remove staging directory: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_inputs() {
        assert!(matches!(check_inputs(&[]), Err(PackagingError::NoInputs)));

        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a");
        std::fs::write(&present, "x").unwrap();
        assert!(check_inputs(&[present.clone()]).is_ok());

        let missing = dir.path().join("b");
        match check_inputs(&[present, missing.clone()]) {
            Err(PackagingError::InputNotFound { path }) => assert_eq!(path, missing),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let err = run_tool(Path::new("/nonexistent/tool"), ["--version"])
            .await
            .unwrap_err();
        assert!(matches!(err, PackagingError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_failure_captures_output() {
        let err = run_tool(Path::new("/bin/sh"), ["-c", "echo oops >&2; exit 2"])
            .await
            .unwrap_err();
        match err {
            PackagingError::ToolFailed { output, .. } => assert_eq!(output, "oops"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
