//! `xcrun notarytool` based notary service and `xcrun stapler` stapler.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::auth::AuthMethod;

use super::classify::{RemoteError, RemoteErrors, CODE_UNSTRUCTURED};
use super::config::NotaryConfig;
use super::error::{NotaryError, UploadError};
use super::traits::{NotaryService, Stapler};
use super::types::{ArtifactRequest, LogReport, Phase, StatusReport, TrackingHandle};

/// Answer to `notarytool submit --output-format json`.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Answer to `notarytool info --output-format json`.
#[derive(Debug, Deserialize)]
struct InfoResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "logFileUrl", alias = "developerLogUrl", alias = "LogFileURL")]
    log_file_url: Option<String>,
}

/// Developer log printed by `notarytool log`.
#[derive(Debug, Deserialize)]
struct LogResponse {
    status: String,
    #[serde(default, rename = "statusSummary")]
    status_summary: Option<String>,
    #[serde(default, rename = "logFileUrl", alias = "developerLogUrl")]
    log_file_url: Option<String>,
}

/// Structured failure output.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default, rename = "product-errors", alias = "productErrors")]
    product_errors: Vec<ProductError>,
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductError {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Notary service backed by Apple's `notarytool`.
///
/// Each call is exactly one tool invocation. The child process is killed
/// if the returned future is dropped, which is how cancellation reaches it.
#[derive(Debug, Clone)]
pub struct NotarytoolService {
    program: PathBuf,
    base_args: Vec<String>,
    auth_args: Vec<String>,
}

impl NotarytoolService {
    /// Uses `xcrun notarytool` with the given credentials.
    pub fn new(auth: &AuthMethod) -> Self {
        Self {
            program: PathBuf::from("xcrun"),
            base_args: vec!["notarytool".to_string()],
            auth_args: auth.to_args(),
        }
    }

    pub fn from_config(config: &NotaryConfig, auth: &AuthMethod) -> Self {
        Self::new(auth).with_xcrun(&config.xcrun_path)
    }

    /// Overrides the `xcrun` binary.
    pub fn with_xcrun(mut self, xcrun: impl Into<PathBuf>) -> Self {
        self.program = xcrun.into();
        self
    }

    /// Replaces the whole base command, e.g. with a script in tests.
    pub fn with_base_command(mut self, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.base_args = args;
        self
    }

    async fn invoke(&self, subcommand: &str, args: &[&OsStr]) -> std::io::Result<Output> {
        debug!(program = %self.program.display(), subcommand, "Invoking notarytool");
        Command::new(&self.program)
            .args(&self.base_args)
            .arg(subcommand)
            .args(args)
            .args(&self.auth_args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }

    fn spawn_failure(&self, e: std::io::Error) -> RemoteErrors {
        RemoteErrors::single(
            CODE_UNSTRUCTURED,
            format!("failed to run {}: {}", self.program.display(), e),
        )
    }
}

#[async_trait]
impl NotaryService for NotarytoolService {
    fn name(&self) -> &str {
        "notarytool"
    }

    async fn upload(&self, request: &ArtifactRequest) -> Result<TrackingHandle, UploadError> {
        if !request.path.exists() {
            return Err(UploadError::ArtifactNotFound {
                path: request.path.clone(),
            });
        }

        let output = self
            .invoke(
                "submit",
                &[
                    request.path.as_os_str(),
                    OsStr::new("--output-format"),
                    OsStr::new("json"),
                ],
            )
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    UploadError::tool(format!("{} not found", self.program.display()), None)
                } else {
                    UploadError::Io(e)
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            if let Some(errors) = parse_remote_errors(&stdout).or_else(|| parse_remote_errors(&stderr)) {
                return Err(UploadError::Remote(errors));
            }
            return Err(UploadError::tool(
                format!("notarytool submit exited with {}", output.status),
                Some(stderr.into_owned()),
            ));
        }

        parse_submission(&stdout)
    }

    async fn query_status(&self, handle: &TrackingHandle) -> Result<StatusReport, RemoteErrors> {
        let output = self
            .invoke(
                "info",
                &[
                    OsStr::new(handle.as_str()),
                    OsStr::new("--output-format"),
                    OsStr::new("json"),
                ],
            )
            .await
            .map_err(|e| self.spawn_failure(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(failure_errors(&output));
        }
        parse_info(&stdout)
    }

    async fn query_log(&self, handle: &TrackingHandle) -> Result<LogReport, RemoteErrors> {
        let output = self
            .invoke("log", &[OsStr::new(handle.as_str())])
            .await
            .map_err(|e| self.spawn_failure(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(failure_errors(&output));
        }
        parse_log(&stdout)
    }
}

/// Staples notarization tickets with `xcrun stapler staple`.
#[derive(Debug, Clone)]
pub struct XcrunStapler {
    xcrun: PathBuf,
}

impl Default for XcrunStapler {
    fn default() -> Self {
        Self::new("xcrun")
    }
}

impl XcrunStapler {
    pub fn new(xcrun: impl Into<PathBuf>) -> Self {
        Self { xcrun: xcrun.into() }
    }
}

#[async_trait]
impl Stapler for XcrunStapler {
    async fn staple(&self, path: &Path) -> Result<(), NotaryError> {
        let output = Command::new(&self.xcrun)
            .args(["stapler", "staple"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NotaryError::Staple {
                message: format!("failed to run {}: {}", self.xcrun.display(), e),
            })?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotaryError::Staple {
                message: format!(
                    "{} for {}: {} {}",
                    output.status,
                    path.display(),
                    stdout.trim(),
                    stderr.trim()
                )
                .trim_end()
                .to_string(),
            });
        }
        Ok(())
    }
}

fn parse_submission(stdout: &str) -> Result<TrackingHandle, UploadError> {
    if let Ok(response) = serde_json::from_str::<SubmitResponse>(stdout.trim()) {
        if let Some(id) = response.id.filter(|id| !id.is_empty()) {
            return Ok(TrackingHandle::new(id));
        }
        if let Some(message) = response.message {
            return Err(UploadError::ParseError {
                reason: format!("no submission id in response: {}", message),
            });
        }
    }

    // Plain-text output ("  id: <uuid>").
    submission_id_from_text(stdout)
        .map(TrackingHandle::new)
        .ok_or_else(|| UploadError::ParseError {
            reason: format!("no submission id in output: {}", stdout.trim()),
        })
}

fn submission_id_from_text(text: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^\s*id:\s*([0-9A-Fa-f-]{36})\s*$").ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn parse_info(stdout: &str) -> Result<StatusReport, RemoteErrors> {
    let raw: serde_json::Value = serde_json::from_str(stdout.trim())
        .map_err(|e| unparseable("info", e))?;
    let info: InfoResponse =
        serde_json::from_value(raw.clone()).map_err(|e| unparseable("info", e))?;

    let mut report = StatusReport::new(info.status.clone()).with_raw(raw);
    if let Some(url) = info.log_file_url.filter(|u| !u.is_empty()) {
        report = report.with_diagnostic_ref(url);
    }
    if let Some(message) = info.message {
        debug!(status = %info.status, "{}", message);
    }
    Ok(report)
}

fn parse_log(stdout: &str) -> Result<LogReport, RemoteErrors> {
    let raw: serde_json::Value =
        serde_json::from_str(stdout.trim()).map_err(|e| unparseable("log", e))?;
    let log: LogResponse =
        serde_json::from_value(raw.clone()).map_err(|e| unparseable("log", e))?;

    let status_text = match &log.status_summary {
        Some(summary) if !summary.is_empty() => format!("{} ({})", log.status, summary),
        _ => log.status.clone(),
    };
    let mut report = LogReport::new(status_text).with_log_body(stdout.trim());
    report.phase = Phase::from_remote(&log.status);
    report.raw = raw;
    if let Some(url) = log.log_file_url.filter(|u| !u.is_empty()) {
        report = report.with_diagnostic_ref(url);
    }
    Ok(report)
}

fn unparseable(what: &str, e: serde_json::Error) -> RemoteErrors {
    RemoteErrors::single(
        CODE_UNSTRUCTURED,
        format!("failed to parse notarytool {} output: {}", what, e),
    )
}

/// Errors for a failed query, never empty.
fn failure_errors(output: &Output) -> RemoteErrors {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    parse_remote_errors(&stdout)
        .or_else(|| parse_remote_errors(&stderr))
        .unwrap_or_else(|| {
            let detail = [stdout.trim(), stderr.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            RemoteErrors::single(
                CODE_UNSTRUCTURED,
                format!("notarytool exited with {}: {}", output.status, detail),
            )
        })
}

/// Extracts remote error codes from tool output, if it carries any.
fn parse_remote_errors(text: &str) -> Option<RemoteErrors> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(trimmed) {
        if !envelope.product_errors.is_empty() {
            return Some(RemoteErrors::new(
                envelope
                    .product_errors
                    .into_iter()
                    .map(|e| RemoteError::new(e.code, e.message))
                    .collect(),
            ));
        }
        if let Some(code) = envelope.code {
            return Some(RemoteErrors::single(
                code,
                envelope.message.unwrap_or_default(),
            ));
        }
    }

    // NSError text, e.g. "Error Domain=... Code=-19000 ...".
    let re = Regex::new(r"Code=(-?\d+)").ok()?;
    let errors: Vec<RemoteError> = re
        .captures_iter(trimmed)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i64>().ok())
        .map(|code| RemoteError::new(code, trimmed))
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(RemoteErrors::new(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notary::classify::{classify, Disposition};

    #[test]
    fn test_parse_submission_json() {
        let out = r#"{"message":"Successfully uploaded file","id":"2efe2717-52ef-43a5-96dc-0797e4ca1041","path":"/tmp/app.zip"}"#;
        let handle = parse_submission(out).unwrap();
        assert_eq!(handle.as_str(), "2efe2717-52ef-43a5-96dc-0797e4ca1041");
    }

    #[test]
    fn test_parse_submission_text_fallback() {
        let out = "Conducting pre-submission checks for app.zip...\nSubmission ID received\n  id: 2efe2717-52ef-43a5-96dc-0797e4ca1041\n";
        let handle = parse_submission(out).unwrap();
        assert_eq!(handle.as_str(), "2efe2717-52ef-43a5-96dc-0797e4ca1041");
    }

    #[test]
    fn test_parse_submission_without_id() {
        let err = parse_submission(r#"{"message":"nope"}"#).unwrap_err();
        assert!(matches!(err, UploadError::ParseError { .. }));
    }

    #[test]
    fn test_parse_info() {
        let out = r#"{"status":"In Progress","id":"abc","message":"Successfully received submission info"}"#;
        let report = parse_info(out).unwrap();
        assert_eq!(report.phase, Phase::InProgress);
        assert_eq!(report.status_text, "In Progress");
        assert!(report.diagnostic_ref.is_none());
        assert_eq!(report.raw["id"], "abc");

        let out = r#"{"status":"Invalid","logFileUrl":"https://example.com/log.json"}"#;
        let report = parse_info(out).unwrap();
        assert_eq!(report.phase, Phase::Rejected);
        assert_eq!(
            report.diagnostic_ref.as_deref(),
            Some("https://example.com/log.json")
        );
    }

    #[test]
    fn test_parse_info_garbage_is_terminal() {
        let errors = parse_info("not json").unwrap_err();
        assert_eq!(classify(&errors), Disposition::Terminal);
    }

    #[test]
    fn test_parse_log() {
        let out = r#"{"logFormatVersion":1,"jobId":"abc","status":"Invalid","statusSummary":"Archive contains critical validation errors","issues":[]}"#;
        let report = parse_log(out).unwrap();
        assert_eq!(report.phase, Phase::Rejected);
        assert_eq!(
            report.status_text,
            "Invalid (Archive contains critical validation errors)"
        );
        assert!(report.log_body.unwrap().contains("critical validation"));
    }

    #[test]
    fn test_parse_remote_errors_product_errors() {
        let out = r#"{"product-errors":[{"code":1519,"message":"Could not find the RequestUUID."}]}"#;
        let errors = parse_remote_errors(out).unwrap();
        assert_eq!(errors.codes(), vec![1519]);
        assert_eq!(classify(&errors), Disposition::QueuedNotFound);
    }

    #[test]
    fn test_parse_remote_errors_top_level_code() {
        let errors = parse_remote_errors(r#"{"code":-19000,"message":"offline"}"#).unwrap();
        assert_eq!(classify(&errors), Disposition::TransientNetwork);
    }

    #[test]
    fn test_parse_remote_errors_nserror_text() {
        let text = "Error: Error Domain=ITunesConnectionOperationErrorDomain Code=-19000 \"The network connection was lost\"";
        let errors = parse_remote_errors(text).unwrap();
        assert!(errors.contains_code(-19000));
    }

    #[test]
    fn test_parse_remote_errors_unstructured() {
        assert!(parse_remote_errors("").is_none());
        assert!(parse_remote_errors("Error: HTTP status code: 401").is_none());
    }

    #[cfg(unix)]
    mod tool {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-notarytool");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn service(program: PathBuf) -> NotarytoolService {
            let auth = AuthMethod::AppleId {
                username: "dev@example.com".to_string(),
                password: "secret".to_string(),
                provider: None,
            };
            NotarytoolService::new(&auth).with_base_command(program, Vec::new())
        }

        #[tokio::test]
        async fn test_upload_missing_artifact() {
            let dir = tempfile::tempdir().unwrap();
            let svc = service(script(dir.path(), "exit 0"));
            let err = svc
                .upload(&ArtifactRequest::new(dir.path().join("missing.zip")))
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::ArtifactNotFound { .. }));
        }

        #[tokio::test]
        async fn test_upload_passes_auth_args() {
            let dir = tempfile::tempdir().unwrap();
            let artifact = dir.path().join("app.zip");
            std::fs::write(&artifact, b"zip").unwrap();
            let args_file = dir.path().join("args");
            let program = script(
                dir.path(),
                &format!(
                    "echo \"$@\" > {}\necho '{{\"id\":\"11111111-2222-3333-4444-555555555555\"}}'",
                    args_file.display()
                ),
            );

            let handle = service(program)
                .upload(&ArtifactRequest::new(&artifact))
                .await
                .unwrap();
            assert_eq!(handle.as_str(), "11111111-2222-3333-4444-555555555555");

            let args = std::fs::read_to_string(&args_file).unwrap();
            assert!(args.starts_with("submit "));
            assert!(args.contains("--output-format json"));
            assert!(args.contains("--apple-id dev@example.com --password secret"));
        }

        #[tokio::test]
        async fn test_upload_tool_failure_keeps_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let artifact = dir.path().join("app.zip");
            std::fs::write(&artifact, b"zip").unwrap();
            let program = script(dir.path(), "echo 'bad credentials' >&2\nexit 1");

            let err = service(program)
                .upload(&ArtifactRequest::new(&artifact))
                .await
                .unwrap_err();
            match err {
                UploadError::Tool { stderr, .. } => {
                    assert!(stderr.unwrap().contains("bad credentials"))
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_query_status_failure_codes() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(
                dir.path(),
                "echo '{\"product-errors\":[{\"code\":1519,\"message\":\"not found\"}]}'\nexit 1",
            );

            let errors = service(program)
                .query_status(&TrackingHandle::new("abc"))
                .await
                .unwrap_err();
            assert!(errors.contains_code(1519));
        }

        #[tokio::test]
        async fn test_query_status_unstructured_failure() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), "echo 'boom' >&2\nexit 3");

            let errors = service(program)
                .query_status(&TrackingHandle::new("abc"))
                .await
                .unwrap_err();
            assert_eq!(errors.codes(), vec![CODE_UNSTRUCTURED]);
            assert!(errors.to_string().contains("boom"));
        }

        #[tokio::test]
        async fn test_stapler_failure() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), "echo 'no ticket' >&2\nexit 65");

            let err = XcrunStapler::new(program)
                .staple(Path::new("app.dmg"))
                .await
                .unwrap_err();
            assert!(matches!(err, NotaryError::Staple { .. }));
            assert!(err.to_string().contains("no ticket"));
        }
    }
}
