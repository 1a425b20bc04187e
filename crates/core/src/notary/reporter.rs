//! Observation sinks for notarization progress.
//!
//! Reporters never influence control flow. They may be invoked from many
//! artifact workers at once, so implementations that share an output sink
//! serialize their writes through an [`OutputSection`].

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::poller::PollState;
use super::types::{ArtifactOutcome, ArtifactRequest, LogReport, PhaseRecord, StatusReport, TrackingHandle};

/// Receives ordered per-artifact notifications.
pub trait Reporter: Send + Sync {
    /// The artifact acquired the upload section and is being submitted.
    fn submitting(&self, _request: &ArtifactRequest) {}

    /// The upload succeeded.
    fn submitted(&self, _request: &ArtifactRequest, _handle: &TrackingHandle) {}

    /// A status query returned a report.
    fn status(&self, _request: &ArtifactRequest, _report: &StatusReport) {}

    /// A log query returned a report.
    fn log_status(&self, _request: &ArtifactRequest, _report: &LogReport) {}

    /// The artifact's poll state changed.
    fn phase_changed(&self, _request: &ArtifactRequest, _state: PollState, _record: &PhaseRecord) {}

    /// The artifact reached its final disposition.
    fn finished(&self, _request: &ArtifactRequest, _outcome: &ArtifactOutcome) {}
}

/// Reporter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Reporter that emits structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn submitting(&self, request: &ArtifactRequest) {
        info!(artifact = %request.path.display(), "Submitting file for notarization");
    }

    fn submitted(&self, request: &ArtifactRequest, handle: &TrackingHandle) {
        info!(artifact = %request.path.display(), request_id = %handle, "Submission accepted for processing");
    }

    fn status(&self, request: &ArtifactRequest, report: &StatusReport) {
        debug!(artifact = %request.path.display(), status = %report.status_text, "Status update");
    }

    fn log_status(&self, request: &ArtifactRequest, report: &LogReport) {
        debug!(artifact = %request.path.display(), status = %report.status_text, "Log status update");
    }

    fn phase_changed(&self, request: &ArtifactRequest, state: PollState, record: &PhaseRecord) {
        info!(
            artifact = %request.path.display(),
            request_id = %record.handle,
            state = state.as_str(),
            phase = record.phase.as_str(),
            "Notarization state changed"
        );
    }

    fn finished(&self, request: &ArtifactRequest, outcome: &ArtifactOutcome) {
        match outcome {
            ArtifactOutcome::Accepted { .. } => {
                info!(artifact = %request.path.display(), "Notarization accepted")
            }
            ArtifactOutcome::Rejected {
                diagnostic_ref,
                log_content,
                ..
            } => warn!(
                artifact = %request.path.display(),
                diagnostic_ref = diagnostic_ref.as_deref().unwrap_or("-"),
                log_content = log_content.as_deref().unwrap_or("-"),
                "Notarization rejected"
            ),
            ArtifactOutcome::Errored { cause, .. } => {
                warn!(artifact = %request.path.display(), error = %cause, "Notarization errored")
            }
        }
    }
}

/// Exclusive section around a shared output sink, held for one write.
pub struct OutputSection {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl OutputSection {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Writes one line atomically with respect to other writers.
    pub fn write_line(&self, line: &str) {
        let mut sink = self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(sink, "{}", line).and_then(|_| sink.flush()) {
            warn!("Failed to write progress output: {}", e);
        }
    }
}

/// Builds aligned `[name]` prefixes, one per path, keyed by path.
pub fn status_prefixes<'a>(paths: impl IntoIterator<Item = &'a Path>) -> HashMap<PathBuf, String> {
    let names: Vec<(PathBuf, String)> = paths
        .into_iter()
        .map(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| p.display().to_string());
            (p.to_path_buf(), name)
        })
        .collect();

    let width = names.iter().map(|(_, n)| n.chars().count()).max().unwrap_or(0);

    names
        .into_iter()
        .map(|(path, name)| (path, format!("    [{:<width$}] ", name, width = width)))
        .collect()
}

/// Human-oriented reporter writing prefixed lines to a shared sink.
pub struct ConsoleReporter {
    output: OutputSection,
    prefixes: HashMap<PathBuf, String>,
}

impl ConsoleReporter {
    pub fn new(output: OutputSection, requests: &[ArtifactRequest]) -> Self {
        Self {
            output,
            prefixes: status_prefixes(requests.iter().map(|r| r.path.as_path())),
        }
    }

    fn line(&self, request: &ArtifactRequest, message: &str) {
        let prefix = self
            .prefixes
            .get(&request.path)
            .map(String::as_str)
            .unwrap_or("    ");
        self.output.write_line(&format!("{}{}", prefix, message));
    }

    /// Writes a header and an indented body in one locked write.
    fn block(&self, request: &ArtifactRequest, header: &str, body: &str) {
        let prefix = self
            .prefixes
            .get(&request.path)
            .map(String::as_str)
            .unwrap_or("    ");
        let mut text = format!("{}{}", prefix, header);
        for line in body.lines() {
            text.push('\n');
            text.push_str(prefix);
            text.push_str("  ");
            text.push_str(line);
        }
        self.output.write_line(&text);
    }
}

impl Reporter for ConsoleReporter {
    fn submitting(&self, request: &ArtifactRequest) {
        self.line(request, "Submitting file for notarization...");
    }

    fn submitted(&self, request: &ArtifactRequest, handle: &TrackingHandle) {
        self.line(request, &format!("Submitted. Request ID: {}", handle));
        self.line(request, "Waiting for results from the notarization service...");
    }

    fn status(&self, request: &ArtifactRequest, report: &StatusReport) {
        self.line(request, &format!("Status: {}", report.status_text));
    }

    fn log_status(&self, request: &ArtifactRequest, report: &LogReport) {
        self.line(request, &format!("Log status: {}", report.status_text));
    }

    fn phase_changed(&self, request: &ArtifactRequest, state: PollState, _record: &PhaseRecord) {
        if state == PollState::Polling {
            self.line(request, "Submission found, analysis in progress...");
        }
    }

    fn finished(&self, request: &ArtifactRequest, outcome: &ArtifactOutcome) {
        match outcome {
            ArtifactOutcome::Accepted { .. } => self.line(request, "File notarized!"),
            ArtifactOutcome::Rejected {
                diagnostic_ref,
                log_content,
                ..
            } => match (diagnostic_ref, log_content) {
                (_, Some(content)) => {
                    let header = match diagnostic_ref {
                        Some(reference) => format!("Notarization rejected. Log: {}", reference),
                        None => "Notarization rejected. Log:".to_string(),
                    };
                    self.block(request, &header, content);
                }
                (Some(reference), None) => {
                    self.line(request, &format!("Notarization rejected. Log: {}", reference));
                }
                (None, None) => self.line(request, "Notarization rejected. No log available"),
            },
            ArtifactOutcome::Errored { cause, .. } => {
                self.line(request, &format!("Error: {}", cause));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Sink that appends into a shared buffer.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_status_prefixes_are_aligned() {
        let paths = [Path::new("out/app.zip"), Path::new("out/installer.pkg")];
        let prefixes = status_prefixes(paths);
        assert_eq!(prefixes[Path::new("out/app.zip")], "    [app.zip      ] ");
        assert_eq!(prefixes[Path::new("out/installer.pkg")], "    [installer.pkg] ");
    }

    #[test]
    fn test_console_reporter_writes_prefixed_lines() {
        let buffer = SharedBuffer::default();
        let requests = vec![ArtifactRequest::new("a.zip"), ArtifactRequest::new("bb.dmg")];
        let reporter = ConsoleReporter::new(OutputSection::new(Box::new(buffer.clone())), &requests);

        reporter.submitting(&requests[0]);
        reporter.submitted(&requests[1], &TrackingHandle::new("uuid-1"));

        let out = buffer.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "    [a.zip ] Submitting file for notarization...");
        assert_eq!(lines[1], "    [bb.dmg] Submitted. Request ID: uuid-1");
    }

    #[test]
    fn test_console_reporter_prints_rejection_log() {
        let buffer = SharedBuffer::default();
        let requests = vec![ArtifactRequest::new("app.zip")];
        let reporter = ConsoleReporter::new(OutputSection::new(Box::new(buffer.clone())), &requests);

        let outcome = ArtifactOutcome::Rejected {
            record: PhaseRecord::submitted(TrackingHandle::new("uuid-1")),
            diagnostic_ref: None,
            log_content: Some("{\n  \"issues\": [\"not signed\"]\n}".to_string()),
        };
        reporter.finished(&requests[0], &outcome);

        let out = buffer.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "    [app.zip] Notarization rejected. Log:");
        assert_eq!(lines[1], "    [app.zip]   {");
        assert_eq!(lines[2], "    [app.zip]     \"issues\": [\"not signed\"]");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_concurrent_writes_do_not_interleave() {
        let buffer = SharedBuffer::default();
        let requests: Vec<ArtifactRequest> = (0..8)
            .map(|i| ArtifactRequest::new(format!("artifact-{}.zip", i)))
            .collect();
        let reporter = Arc::new(ConsoleReporter::new(
            OutputSection::new(Box::new(buffer.clone())),
            &requests,
        ));

        let threads: Vec<_> = requests
            .iter()
            .cloned()
            .map(|request| {
                let reporter = Arc::clone(&reporter);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        reporter.submitting(&request);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let out = buffer.contents();
        assert_eq!(out.lines().count(), 400);
        assert!(out
            .lines()
            .all(|l| l.ends_with("] Submitting file for notarization...")));
    }
}
