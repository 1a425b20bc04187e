//! Notarization engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which remote resources decide the final verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollProtocol {
    /// Only the status resource is polled.
    #[default]
    StatusOnly,
    /// The log resource is polled after the status resource settles.
    StatusAndLog,
}

/// Configuration for the notarization engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotaryConfig {
    /// Slow polling interval, used while queued or in progress (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Fast retry interval after a transient network error (seconds).
    ///
    /// Fixed at 5s for configuration files; only settable from code.
    #[serde(skip, default = "default_transient_retry")]
    pub transient_retry_secs: u64,

    /// Polling protocol variant.
    #[serde(default)]
    pub protocol: PollProtocol,

    /// Fetch the log body behind a rejected artifact's log URL.
    #[serde(default)]
    pub fetch_rejection_log: bool,

    /// Path to the `xcrun` launcher.
    #[serde(default = "default_xcrun_path")]
    pub xcrun_path: PathBuf,

    /// Timeout for fetching a rejection log (seconds).
    #[serde(default = "default_log_fetch_timeout")]
    pub log_fetch_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_transient_retry() -> u64 {
    5
}

fn default_xcrun_path() -> PathBuf {
    PathBuf::from("xcrun")
}

fn default_log_fetch_timeout() -> u64 {
    30
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            transient_retry_secs: default_transient_retry(),
            protocol: PollProtocol::default(),
            fetch_rejection_log: false,
            xcrun_path: default_xcrun_path(),
            log_fetch_timeout_secs: default_log_fetch_timeout(),
        }
    }
}

impl NotaryConfig {
    pub fn intervals(&self) -> PollIntervals {
        PollIntervals {
            slow: Duration::from_secs(self.poll_interval_secs),
            fast: Duration::from_secs(self.transient_retry_secs),
        }
    }
}

/// Backoff cadences used by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    /// Used while queued and while processing is in progress.
    pub slow: Duration,
    /// Used after a transient network error.
    pub fast: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        NotaryConfig::default().intervals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NotaryConfig::default();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.transient_retry_secs, 5);
        assert_eq!(config.protocol, PollProtocol::StatusOnly);
        assert!(!config.fetch_rejection_log);
        assert_eq!(config.xcrun_path, PathBuf::from("xcrun"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: NotaryConfig = toml::from_str("").unwrap();
        assert_eq!(config.intervals().slow, Duration::from_secs(30));
        assert_eq!(config.intervals().fast, Duration::from_secs(5));
    }

    #[test]
    fn test_transient_retry_not_configurable_from_toml() {
        let config: NotaryConfig = toml::from_str("transient_retry_secs = 1").unwrap();
        assert_eq!(config.transient_retry_secs, 5);
        assert_eq!(config.intervals().fast, Duration::from_secs(5));
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            poll_interval_secs = 60
            protocol = "status_and_log"
            fetch_rejection_log = true
            xcrun_path = "/usr/bin/xcrun"
        "#;
        let config: NotaryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.transient_retry_secs, 5);
        assert_eq!(config.protocol, PollProtocol::StatusAndLog);
        assert!(config.fetch_rejection_log);
        assert_eq!(config.xcrun_path, PathBuf::from("/usr/bin/xcrun"));
    }
}
