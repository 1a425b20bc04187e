use std::path::PathBuf;

use clap::Parser;

/// Sign, package and notarize macOS build artifacts.
#[derive(Parser, Debug)]
#[command(name = "notary", version)]
pub struct Args {
    /// Log level used when RUST_LOG is not set (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,

    /// Only sign and package, skip notarization.
    #[arg(long)]
    pub dont_notarize: bool,

    /// Seconds between status polls; overrides the config file.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Write Prometheus metrics in text format to this file on exit.
    #[arg(long, value_name = "PATH")]
    pub metrics_file: Option<PathBuf>,

    /// Path to the TOML configuration file.
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["notary", "notary.toml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("notary.toml"));
        assert_eq!(args.log_level, "warn");
        assert!(!args.log_json);
        assert!(!args.dont_notarize);
        assert!(args.poll_interval.is_none());
        assert!(args.metrics_file.is_none());
    }

    #[test]
    fn test_all_flags() {
        let args = Args::try_parse_from([
            "notary",
            "--log-level",
            "debug",
            "--log-json",
            "--dont-notarize",
            "--poll-interval",
            "10",
            "--metrics-file",
            "metrics.prom",
            "notary.toml",
        ])
        .unwrap();
        assert_eq!(args.log_level, "debug");
        assert!(args.log_json);
        assert!(args.dont_notarize);
        assert_eq!(args.poll_interval, Some(10));
        assert_eq!(args.metrics_file, Some(PathBuf::from("metrics.prom")));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        assert!(Args::try_parse_from(["notary", "--poll-interval", "0", "notary.toml"]).is_err());
    }

    #[test]
    fn test_config_required() {
        assert!(Args::try_parse_from(["notary"]).is_err());
    }
}
