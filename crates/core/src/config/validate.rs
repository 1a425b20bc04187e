use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - `source` needs `bundle_id` and a `[sign]` block
/// - without `source`, at least one `[[notarize]]` block and no `[zip]`/`[dmg]`
/// - notarize paths are not empty
/// - poll intervals are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !config.source.is_empty() {
        if config.bundle_id.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::ValidationError(
                "bundle_id must be set when source is set".to_string(),
            ));
        }
        if config.sign.is_none() {
            return Err(ConfigError::ValidationError(
                "a [sign] block is required when source is set".to_string(),
            ));
        }
    } else {
        if config.notarize.is_empty() {
            return Err(ConfigError::ValidationError(
                "either source or at least one [[notarize]] block must be set".to_string(),
            ));
        }
        if config.zip.is_some() || config.dmg.is_some() {
            return Err(ConfigError::ValidationError(
                "[zip] and [dmg] require source to be set".to_string(),
            ));
        }
    }

    if let Some(n) = config.notarize.iter().find(|n| n.path.as_os_str().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "notarize.path cannot be empty (bundle_id: {:?})",
            n.bundle_id
        )));
    }

    if config.notary.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "notary.poll_interval_secs cannot be 0".to_string(),
        ));
    }
    if config.notary.transient_retry_secs == 0 {
        return Err(ConfigError::ValidationError(
            "notary.transient_retry_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, DmgConfig, NotarizeConfig, SignConfig};
    use std::path::PathBuf;

    fn notarize_only() -> Config {
        Config {
            notarize: vec![NotarizeConfig {
                path: PathBuf::from("app.zip"),
                bundle_id: None,
                staple: false,
            }],
            ..Default::default()
        }
    }

    fn assert_invalid(config: &Config, needle: &str) {
        match validate_config(config) {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains(needle), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_notarize_only() {
        assert!(validate_config(&notarize_only()).is_ok());
    }

    #[test]
    fn test_validate_source_pipeline() {
        let config = load_config_from_str(
            r#"
source = ["./bin/tool"]
bundle_id = "com.example.tool"

[sign]
application_identity = "Developer ID Application: Example"

[zip]
output_path = "tool.zip"
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_config_fails() {
        assert_invalid(&Config::default(), "[[notarize]]");
    }

    #[test]
    fn test_validate_source_requires_bundle_id_and_sign() {
        let mut config = Config {
            source: vec![PathBuf::from("bin")],
            ..Default::default()
        };
        assert_invalid(&config, "bundle_id");

        config.bundle_id = Some("com.example".to_string());
        assert_invalid(&config, "[sign]");

        config.sign = Some(SignConfig {
            application_identity: "id".to_string(),
            entitlements_file: None,
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_dmg_without_source_fails() {
        let mut config = notarize_only();
        config.dmg = Some(DmgConfig {
            output_path: PathBuf::from("a.dmg"),
            volume_name: "A".to_string(),
            skip_prettification: false,
        });
        assert_invalid(&config, "require source");
    }

    #[test]
    fn test_validate_zero_poll_interval_fails() {
        let mut config = notarize_only();
        config.notary.poll_interval_secs = 0;
        assert_invalid(&config, "poll_interval_secs");
    }
}
