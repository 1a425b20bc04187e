use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::notary::{ArtifactRequest, NotaryConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Binaries to sign and package.
    #[serde(default)]
    pub source: Vec<PathBuf>,
    /// Bundle ID for packages built from `source`.
    #[serde(default)]
    pub bundle_id: Option<String>,
    /// Ready-made files to notarize as-is.
    #[serde(default)]
    pub notarize: Vec<NotarizeConfig>,
    #[serde(default)]
    pub sign: Option<SignConfig>,
    #[serde(default)]
    pub apple_id: AppleIdConfig,
    #[serde(default)]
    pub zip: Option<ZipConfig>,
    #[serde(default)]
    pub dmg: Option<DmgConfig>,
    #[serde(default)]
    pub notary: NotaryConfig,
}

impl Config {
    /// Requests for the `[[notarize]]` blocks. Blocks without a bundle ID
    /// inherit the root one.
    pub fn artifact_requests(&self) -> Vec<ArtifactRequest> {
        self.notarize
            .iter()
            .map(|n| {
                let mut request = ArtifactRequest::new(&n.path).with_staple(n.staple);
                if let Some(bundle_id) = n.bundle_id.as_ref().or(self.bundle_id.as_ref()) {
                    request = request.with_bundle_id(bundle_id.clone());
                }
                request
            })
            .collect()
    }
}

/// A file that is ready for notarization.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotarizeConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub bundle_id: Option<String>,
    /// Staple the ticket after acceptance.
    #[serde(default)]
    pub staple: bool,
}

/// Code signing settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignConfig {
    /// Identity passed to `codesign -s`.
    pub application_identity: String,
    #[serde(default)]
    pub entitlements_file: Option<PathBuf>,
}

/// Credentials for Apple services.
///
/// Empty values fall back to `AC_*` environment variables, see
/// [`AppleIdConfig::with_env_fallbacks`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppleIdConfig {
    #[serde(default)]
    pub username: Option<String>,
    /// Literal, `@env:NAME` or `@keychain:NAME`.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_path: Option<PathBuf>,
    #[serde(default)]
    pub api_issuer: Option<String>,
    /// Team ID for accounts in several teams.
    #[serde(default)]
    pub provider: Option<String>,
}

/// Password used when only a username is configured.
pub const DEFAULT_PASSWORD_ENV: &str = "@env:AC_PASSWORD";

impl AppleIdConfig {
    /// Fills unset fields from `AC_USERNAME`, `AC_APIKEY`, `AC_APIISSUER`
    /// and `AC_PROVIDER`, and defaults the password of a username to
    /// `@env:AC_PASSWORD`.
    pub fn with_env_fallbacks<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fill(&mut self.username, || env("AC_USERNAME"));
        fill(&mut self.api_key, || env("AC_APIKEY"));
        fill(&mut self.api_issuer, || env("AC_APIISSUER"));
        fill(&mut self.provider, || env("AC_PROVIDER"));
        if is_unset(&self.password) && !is_unset(&self.username) {
            self.password = Some(DEFAULT_PASSWORD_ENV.to_string());
        }
        self
    }
}

fn is_unset(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

fn fill(value: &mut Option<String>, fallback: impl FnOnce() -> Option<String>) {
    if is_unset(value) {
        if let Some(v) = fallback().filter(|v| !v.is_empty()) {
            *value = Some(v);
        }
    }
}

/// Zip output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZipConfig {
    pub output_path: PathBuf,
}

/// Disk image output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DmgConfig {
    pub output_path: PathBuf,
    pub volume_name: String,
    /// Skip the Finder window layout step.
    #[serde(default)]
    pub skip_prettification: bool,
}

/// Config summary for logs (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub source: Vec<PathBuf>,
    pub bundle_id: Option<String>,
    pub notarize: Vec<PathBuf>,
    pub signing_identity: Option<String>,
    pub apple_id: SanitizedAppleId,
    pub zip: Option<PathBuf>,
    pub dmg: Option<PathBuf>,
    pub notary: NotaryConfig,
}

/// Apple ID summary (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAppleId {
    pub username: Option<String>,
    pub password_configured: bool,
    pub api_key: Option<String>,
    pub api_issuer: Option<String>,
    pub provider: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            source: config.source.clone(),
            bundle_id: config.bundle_id.clone(),
            notarize: config.notarize.iter().map(|n| n.path.clone()).collect(),
            signing_identity: config
                .sign
                .as_ref()
                .map(|s| s.application_identity.clone()),
            apple_id: SanitizedAppleId {
                username: config.apple_id.username.clone(),
                password_configured: !is_unset(&config.apple_id.password),
                api_key: config.apple_id.api_key.clone(),
                api_issuer: config.apple_id.api_issuer.clone(),
                provider: config.apple_id.provider.clone(),
            },
            zip: config.zip.as_ref().map(|z| z.output_path.clone()),
            dmg: config.dmg.as_ref().map(|d| d.output_path.clone()),
            notary: config.notary.clone(),
        }
    }
}
