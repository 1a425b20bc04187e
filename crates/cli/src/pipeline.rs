//! Signing and packaging that runs ahead of notarization.

use std::path::PathBuf;

use anyhow::{Context, Result};
use notary_core::packaging::{CodesignSigner, DmgPackager, ZipPackager};
use notary_core::{ArtifactRequest, Config, Packager, Signer};
use tracing::info;

/// Turns the `source` binaries into notarizable packages.
pub struct Pipeline {
    sources: Vec<PathBuf>,
    bundle_id: Option<String>,
    signer: Option<Box<dyn Signer>>,
    zip: Option<Box<dyn Packager>>,
    dmg: Option<Box<dyn Packager>>,
}

impl Pipeline {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sources: config.source.clone(),
            bundle_id: config.bundle_id.clone(),
            signer: config
                .sign
                .as_ref()
                .map(|s| Box::new(CodesignSigner::from_config(s)) as Box<dyn Signer>),
            zip: config
                .zip
                .as_ref()
                .map(|z| Box::new(ZipPackager::from_config(z)) as Box<dyn Packager>),
            dmg: config
                .dmg
                .as_ref()
                .map(|d| Box::new(DmgPackager::from_config(d)) as Box<dyn Packager>),
        }
    }

    #[cfg(test)]
    fn new(
        sources: Vec<PathBuf>,
        signer: Option<Box<dyn Signer>>,
        zip: Option<Box<dyn Packager>>,
        dmg: Option<Box<dyn Packager>>,
    ) -> Self {
        Self {
            sources,
            bundle_id: Some("com.example.app".to_string()),
            signer,
            zip,
            dmg,
        }
    }

    /// Signs the sources, then builds the zip and the disk image.
    ///
    /// Returns the packages that should be notarized. The disk image is
    /// signed itself and is queued for stapling.
    pub async fn run(&self) -> Result<Vec<ArtifactRequest>> {
        let mut requests = Vec::new();
        if self.sources.is_empty() {
            return Ok(requests);
        }

        if let Some(signer) = &self.signer {
            println!("==> Signing files...");
            signer
                .sign(&self.sources)
                .await
                .context("Error signing files")?;
            println!("    Code signing successful");
        }

        if let Some(zip) = &self.zip {
            println!("==> Creating zip archive...");
            let path = zip
                .package(&self.sources)
                .await
                .context("Error creating zip archive")?;
            println!("    Zip archive created with signed files");
            info!(path = %path.display(), packager = zip.name(), "Package created");
            requests.push(self.request(path));
        }

        if let Some(dmg) = &self.dmg {
            // An unsigned disk image cannot be notarized.
            if let Some(signer) = &self.signer {
                println!("==> Creating dmg...");
                let path = dmg
                    .package(&self.sources)
                    .await
                    .context("Error creating dmg")?;
                println!("    Dmg file created");

                println!("==> Signing dmg...");
                signer
                    .sign(std::slice::from_ref(&path))
                    .await
                    .context("Error signing dmg")?;
                println!("    Dmg signing successful");
                info!(path = %path.display(), packager = dmg.name(), "Package created");
                requests.push(self.request(path).with_staple(true));
            }
        }

        Ok(requests)
    }

    fn request(&self, path: PathBuf) -> ArtifactRequest {
        let request = ArtifactRequest::new(path);
        match &self.bundle_id {
            Some(bundle_id) => request.with_bundle_id(bundle_id.clone()),
            None => request,
        }
    }
}
