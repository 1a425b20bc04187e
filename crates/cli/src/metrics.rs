//! Prometheus text exposition for a finished run.

use std::path::Path;

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};

/// Registry holding every core metric.
fn registry() -> Result<Registry> {
    let registry = Registry::new();
    for metric in notary_core::metrics::all_metrics() {
        registry
            .register(metric)
            .context("Failed to register metric")?;
    }
    Ok(registry)
}

pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry()?.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics are not valid UTF-8")
}

pub fn write_metrics_file(path: &Path) -> Result<()> {
    let text = encode_metrics()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}
