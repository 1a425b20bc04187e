mod args;
mod metrics;
mod pipeline;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notary_core::notary::{ConsoleReporter, OutputSection, XcrunStapler};
use notary_core::{
    load_config, validate_config, AuthMethod, CancelSignal, NotarizationCoordinator,
    NotarytoolService, RunOutcome, SanitizedConfig,
};

use args::Args;
use pipeline::Pipeline;

/// Exit code for artifacts that were rejected or failed to notarize.
const EXIT_NOTARIZATION_FAILED: u8 = 1;
/// Exit code for configuration, credential and packaging errors.
const EXIT_SETUP_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::from(EXIT_SETUP_FAILED);
    }

    let code = match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("❗️ {:#}", e);
            ExitCode::from(EXIT_SETUP_FAILED)
        }
    };

    if let Some(path) = &args.metrics_file {
        if let Err(e) = metrics::write_metrics_file(path) {
            warn!("{:#}", e);
        }
    }

    code
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .with_context(|| format!("Invalid log level {:?}", args.log_level))?;
    let registry = tracing_subscriber::registry().with(filter);

    if args.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

async fn run(args: &Args) -> Result<ExitCode> {
    info!("Loading configuration from {:?}", args.config);
    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    validate_config(&config).context("Configuration validation failed")?;
    debug!(config = ?SanitizedConfig::from(&config), "Configuration loaded");

    // Credentials are checked before any signing work starts.
    let auth = if args.dont_notarize {
        None
    } else {
        let apple_id = config
            .apple_id
            .clone()
            .with_env_fallbacks(|name| std::env::var(name).ok());
        let auth = AuthMethod::select(&apple_id).context("Invalid credentials")?;
        info!("Using credentials: {}", auth.method_name());
        Some(auth)
    };

    let mut requests = config.artifact_requests();
    requests.extend(Pipeline::from_config(&config).run().await?);

    let Some(auth) = auth else {
        info!("Notarization disabled, packaging complete");
        return Ok(ExitCode::SUCCESS);
    };

    if requests.is_empty() {
        println!("No items to notarize");
        return Ok(ExitCode::SUCCESS);
    }

    let mut notary_config = config.notary.clone();
    if let Some(secs) = args.poll_interval {
        notary_config.poll_interval_secs = secs;
    }

    let service = Arc::new(NotarytoolService::from_config(&notary_config, &auth));
    let stapler = Arc::new(XcrunStapler::new(notary_config.xcrun_path.clone()));
    let reporter = Arc::new(ConsoleReporter::new(OutputSection::stdout(), &requests));
    let coordinator = NotarizationCoordinator::new(service, notary_config)
        .with_reporter(reporter)
        .with_stapler(stapler);

    let cancel = CancelSignal::new();
    let watcher = tokio::spawn(cancel_on_shutdown(cancel.clone()));

    println!("==> Notarizing files...");
    if requests.len() > 1 {
        println!("    Files will be notarized concurrently to optimize queue wait");
    }
    for request in &requests {
        println!("    Path: {}", request);
    }

    let outcome = coordinator.run_with_cancel(requests, cancel).await;
    watcher.abort();

    Ok(report(&outcome))
}

/// Prints the run summary and maps it to an exit code.
fn report(outcome: &RunOutcome) -> ExitCode {
    let accepted: Vec<_> = outcome.accepted().collect();
    if !accepted.is_empty() {
        println!("\nNotarization complete! Notarized files:");
        for result in accepted {
            println!("  - {}", result.request);
        }
    }

    match outcome.error() {
        None => ExitCode::SUCCESS,
        Some(err) => {
            eprintln!("\n❗️ {}", err);
            ExitCode::from(EXIT_NOTARIZATION_FAILED)
        }
    }
}

async fn cancel_on_shutdown(cancel: CancelSignal) {
    shutdown_signal().await;
    warn!("Shutdown signal received, cancelling outstanding notarizations");
    cancel.cancel();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
