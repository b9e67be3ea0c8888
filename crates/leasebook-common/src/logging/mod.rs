//! Logging initialization shared by Leasebook binaries
//!
//! The effective filter is picked in this order:
//! 1. CLI flags (`-v/-q`)
//! 2. RUST_LOG environment variable
//! 3. Binary-specific default

use anyhow::Result;
use clap_verbosity_flag::{LogLevel, Verbosity};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the given verbosity flags and default filter.
///
/// # Example
///
/// ```no_run
/// use clap::Parser;
/// use clap_verbosity_flag::{InfoLevel, Verbosity};
/// use leasebook_common::logging;
///
/// #[derive(Parser)]
/// struct Args {
///     #[clap(flatten)]
///     verbosity: Verbosity<InfoLevel>,
/// }
///
/// let args = Args::parse();
/// logging::init_logging(&args.verbosity, "leasebook_billing=info").unwrap();
/// ```
pub fn init_logging<L: LogLevel>(verbosity: &Verbosity<L>, default_filter: &str) -> Result<()> {
    let filter = resolve_filter(verbosity.log_level().map(|l| l.to_string()), default_filter)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();

    Ok(())
}

/// Same as [`init_logging`] but emits newline-delimited JSON, for deployments
/// that ship logs to a collector.
pub fn init_json_logging<L: LogLevel>(verbosity: &Verbosity<L>, default_filter: &str) -> Result<()> {
    let filter = resolve_filter(verbosity.log_level().map(|l| l.to_string()), default_filter)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true),
        )
        .init();

    Ok(())
}

fn resolve_filter(level: Option<String>, default_filter: &str) -> Result<EnvFilter> {
    match level {
        // CLI flags take priority
        Some(level) => Ok(EnvFilter::try_new(level)?),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter))),
    }
}

