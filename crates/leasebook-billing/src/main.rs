use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use leasebook_billing::config::{BillingConfig, LogFormat};
use leasebook_billing::server::BillingServer;
use leasebook_common::logging;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

const DEFAULT_LOG_FILTER: &str = "leasebook_billing=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "leasebook-billing")]
#[command(about = "Leasebook Billing Service - Rent receivable reconciliation")]
struct Args {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Generate sample configuration file")]
    gen_config: bool,

    #[arg(long, help = "Dry run mode (validate config without starting)")]
    dry_run: bool,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.gen_config {
        println!("{}", BillingConfig::generate_example()?);
        return Ok(());
    }

    let config = BillingConfig::load(args.config)?;

    match config.service.log_format {
        LogFormat::Text => logging::init_logging(&args.verbosity, DEFAULT_LOG_FILTER)?,
        LogFormat::Json => logging::init_json_logging(&args.verbosity, DEFAULT_LOG_FILTER)?,
    }

    info!("Starting Leasebook Billing Service");
    info!("Environment: {}", config.service.environment);
    info!(
        "Reconciliation: horizon {} months, deadline {}s, strategy {:?}, protect partial {}",
        config.reconciliation.horizon_months,
        config.reconciliation.deadline_seconds,
        config.reconciliation.write_strategy,
        config.reconciliation.protect_partial
    );

    if args.dry_run {
        info!("Configuration validated successfully (dry-run mode)");
        return Ok(());
    }

    let server = BillingServer::new_with_config(config.clone()).await?;
    server.run_migrations().await?;

    info!(
        "Starting HTTP server on {}:{}",
        config.http.listen_address, config.http.port
    );

    if let Err(e) = server.serve(shutdown_signal()).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("Leasebook Billing Service stopped gracefully");
    Ok(())
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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

    info!("Shutdown signal received");
}
