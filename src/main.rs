use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use redirect_log_retention::{
    cache,
    config::AppConfig,
    db::DbPool,
    observability,
    retention::{
        CacheStateStore, Clock, LogFlusher, RetentionTimer, SystemClock, ensure_schedule,
    },
};
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// CLI arguments for the log retention service
#[derive(Parser, Debug)]
#[command(version, about = "Adaptive retention for redirect and 404 logs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (built-in defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the retention timer until interrupted (default)
    Serve,
    /// Run a single flush and exit
    ///
    /// For deployments where an external scheduler such as cron invokes
    /// the flusher.
    Flush,
    /// Show the current mode and remaining expired entries, then exit
    Status,
    /// Run database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match AppConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(&config).await,
        Command::Flush => run_flush(&config).await,
        Command::Status => run_status(&config).await,
        Command::Migrate => run_migrate(&config).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}

/// Open the database, running migrations when configured.
async fn open_db(config: &AppConfig) -> Result<DbPool, BoxError> {
    let db = DbPool::from_config(&config.database).await?;
    if config.database.run_migrations() {
        db.run_migrations().await?;
    }
    Ok(db)
}

/// Wire the flusher to the database, the flag cache and a fresh timer.
async fn build_flusher(
    config: &AppConfig,
) -> Result<(Arc<LogFlusher>, Arc<RetentionTimer>), BoxError> {
    let db = open_db(config).await?;
    let cache = cache::build_cache(&config.cache)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let timer = Arc::new(RetentionTimer::new(clock.clone()));

    let flusher = LogFlusher::new(
        db.logs(),
        Arc::new(config.retention.periods.clone()),
        Arc::new(CacheStateStore::new(cache)),
        timer.clone(),
        clock,
        config.retention.limits.clone(),
    );

    Ok((Arc::new(flusher), timer))
}

async fn run_server(config: &AppConfig) -> Result<(), BoxError> {
    if !config.retention.enabled {
        tracing::info!("Log retention disabled by configuration");
        return Ok(());
    }

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }

    let retention = &config.retention;
    tracing::info!(
        interval_hours = retention.interval_hours,
        redirect_logs_days = retention.periods.redirect_logs_days,
        not_found_logs_days = retention.periods.not_found_logs_days,
        normal_batch = retention.limits.normal_batch,
        aggressive_batch = retention.limits.aggressive_batch,
        "Starting log retention service"
    );

    let (flusher, timer) = build_flusher(config).await?;
    ensure_schedule(
        timer.as_ref(),
        &retention.periods,
        &SystemClock,
        retention.interval(),
    )
    .await?;

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let timer = timer.clone();
        let flusher = flusher.clone();
        let shutdown = shutdown.clone();
        async move { timer.run(flusher, shutdown).await }
    });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, waiting for the current flush to finish...");
    shutdown.cancel();
    handle.await?;
    flusher.wait_for_maintenance().await;

    Ok(())
}

async fn run_flush(config: &AppConfig) -> Result<(), BoxError> {
    if !config.cache.is_shared() {
        tracing::warn!(
            "The memory cache does not outlive this process, so aggressive mode cannot carry \
             over to the next flush; set [cache] type = \"redis\" for scheduled flushes"
        );
    }

    let (flusher, _timer) = build_flusher(config).await?;
    let outcome = flusher.flush().await;
    flusher.wait_for_maintenance().await;
    let outcome = outcome?;

    println!("redirect_logs deleted:  {}", outcome.redirect_logs_deleted);
    println!("not_found_logs deleted: {}", outcome.not_found_logs_deleted);
    println!(
        "mode:                   {}",
        if outcome.was_aggressive { "aggressive" } else { "normal" }
    );
    println!("transition:             {}", outcome.transition);
    if let Some(estimate) = outcome.estimate {
        println!("backlog estimate:       {}", estimate);
    }
    // Nothing runs in this process after exit; the caller's scheduler has to
    // act on this.
    if let Some(next_run) = outcome.next_run {
        println!("next flush recommended: {}", next_run.to_rfc3339());
    }
    if let Some(dataset) = outcome.compaction_started {
        println!("compaction started:     {}", dataset);
    }

    Ok(())
}

async fn run_status(config: &AppConfig) -> Result<(), BoxError> {
    let (flusher, _timer) = build_flusher(config).await?;
    let status = flusher.status().await?;

    match status.aggressive_until {
        Some(until) => println!("mode: {} (until {})", status.mode, until.to_rfc3339()),
        None => println!("mode: {}", status.mode),
    }
    for (name, dataset) in [
        ("redirect_logs", status.redirect_logs),
        ("not_found_logs", status.not_found_logs),
    ] {
        if dataset.retention_days > 0 {
            println!(
                "{}: keep {} days, {} expired (capped at {})",
                name,
                dataset.retention_days,
                dataset.expired_estimate,
                config.retention.limits.estimate_cap()
            );
        } else {
            println!("{}: retention disabled", name);
        }
    }

    Ok(())
}

async fn run_migrate(config: &AppConfig) -> Result<(), BoxError> {
    let db = DbPool::from_config(&config.database).await?;
    db.run_migrations().await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
