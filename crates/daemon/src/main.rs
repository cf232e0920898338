//! keyrelay daemon - Main Entry Point
//! HTTP resource API + job workers + backfill scheduler over one SQLite file

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use config::{DaemonConfig, LogFormat};
use keyrelay_api_http::{ApiHandler, HttpServer, HttpServerConfig};
use keyrelay_core::application::{
    shutdown_channel, AccountKeyAcquirer, BackfillScheduler, ClientNotificationHandler,
    ExhaustionHandler, HandlerRegistry, JobQueue, LoggingExhaustionHandler,
    MissingAccountKeySweep, RecoveryService, RetryPolicy, UserService, Worker, DEFAULT_QUEUE,
};
use keyrelay_core::port::id_provider::{RandomKeyProvider, UuidProvider};
use keyrelay_core::port::time_provider::SystemTimeProvider;
use keyrelay_core::port::{ClientNotifier, JobRepository, KeyFetcher, TimeProvider, UserRepository};
use keyrelay_infra_external::{
    Argon2CredentialHasher, HttpKeyFetcher, LoggingClientNotifier, SimulatedKeyFetcher,
    WebhookClientNotifier, DEFAULT_FETCH_TIMEOUT,
};
use keyrelay_infra_sqlite::{
    create_pool, run_migrations, SqliteJobRepository, SqliteUserRepository,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_LOG_FILTER: &str = "keyrelay=info";
const LOG_FILE_PREFIX: &str = "keyrelay.log";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_logging(&config)?;

    info!("keyrelay daemon v{} starting...", VERSION);

    // 2. Database
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!(db_path = %config.db_path.display(), "Initializing database...");

    let pool = create_pool(&config.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Dependency wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let job_repo: Arc<dyn JobRepository> =
        Arc::new(SqliteJobRepository::new(pool.clone(), time_provider.clone()));
    let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
    let exhaustion: Arc<dyn ExhaustionHandler> = Arc::new(LoggingExhaustionHandler);

    let queue = Arc::new(
        JobQueue::new(
            DEFAULT_QUEUE,
            job_repo.clone(),
            Arc::new(UuidProvider),
            time_provider.clone(),
        )
        .with_budgets(config.attempt_budgets()),
    );

    let fetcher: Arc<dyn KeyFetcher> = match &config.key_authority_url {
        Some(url) => {
            info!(url = %url, "Using HTTP key authority");
            Arc::new(HttpKeyFetcher::new(url, DEFAULT_FETCH_TIMEOUT)?)
        }
        None => {
            info!(success_ratio = config.key_success_ratio, "Using simulated key authority");
            Arc::new(SimulatedKeyFetcher::new(config.key_success_ratio))
        }
    };

    let notifier: Arc<dyn ClientNotifier> = match &config.client_webhook_url {
        Some(url) => {
            info!(url = %url, "Delivering account keys by webhook");
            Arc::new(WebhookClientNotifier::new(url.clone(), DEFAULT_FETCH_TIMEOUT)?)
        }
        None => Arc::new(LoggingClientNotifier),
    };

    let handlers = Arc::new(
        HandlerRegistry::new()
            .register(Arc::new(AccountKeyAcquirer::new(
                user_repo.clone(),
                fetcher,
                queue.clone(),
                time_provider.clone(),
            )))
            .register(Arc::new(ClientNotificationHandler::new(notifier)))
            .register(Arc::new(MissingAccountKeySweep::new(
                user_repo.clone(),
                queue.clone(),
            ))),
    );
    let retry_policy = Arc::new(RetryPolicy::new(
        time_provider.clone(),
        config.retry_base_delay_ms,
    ));

    // 4. Crash recovery
    info!("Running crash recovery...");
    let recovery_service = RecoveryService::new(
        job_repo.clone(),
        exhaustion.clone(),
        time_provider.clone(),
        None, // Use default recovery window
    );

    match recovery_service.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = ?e, "Crash recovery failed"),
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 5. Workers
    info!(workers = config.workers, "Starting workers...");
    let mut worker_handles = Vec::with_capacity(config.workers);
    for index in 0..config.workers {
        let worker = Worker::new(
            DEFAULT_QUEUE,
            job_repo.clone(),
            handlers.clone(),
            retry_policy.clone(),
            exhaustion.clone(),
            time_provider.clone(),
        );
        let token = shutdown_rx.clone();

        worker_handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(token).await {
                error!(worker = index, error = ?e, "Worker failed");
            }
        }));
    }

    // 6. Backfill scheduler
    let backfill = BackfillScheduler::new(queue.clone(), config.backfill_interval);
    let backfill_handle = tokio::spawn(backfill.run(shutdown_rx.clone()));

    // 7. HTTP server
    let users = Arc::new(UserService::new(
        user_repo,
        queue.clone(),
        Arc::new(Argon2CredentialHasher::new()),
        Arc::new(UuidProvider),
        Arc::new(RandomKeyProvider),
        time_provider.clone(),
    ));
    let server = HttpServer::new(
        HttpServerConfig {
            host: config.http_host.clone(),
            port: config.http_port,
        },
        Arc::new(ApiHandler::new(users, queue)),
    );
    let mut server_handle = tokio::spawn(server.run(shutdown_rx));

    info!("System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received. Exiting gracefully...");
        }
        result = &mut server_handle => {
            shutdown_tx.shutdown();
            result
                .context("HTTP server task panicked")?
                .context("HTTP server failed")?;
            anyhow::bail!("HTTP server stopped unexpectedly");
        }
    }

    // 9. Graceful shutdown
    shutdown_tx.shutdown();
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = server_handle.await;
        let _ = backfill_handle.await;
        for handle in worker_handles {
            let _ = handle.await;
        }
    })
    .await;
    if drained.is_err() {
        warn!("Shutdown grace period elapsed with tasks still running");
    }

    pool.close().await;
    telemetry::shutdown();
    info!("Shutdown complete.");

    Ok(())
}

/// Console output in the configured format, plus an optional daily JSON file
/// and an optional OpenTelemetry layer.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(config: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    let mut layers: Vec<telemetry::BoxedLayer> = Vec::new();

    match config.log_format {
        // Production: JSON structured logging
        LogFormat::Json => layers.push(fmt::layer().json().boxed()),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => layers.push(fmt::layer().pretty().boxed()),
    }

    let guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    let otel_endpoint = telemetry::endpoint();
    let otel_status = match otel_endpoint.as_deref().map(telemetry::layer) {
        Some(Ok(Some(layer))) => {
            layers.push(layer);
            Some(Ok(true))
        }
        Some(Ok(None)) => Some(Ok(false)),
        Some(Err(e)) => Some(Err(e)),
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    match otel_status {
        Some(Ok(true)) => info!(endpoint = ?otel_endpoint, "OpenTelemetry export enabled"),
        Some(Ok(false)) => {
            warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
            warn!("Rebuild with: cargo build --features telemetry");
        }
        Some(Err(e)) => {
            warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)")
        }
        None => {}
    }

    Ok(guard)
}
