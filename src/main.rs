use anyhow::Result;
use dockwatch::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let history_repo = Arc::new(
        history_repo::HistoryRepo::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
        )
        .await?,
    );
    history_repo.init().await?;

    let records_saved_total = Arc::new(AtomicU64::new(0));
    let (write_tx, write_rx) = tokio::sync::mpsc::channel(
        history_writer::writer_channel_capacity(app_config.database.flush_rate),
    );
    let writer_handle = history_writer::spawn_history_writer(
        write_rx,
        history_repo.clone(),
        history_writer::HistoryWriterConfig {
            flush_rate: app_config.database.flush_rate,
            flush_interval_secs: app_config.database.flush_interval_secs,
        },
        records_saved_total.clone(),
    );

    let store = Arc::new(
        series_store::MetricSeriesStore::new(
            app_config.retention.host_capacity,
            app_config.retention.workload_capacity,
        )
        .with_sink(write_tx),
    );
    restore::restore_store(&history_repo, &store).await?;

    let sysinfo_repo: Arc<dyn sysinfo_repo::HostStatsProvider> = Arc::new(
        sysinfo_repo::SysinfoRepo::new(app_config.collector.disk_mount.clone()),
    );
    let docker_repo: Arc<dyn docker_repo::WorkloadRuntime> =
        Arc::new(docker_repo::DockerRepo::connect()?);

    let c = &app_config.collector;
    let sample_timeout = Duration::from_millis(c.sample_timeout_ms);
    let supervisor = supervisor::CollectorSupervisor::new(
        docker_repo,
        sysinfo_repo,
        store.clone(),
        supervisor::SupervisorConfig {
            refresh_interval: Duration::from_millis(c.listing_refresh_ms),
            listing_timeout: sample_timeout,
            host: collector::CollectorConfig {
                cadence: Duration::from_millis(c.host_interval_ms),
                sample_timeout,
            },
            workload: collector::CollectorConfig {
                cadence: Duration::from_millis(c.workload_interval_ms),
                sample_timeout,
            },
            stats_log_interval: Duration::from_secs(c.stats_log_interval_secs),
        },
    );
    let listing = supervisor.listing();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let supervisor_handle = supervisor.spawn(shutdown_rx);

    let app = routes::app(query::QueryService::new(store.clone()), listing);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
        }
    }

    let _ = shutdown_tx.send(());
    let _ = supervisor_handle.await;
    // Last store handle owns the writer's sender; dropping it lets the writer flush and exit.
    drop(store);
    let _ = writer_handle.await;
    tracing::info!(
        records_saved_total = records_saved_total.load(Ordering::Relaxed),
        "shutdown complete"
    );

    Ok(())
}
