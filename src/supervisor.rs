// Keeps one collector per running container plus the singleton host collector.
// A container that leaves the listing only loses its collector; its history stays
// in the store and ages out through normal trimming.

use crate::collector::{Collector, CollectorConfig, CollectorHandle, HostSource, WorkloadSource};
use crate::docker_repo::WorkloadRuntime;
use crate::error::CollectError;
use crate::models::WorkloadInfo;
use crate::series_store::MetricSeriesStore;
use crate::sysinfo_repo::HostStatsProvider;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, MissedTickBehavior, interval, timeout};

#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    /// How often the container listing is polled.
    pub refresh_interval: Duration,
    /// Upper bound on one listing call; must be below `refresh_interval`.
    pub listing_timeout: Duration,
    pub host: CollectorConfig,
    pub workload: CollectorConfig,
    /// How often to log collector stats at INFO level.
    pub stats_log_interval: Duration,
}

/// Ids started and stopped by one refresh.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Latest container listing, shared with the API layer.
pub type WorkloadListing = Arc<RwLock<Vec<WorkloadInfo>>>;

pub struct CollectorSupervisor {
    runtime: Arc<dyn WorkloadRuntime>,
    host_provider: Arc<dyn HostStatsProvider>,
    store: Arc<MetricSeriesStore>,
    config: SupervisorConfig,
    host: Option<CollectorHandle>,
    active: HashMap<String, CollectorHandle>,
    listing: WorkloadListing,
}

impl CollectorSupervisor {
    pub fn new(
        runtime: Arc<dyn WorkloadRuntime>,
        host_provider: Arc<dyn HostStatsProvider>,
        store: Arc<MetricSeriesStore>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            runtime,
            host_provider,
            store,
            config,
            host: None,
            active: HashMap::new(),
            listing: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn listing(&self) -> WorkloadListing {
        self.listing.clone()
    }

    /// Start the host collector once; later calls are no-ops.
    pub fn start_host(&mut self) {
        if self.host.is_some() {
            return;
        }
        let source = HostSource::new(self.host_provider.clone());
        self.host = Some(Collector::new(source, self.store.clone(), self.config.host).spawn());
        tracing::info!("host collector started");
    }

    pub fn host_running(&self) -> bool {
        self.host.as_ref().is_some_and(|h| h.is_running())
    }

    /// Ids with a live collector, sorted.
    pub fn active_workloads(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn collector(&self, id: &str) -> Option<&CollectorHandle> {
        self.active.get(id)
    }

    /// Poll the runtime and converge the collector set onto its listing.
    /// A listing failure or timeout leaves every running collector untouched.
    pub async fn refresh(&mut self) -> Result<RefreshOutcome, CollectError> {
        let live = timeout(self.config.listing_timeout, self.runtime.list_workloads())
            .await
            .map_err(|_| {
                CollectError::Transport(format!(
                    "workload listing timed out after {:?}",
                    self.config.listing_timeout
                ))
            })??;
        Ok(self.apply_listing(live).await)
    }

    /// Converge onto `live`: start collectors for new ids, stop those that vanished.
    pub async fn apply_listing(&mut self, live: Vec<WorkloadInfo>) -> RefreshOutcome {
        let (to_add, to_remove) = diff_workloads(self.active.keys(), &live);

        for id in &to_remove {
            if let Some(handle) = self.active.remove(id) {
                handle.stop().await;
                tracing::info!(workload = %id, "workload gone; collector stopped");
            }
        }
        for id in &to_add {
            let source = WorkloadSource::new(id.clone(), self.runtime.clone());
            let handle = Collector::new(source, self.store.clone(), self.config.workload).spawn();
            self.active.insert(id.clone(), handle);
            tracing::info!(workload = %id, "workload discovered; collector started");
        }

        *self.listing.write().await = live;

        RefreshOutcome {
            added: to_add,
            removed: to_remove,
        }
    }

    /// Stop every collector, host included.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.stop().await;
        }
        if let Some(host) = self.host.take() {
            host.stop().await;
        }
        self.listing.write().await.clear();
        tracing::debug!("Supervisor shut down");
    }

    fn log_stats(&self) {
        let (ok, failed) = self
            .host
            .iter()
            .chain(self.active.values())
            .fold((0u64, 0u64), |(ok, failed), h| {
                (ok + h.stats().ticks_ok(), failed + h.stats().ticks_failed())
            });
        tracing::info!(
            workload_collectors = self.active.len(),
            host_running = self.host_running(),
            ticks_ok_total = ok,
            ticks_failed_total = failed,
            "collector stats"
        );
    }

    /// Start the host collector, then refresh the workload set on every interval until shutdown.
    pub fn spawn(
        mut self,
        mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.start_host();
            let mut refresh_tick = interval(self.config.refresh_interval);
            refresh_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut stats_log_tick = interval(self.config.stats_log_interval);
            stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval fires immediately; skip the first stats line.
            stats_log_tick.tick().await;

            loop {
                tokio::select! {
                    _ = refresh_tick.tick() => {
                        match self.refresh().await {
                            Ok(outcome) if !outcome.added.is_empty() || !outcome.removed.is_empty() => {
                                tracing::debug!(
                                    added = outcome.added.len(),
                                    removed = outcome.removed.len(),
                                    "workload set changed"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    operation = "list_workloads",
                                    "workload listing failed; keeping current collectors"
                                );
                            }
                        }
                    }
                    _ = stats_log_tick.tick() => {
                        self.log_stats();
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Supervisor shutting down");
                        break;
                    }
                }
            }
            self.shutdown().await;
        })
    }
}

/// Ids in `live` without a collector, and collector ids missing from `live`. Both sorted.
pub fn diff_workloads<'a>(
    active: impl Iterator<Item = &'a String>,
    live: &[WorkloadInfo],
) -> (Vec<String>, Vec<String>) {
    let active: HashSet<&String> = active.collect();
    let live_set: HashSet<&String> = live.iter().map(|w| &w.id).collect();

    let mut to_add: Vec<String> = live_set
        .iter()
        .filter(|id| !active.contains(*id))
        .map(|id| (*id).clone())
        .collect();
    let mut to_remove: Vec<String> = active
        .iter()
        .filter(|id| !live_set.contains(*id))
        .map(|id| (*id).clone())
        .collect();
    to_add.sort();
    to_remove.sort();
    (to_add, to_remove)
}
