// Host stats via sysinfo

use crate::error::CollectError;
use crate::models::HostReading;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, Networks, System};
use tracing::instrument;

/// Source of host-level readings for the host collector.
#[async_trait]
pub trait HostStatsProvider: Send + Sync + 'static {
    async fn host_snapshot(&self) -> Result<HostReading, CollectError>;
}

pub struct SysinfoRepo {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    networks: Arc<Mutex<Networks>>,
    disk_mount: PathBuf,
    /// When the CPU baseline was taken in `new`.
    cpu_baseline_at: Instant,
}

impl SysinfoRepo {
    /// `disk_mount` selects the partition reported as disk usage.
    pub fn new(disk_mount: impl Into<PathBuf>) -> Self {
        let mut sys = System::new();
        // Baseline for global_cpu_usage(); the first tick then reports load since startup.
        sys.refresh_cpu_all();
        sys.refresh_memory();
        let disks = Disks::new_with_refreshed_list();
        let networks = Networks::new_with_refreshed_list();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(disks)),
            networks: Arc::new(Mutex::new(networks)),
            disk_mount: disk_mount.into(),
            cpu_baseline_at: Instant::now(),
        }
    }
}

#[async_trait]
impl HostStatsProvider for SysinfoRepo {
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "host_snapshot"))]
    async fn host_snapshot(&self) -> Result<HostReading, CollectError> {
        let sys = self.sys.clone();
        let disks = self.disks.clone();
        let networks = self.networks.clone();
        let mount = self.disk_mount.clone();
        let settle = cpu_settle_delay(self.cpu_baseline_at.elapsed());
        tokio::task::spawn_blocking(move || {
            // First reading right after `new`: let the CPU counters move first.
            if !settle.is_zero() {
                std::thread::sleep(settle);
            }
            let (cpu_percent, memory_percent) = {
                let mut sys = sys.lock().map_err(|e| {
                    CollectError::Transport(format!("sysinfo lock poisoned: {}", e))
                })?;
                sys.refresh_cpu_all();
                sys.refresh_memory();
                (
                    sys.global_cpu_usage() as f64,
                    used_percent(sys.total_memory(), sys.available_memory()),
                )
            };

            let disk_percent = {
                let mut disks = disks.lock().map_err(|e| {
                    CollectError::Transport(format!("sysinfo disks lock poisoned: {}", e))
                })?;
                disks.refresh(true);
                let mounts: Vec<(PathBuf, u64, u64)> = disks
                    .list()
                    .iter()
                    .map(|d| {
                        (
                            d.mount_point().to_path_buf(),
                            d.total_space(),
                            d.available_space(),
                        )
                    })
                    .collect();
                disk_percent_for(&mounts, &mount)?
            };

            let (net_bytes_sent, net_bytes_recv) = {
                let mut networks = networks.lock().map_err(|e| {
                    CollectError::Transport(format!("sysinfo networks lock poisoned: {}", e))
                })?;
                networks.refresh(true);
                sum_interfaces(networks.list().iter().map(|(name, data)| {
                    (
                        name.as_str(),
                        data.total_transmitted(),
                        data.total_received(),
                    )
                }))
            };

            Ok(HostReading {
                cpu_percent,
                memory_percent,
                disk_percent,
                net_bytes_sent,
                net_bytes_recv,
            })
        })
        .await
        .map_err(|e| CollectError::Transport(format!("sysinfo task join: {}", e)))?
    }
}

/// Wait still needed before a CPU refresh yields real usage, given the time since the baseline.
fn cpu_settle_delay(since_baseline: Duration) -> Duration {
    MINIMUM_CPU_UPDATE_INTERVAL.saturating_sub(since_baseline)
}

/// `(total - available) / total * 100`, 0 for an empty total.
fn used_percent(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(available);
    (used as f64 / total as f64) * 100.0
}

/// Usage of the partition mounted exactly at `mount`.
fn disk_percent_for(mounts: &[(PathBuf, u64, u64)], mount: &Path) -> Result<f64, CollectError> {
    mounts
        .iter()
        .find(|(m, _, _)| m == mount)
        .map(|(_, total, available)| used_percent(*total, *available))
        .ok_or_else(|| {
            CollectError::MalformedSample(format!("no disk mounted at {}", mount.display()))
        })
}

/// Cumulative (sent, received) across interfaces, loopback excluded.
fn sum_interfaces<'a>(ifaces: impl Iterator<Item = (&'a str, u64, u64)>) -> (u64, u64) {
    ifaces
        .filter(|(name, _, _)| *name != "lo" && !name.starts_with("lo0"))
        .fold((0u64, 0u64), |(tx, rx), (_, t, r)| {
            (tx.saturating_add(t), rx.saturating_add(r))
        })
}
