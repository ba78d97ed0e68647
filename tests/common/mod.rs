// Shared test helpers: in-memory runtime and host providers

#![allow(dead_code)]

use async_trait::async_trait;
use dockwatch::docker_repo::WorkloadRuntime;
use dockwatch::error::CollectError;
use dockwatch::models::*;
use dockwatch::sysinfo_repo::HostStatsProvider;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub fn workload(id: &str) -> WorkloadInfo {
    WorkloadInfo {
        id: id.into(),
        name: format!("{id}-name"),
        image: "alpine:latest".into(),
        state: ContainerState::Running,
    }
}

/// Runtime whose listing and per-id failures are set by the test.
/// CPU counters advance on every stats call so each reading has a fresh delta.
#[derive(Default)]
pub struct FakeRuntime {
    listing: Mutex<Vec<WorkloadInfo>>,
    listing_fails: Mutex<bool>,
    listing_hangs: Mutex<bool>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, u64>>,
}

impl FakeRuntime {
    pub fn with_workloads(ids: &[&str]) -> Self {
        let rt = Self::default();
        rt.set_workloads(ids);
        rt
    }

    pub fn set_workloads(&self, ids: &[&str]) {
        *self.listing.lock().unwrap() = ids.iter().map(|id| workload(id)).collect();
    }

    pub fn set_listing_fails(&self, fails: bool) {
        *self.listing_fails.lock().unwrap() = fails;
    }

    /// Listing calls never answer (daemon wedged).
    pub fn set_listing_hangs(&self, hangs: bool) {
        *self.listing_hangs.lock().unwrap() = hangs;
    }

    pub fn fail_stats_for(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn stat_calls(&self, id: &str) -> u64 {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl WorkloadRuntime for FakeRuntime {
    async fn list_workloads(&self) -> Result<Vec<WorkloadInfo>, CollectError> {
        let hangs = *self.listing_hangs.lock().unwrap();
        if hangs {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if *self.listing_fails.lock().unwrap() {
            return Err(CollectError::Transport("runtime unreachable".into()));
        }
        Ok(self.listing.lock().unwrap().clone())
    }

    async fn stat_snapshot(&self, id: &str) -> Result<WorkloadStatSnapshot, CollectError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(id.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        if self.failing.lock().unwrap().contains(id) {
            return Err(CollectError::Transport(format!("stats for {id} failed")));
        }
        // 25% of one CPU out of two, memory at a quarter of the limit.
        Ok(WorkloadStatSnapshot {
            cpu: CpuCounters {
                total_usage: n * 250,
                system_usage: n * 2000,
            },
            precpu: None,
            online_cpus: 2,
            memory_usage_bytes: 256,
            memory_limit_bytes: 1024,
        })
    }
}

/// Host provider returning fixed percentages and a growing network counter.
#[derive(Default)]
pub struct FakeHost {
    calls: AtomicU64,
}

#[async_trait]
impl HostStatsProvider for FakeHost {
    async fn host_snapshot(&self) -> Result<HostReading, CollectError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(HostReading {
            cpu_percent: 12.5,
            memory_percent: 40.0,
            disk_percent: 70.0,
            net_bytes_sent: n * 1000,
            net_bytes_recv: n * 4000,
        })
    }
}
