// Docker container models

use serde::{Deserialize, Serialize};

/// Docker container state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running,
    Created,
    Exited,
    Paused,
    Restarting,
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    /// Parse from Docker API state string (e.g. "running", "exited").
    pub fn from_docker(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "running" => ContainerState::Running,
            "created" => ContainerState::Created,
            "exited" => ContainerState::Exited,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            _ => ContainerState::Unknown,
        }
    }
}

/// One entry of the runtime's container listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
}

/// Cumulative CPU time counters, both in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuCounters {
    /// CPU time consumed by the container.
    pub total_usage: u64,
    /// CPU time consumed by the whole host.
    pub system_usage: u64,
}

/// Raw per-container stats as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatSnapshot {
    pub cpu: CpuCounters,
    /// Previous counters when the runtime supplies them (Docker `precpu_stats`).
    pub precpu: Option<CpuCounters>,
    /// Schedulable CPUs, not a time counter.
    pub online_cpus: u32,
    pub memory_usage_bytes: u64,
    pub memory_limit_bytes: u64,
}
