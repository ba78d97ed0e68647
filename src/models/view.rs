// Read-side shapes handed to the presentation layer.

use serde::{Deserialize, Serialize};

use super::WorkloadInfo;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// Parallel label/value sequences for charting, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Latest cpu/memory for one workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkloadSnapshot {
    #[serde(rename_all = "camelCase")]
    Available {
        cpu_percent: f64,
        memory_percent: f64,
        timestamp: i64,
    },
    Unavailable,
}

impl WorkloadSnapshot {
    pub fn is_available(&self) -> bool {
        matches!(self, WorkloadSnapshot::Available { .. })
    }
}

/// Latest value of each host series; `None` until the first successful tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSnapshotView {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
    pub net_bytes_sent: Option<u64>,
    pub net_bytes_recv: Option<u64>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatusView {
    #[serde(flatten)]
    pub info: WorkloadInfo,
    pub metrics: WorkloadSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub host: HostSnapshotView,
    pub workloads: Vec<WorkloadStatusView>,
}
