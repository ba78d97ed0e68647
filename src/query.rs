// Read-only view over the series store for the API layer.

use crate::models::{
    ChartSeries, DashboardSnapshot, HostMetric, HostSnapshotView, Sample, SeriesKey, SeriesPoint,
    WorkloadInfo, WorkloadMetric, WorkloadSnapshot, WorkloadStatusView,
};
use crate::series_store::MetricSeriesStore;
use std::sync::Arc;

/// Field indices of the host network series.
pub const NET_SENT: usize = 0;
pub const NET_RECV: usize = 1;

#[derive(Clone)]
pub struct QueryService {
    store: Arc<MetricSeriesStore>,
}

impl QueryService {
    pub fn new(store: Arc<MetricSeriesStore>) -> Self {
        Self { store }
    }

    /// Chronological (timestamp, value) pairs of the first field.
    pub fn host_series(&self, metric: HostMetric) -> Vec<SeriesPoint> {
        self.host_field_series(metric, 0)
    }

    /// Chronological pairs of `field` (e.g. `NET_RECV` for network). Empty if out of range.
    pub fn host_field_series(&self, metric: HostMetric, field: usize) -> Vec<SeriesPoint> {
        points(&self.store.range(&SeriesKey::Host(metric)), field)
    }

    pub fn workload_series(&self, id: &str, metric: WorkloadMetric) -> Vec<SeriesPoint> {
        points(&self.store.range(&SeriesKey::workload(id, metric)), 0)
    }

    /// Bytes/sec between consecutive network samples, stamped with the later sample.
    pub fn network_rates(&self, field: usize) -> Vec<SeriesPoint> {
        rates(&self.host_field_series(HostMetric::Network, field))
    }

    /// Latest cpu/memory for a workload; unavailable until both series have a sample.
    pub fn current_snapshot(&self, id: &str) -> WorkloadSnapshot {
        let cpu = self
            .store
            .latest(&SeriesKey::workload(id, WorkloadMetric::Cpu));
        let mem = self
            .store
            .latest(&SeriesKey::workload(id, WorkloadMetric::Memory));
        match (cpu, mem) {
            (Some(cpu), Some(mem)) => WorkloadSnapshot::Available {
                cpu_percent: cpu.field(0).unwrap_or(0.0),
                memory_percent: mem.field(0).unwrap_or(0.0),
                timestamp: cpu.timestamp.max(mem.timestamp),
            },
            _ => WorkloadSnapshot::Unavailable,
        }
    }

    pub fn host_snapshot(&self) -> HostSnapshotView {
        let latest = |m| self.store.latest(&SeriesKey::Host(m));
        let cpu = latest(HostMetric::Cpu);
        let mem = latest(HostMetric::Memory);
        let disk = latest(HostMetric::Disk);
        let net = latest(HostMetric::Network);
        let timestamp = [cpu.as_ref(), mem.as_ref(), disk.as_ref(), net.as_ref()]
            .into_iter()
            .flatten()
            .map(|s| s.timestamp)
            .max();
        HostSnapshotView {
            cpu_percent: cpu.and_then(|s| s.field(0)),
            memory_percent: mem.and_then(|s| s.field(0)),
            disk_percent: disk.and_then(|s| s.field(0)),
            net_bytes_sent: net.as_ref().and_then(|s| s.field(NET_SENT)).map(|v| v as u64),
            net_bytes_recv: net.as_ref().and_then(|s| s.field(NET_RECV)).map(|v| v as u64),
            timestamp,
        }
    }

    /// Host snapshot plus the current metrics of every listed workload.
    pub fn dashboard(&self, workloads: &[WorkloadInfo]) -> DashboardSnapshot {
        DashboardSnapshot {
            host: self.host_snapshot(),
            workloads: workloads
                .iter()
                .map(|w| WorkloadStatusView {
                    info: w.clone(),
                    metrics: self.current_snapshot(&w.id),
                })
                .collect(),
        }
    }
}

fn points(samples: &[Sample], field: usize) -> Vec<SeriesPoint> {
    samples
        .iter()
        .filter_map(|s| {
            s.field(field).map(|value| SeriesPoint {
                timestamp: s.timestamp,
                value,
            })
        })
        .collect()
}

/// Per-second deltas of a cumulative counter. Resets and zero-length gaps yield 0.
pub fn rates(cumulative: &[SeriesPoint]) -> Vec<SeriesPoint> {
    cumulative
        .windows(2)
        .map(|w| {
            let dt = w[1].timestamp - w[0].timestamp;
            let dv = w[1].value - w[0].value;
            let value = if dt > 0 && dv > 0.0 {
                dv / dt as f64
            } else {
                0.0
            };
            SeriesPoint {
                timestamp: w[1].timestamp,
                value,
            }
        })
        .collect()
}

/// Parallel labels (`%H:%M:%S` UTC) and values, in the given order.
pub fn chart(points: &[SeriesPoint]) -> ChartSeries {
    let labels = points
        .iter()
        .map(|p| {
            chrono::DateTime::from_timestamp(p.timestamp, 0)
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| p.timestamp.to_string())
        })
        .collect();
    ChartSeries {
        labels,
        values: points.iter().map(|p| p.value).collect(),
    }
}
