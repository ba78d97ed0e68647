// Domain models

mod container;
mod host;
mod sample;
mod view;

pub use container::{ContainerState, CpuCounters, WorkloadInfo, WorkloadStatSnapshot};
pub use host::HostReading;
pub use sample::{HostMetric, Sample, SeriesKey, WorkloadMetric};
pub use view::{
    ChartSeries, DashboardSnapshot, HostSnapshotView, SeriesPoint, WorkloadSnapshot,
    WorkloadStatusView,
};
