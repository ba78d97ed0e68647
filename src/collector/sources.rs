// Concrete sample sources: the host and one container.

use super::SampleSource;
use super::transform::{host_records, workload_records};
use crate::docker_repo::WorkloadRuntime;
use crate::error::CollectError;
use crate::models::{CpuCounters, HostReading, Sample, SeriesKey, WorkloadStatSnapshot};
use crate::sysinfo_repo::HostStatsProvider;
use async_trait::async_trait;
use std::sync::Arc;

pub struct HostSource {
    provider: Arc<dyn HostStatsProvider>,
}

impl HostSource {
    pub fn new(provider: Arc<dyn HostStatsProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl SampleSource for HostSource {
    type Reading = HostReading;

    fn label(&self) -> String {
        "host".into()
    }

    async fn sample(&self) -> Result<HostReading, CollectError> {
        self.provider.host_snapshot().await
    }

    fn transform(&mut self, reading: HostReading, timestamp: i64) -> Vec<(SeriesKey, Sample)> {
        host_records(&reading, timestamp)
    }
}

/// Samples one container. Remembers the last counters as a CPU baseline for
/// runtimes that do not report their own previous reading.
pub struct WorkloadSource {
    id: String,
    runtime: Arc<dyn WorkloadRuntime>,
    last_cpu: Option<CpuCounters>,
}

impl WorkloadSource {
    pub fn new(id: impl Into<String>, runtime: Arc<dyn WorkloadRuntime>) -> Self {
        Self {
            id: id.into(),
            runtime,
            last_cpu: None,
        }
    }
}

#[async_trait]
impl SampleSource for WorkloadSource {
    type Reading = WorkloadStatSnapshot;

    fn label(&self) -> String {
        format!("workload:{}", self.id)
    }

    async fn sample(&self) -> Result<WorkloadStatSnapshot, CollectError> {
        self.runtime.stat_snapshot(&self.id).await
    }

    fn transform(
        &mut self,
        reading: WorkloadStatSnapshot,
        timestamp: i64,
    ) -> Vec<(SeriesKey, Sample)> {
        let records = workload_records(&self.id, &reading, self.last_cpu, timestamp);
        self.last_cpu = Some(reading.cpu);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WorkloadInfo, WorkloadMetric};

    struct CountingRuntime;

    #[async_trait]
    impl WorkloadRuntime for CountingRuntime {
        async fn list_workloads(&self) -> Result<Vec<WorkloadInfo>, CollectError> {
            Ok(Vec::new())
        }

        async fn stat_snapshot(&self, _id: &str) -> Result<WorkloadStatSnapshot, CollectError> {
            unreachable!("transform-only test")
        }
    }

    fn reading(total: u64, system: u64) -> WorkloadStatSnapshot {
        WorkloadStatSnapshot {
            cpu: CpuCounters {
                total_usage: total,
                system_usage: system,
            },
            precpu: None,
            online_cpus: 2,
            memory_usage_bytes: 50,
            memory_limit_bytes: 100,
        }
    }

    #[test]
    fn first_reading_is_zero_then_uses_own_baseline() {
        let mut source = WorkloadSource::new("w1", Arc::new(CountingRuntime));
        assert_eq!(source.label(), "workload:w1");

        let first = source.transform(reading(0, 0), 10);
        assert_eq!(first[0].1, Sample::single(10, 0.0));
        assert_eq!(first[1].1, Sample::single(10, 50.0));

        // (50 - 0) / (100 - 0) * 2 * 100 = 100
        let second = source.transform(reading(50, 100), 11);
        assert_eq!(second[0].0, SeriesKey::workload("w1", WorkloadMetric::Cpu));
        assert_eq!(second[0].1, Sample::single(11, 100.0));
    }
}
