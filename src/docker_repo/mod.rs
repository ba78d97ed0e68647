// Docker container listing and stats via bollard

mod stats;

use crate::error::CollectError;
use crate::models::{ContainerState, WorkloadInfo, WorkloadStatSnapshot};
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use futures_util::StreamExt;
use std::collections::HashMap;
use tracing::instrument;

/// Container runtime as seen by the supervisor and workload collectors.
#[async_trait]
pub trait WorkloadRuntime: Send + Sync + 'static {
    /// Running workloads. Fails with `Transport` when the runtime is unreachable.
    async fn list_workloads(&self) -> Result<Vec<WorkloadInfo>, CollectError>;

    /// One stats reading for `id`. `NotFound` if the workload is gone.
    async fn stat_snapshot(&self, id: &str) -> Result<WorkloadStatSnapshot, CollectError>;
}

pub struct DockerRepo {
    docker: Docker,
}

impl DockerRepo {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl WorkloadRuntime for DockerRepo {
    #[instrument(skip(self), fields(repo = "docker", operation = "list_workloads"))]
    async fn list_workloads(&self) -> Result<Vec<WorkloadInfo>, CollectError> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let filter = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(filter)).await?;

        let workloads = containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                let name = c
                    .names
                    .as_ref()
                    .and_then(|n| n.first())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| id.clone());
                let state = c
                    .state
                    .map(|s| ContainerState::from_docker(&s.to_string()))
                    .unwrap_or(ContainerState::Unknown);
                Some(WorkloadInfo {
                    id,
                    name,
                    image: c.image.unwrap_or_else(|| "<none>".into()),
                    state,
                })
            })
            .collect();
        Ok(workloads)
    }

    #[instrument(skip(self), fields(repo = "docker", operation = "stat_snapshot"))]
    async fn stat_snapshot(&self, id: &str) -> Result<WorkloadStatSnapshot, CollectError> {
        // Non-streaming read; Docker waits one cycle so precpu_stats is populated.
        let options = StatsOptions {
            stream: false,
            ..Default::default()
        };
        let mut stream = self.docker.stats(id, Some(options));
        match stream.next().await {
            Some(Ok(s)) => stats::stat_snapshot(&s, id),
            Some(Err(e)) => Err(e.into()),
            None => Err(CollectError::Transport(format!(
                "empty stats response for {}",
                id
            ))),
        }
    }
}
