// One-time restore at startup: seed the in-memory buffers from SQLite before any
// collector runs.

use crate::history_repo::HistoryRepo;
use crate::series_store::MetricSeriesStore;
use tracing::info;

/// Loads the newest `capacity` samples of every persisted series into `store`.
/// Returns the number of series restored.
pub async fn restore_store(repo: &HistoryRepo, store: &MetricSeriesStore) -> anyhow::Result<usize> {
    let keys = repo.series_keys().await?;
    let mut samples_total = 0usize;
    for key in &keys {
        let samples = repo.load_recent(key, store.capacity_for(key)).await?;
        samples_total += samples.len();
        store.restore(key, samples);
    }
    info!(
        series_count = keys.len(),
        samples_count = samples_total,
        "history restored"
    );
    Ok(keys.len())
}
