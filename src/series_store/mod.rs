// Keyed set of bounded rolling histories shared by all collectors and readers.
// Map lookups go through an RwLock; each buffer has its own mutex so appends to
// different keys never contend and append+trim is one step per key.

mod ring;

pub use ring::RingBuffer;

use crate::error::CollectError;
use crate::models::{Sample, SeriesKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Default host history: 1440 entries (24h at one sample per minute).
pub const DEFAULT_HOST_CAPACITY: usize = 1440;
/// Default per-workload history: 60 entries.
pub const DEFAULT_WORKLOAD_CAPACITY: usize = 60;

/// One appended sample, forwarded to the history writer.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistRecord {
    pub key: SeriesKey,
    pub sample: Sample,
    pub capacity: usize,
}

pub struct MetricSeriesStore {
    series: RwLock<HashMap<SeriesKey, Arc<Mutex<RingBuffer>>>>,
    host_capacity: usize,
    workload_capacity: usize,
    sink: Option<mpsc::Sender<PersistRecord>>,
}

impl Default for MetricSeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_CAPACITY, DEFAULT_WORKLOAD_CAPACITY)
    }
}

impl MetricSeriesStore {
    pub fn new(host_capacity: usize, workload_capacity: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            host_capacity,
            workload_capacity,
            sink: None,
        }
    }

    /// Forward every successful append to `sink` (non-blocking; drops when full).
    pub fn with_sink(mut self, sink: mpsc::Sender<PersistRecord>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Capacity a buffer for `key` gets when it is created.
    pub fn capacity_for(&self, key: &SeriesKey) -> usize {
        if key.is_host() {
            self.host_capacity
        } else {
            self.workload_capacity
        }
    }

    fn buffer(&self, key: &SeriesKey) -> Option<Arc<Mutex<RingBuffer>>> {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn buffer_or_create(&self, key: &SeriesKey) -> Arc<Mutex<RingBuffer>> {
        if let Some(buf) = self.buffer(key) {
            return buf;
        }
        let capacity = self.capacity_for(key);
        self.series
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(RingBuffer::new(capacity))))
            .clone()
    }

    /// Insert `sample` into `key` at its timestamp position, trimming to capacity.
    pub fn append(&self, key: &SeriesKey, sample: Sample) -> Result<(), CollectError> {
        if sample.fields.len() != key.arity() {
            return Err(CollectError::MalformedSample(format!(
                "{} expects {} field(s), got {}",
                key,
                key.arity(),
                sample.fields.len()
            )));
        }
        let buf = self.buffer_or_create(key);
        let capacity = {
            let mut guard = buf.lock().unwrap_or_else(PoisonError::into_inner);
            guard.push(sample.clone());
            guard.capacity()
        };
        if let Some(sink) = &self.sink {
            let record = PersistRecord {
                key: key.clone(),
                sample,
                capacity,
            };
            match sink.try_send(record) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(r)) => {
                    tracing::warn!(
                        series = %r.key,
                        operation = "persist_sample",
                        "history writer backlog full; sample kept in memory only"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("History writer channel closed");
                }
            }
        }
        Ok(())
    }

    /// Seed `key` with persisted history (any order). Keeps the newest `capacity` samples.
    pub fn restore(&self, key: &SeriesKey, mut samples: Vec<Sample>) {
        samples.retain(|s| s.fields.len() == key.arity());
        samples.sort_by_key(|s| s.timestamp);
        let buf = self.buffer_or_create(key);
        let mut guard = buf.lock().unwrap_or_else(PoisonError::into_inner);
        for s in samples {
            guard.push(s);
        }
    }

    /// All retained samples for `key`, oldest first. Empty for unknown keys.
    pub fn range(&self, key: &SeriesKey) -> Vec<Sample> {
        match self.buffer(key) {
            Some(buf) => buf
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .chronological(),
            None => Vec::new(),
        }
    }

    pub fn latest(&self, key: &SeriesKey) -> Option<Sample> {
        let buf = self.buffer(key)?;
        let guard = buf.lock().unwrap_or_else(PoisonError::into_inner);
        guard.latest().cloned()
    }

    pub fn len(&self, key: &SeriesKey) -> usize {
        self.buffer(key)
            .map(|b| b.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Known keys, sorted.
    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self
            .series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}
