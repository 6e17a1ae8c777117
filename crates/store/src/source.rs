use anyhow::{Context, Result};
use async_trait::async_trait;
use msearch_core::{Catalog, Dataset, DatasetLoadError, Record};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fetches one dataset's records: either all of them or an error.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, dataset: &Dataset) -> Result<Vec<Record>, DatasetLoadError>;
}

/// Reads `<root>/<dataset.path>` as a JSON array of records.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    /// Root dataset paths at the directory holding the catalog file.
    pub fn for_catalog(catalog_path: &Path) -> Self {
        let root = catalog_path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self { root }
    }

    pub fn root(&self) -> &Path { &self.root }
}

#[async_trait]
impl RecordSource for FsSource {
    async fn fetch(&self, dataset: &Dataset) -> Result<Vec<Record>, DatasetLoadError> {
        let path = self.root.join(&dataset.path);
        let shown = path.display().to_string();
        let started = std::time::Instant::now();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| DatasetLoadError::Io { path: shown.clone(), source })?;
        let records: Vec<Record> = serde_json::from_slice(&bytes)
            .map_err(|source| DatasetLoadError::Parse { path: shown.clone(), source })?;
        debug!(path = %shown, records = records.len(), elapsed_ms = started.elapsed().as_millis() as u64, "dataset fetched");
        Ok(records)
    }
}

/// Simple in-memory source for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    datasets: FxHashMap<String, Result<Vec<Record>, String>>,
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn with_dataset(mut self, key: &str, records: Vec<Record>) -> Self {
        self.datasets.insert(key.to_string(), Ok(records));
        self
    }

    pub fn with_failure(mut self, key: &str, message: &str) -> Self {
        self.datasets.insert(key.to_string(), Err(message.to_string()));
        self
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch(&self, dataset: &Dataset) -> Result<Vec<Record>, DatasetLoadError> {
        match self.datasets.get(&dataset.key) {
            Some(Ok(records)) => Ok(records.clone()),
            Some(Err(msg)) => Err(DatasetLoadError::Fetch(msg.clone())),
            None => Err(DatasetLoadError::UnknownDataset(dataset.key.clone())),
        }
    }
}

/// Read and parse a `meta.json` catalog file.
pub async fn load_catalog(path: &Path) -> Result<Catalog> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading catalog {}", path.display()))?;
    Catalog::from_json(&bytes).with_context(|| format!("parsing catalog {}", path.display()))
}
