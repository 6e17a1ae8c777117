use thiserror::Error;

use crate::RecordId;

/// Failure to fetch or decode a dataset's records. Recoverable: the store keeps
/// whatever it held before.
#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("fetch failed: {0}")]
    Fetch(String),
}

/// A record that cannot be tokenized. The builder skips it and carries on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexBuildError {
    #[error("record {id}: title has no indexable characters")]
    EmptyTitle { id: RecordId },
    #[error("record {id}: title is {len} bytes (max {max})")]
    TitleTooLong { id: RecordId, len: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog has no datasets")]
    Empty,
    #[error("default dataset {0} is not in the catalog")]
    UnknownDefault(String),
}
