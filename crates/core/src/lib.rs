//! msearch core types: records, datasets and the shared query vocabulary.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{Catalog, Dataset, NavLink};
pub use config::SearchConfig;
pub use error::{CatalogError, DatasetLoadError, IndexBuildError};

/// Position of a record inside the `RecordSet` it was loaded into.
pub type RecordId = u32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub url: String,
}

/// One configuration-option descriptor, immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Dot-delimited option name; unique within a dataset.
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Display-only markup, never indexed.
    #[serde(default, rename = "descriptionHTML")]
    pub description_rendered: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, rename = "example", skip_serializing_if = "Option::is_none")]
    pub example_value: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub declarations: SmallVec<[Declaration; 2]>,
}

/// The complete record collection of one dataset load.
///
/// `generation` is the load ticket that produced it; `0` is the empty state
/// that exists before any load succeeded.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub generation: u64,
    pub dataset: Option<Dataset>,
    pub records: Vec<Arc<Record>>,
}

impl RecordSet {
    pub fn new(generation: u64, dataset: Dataset, records: Vec<Record>) -> Self {
        Self {
            generation,
            dataset: Some(dataset),
            records: records.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn get(&self, id: RecordId) -> Option<&Arc<Record>> {
        self.records.get(id as usize)
    }

    pub fn dataset_key(&self) -> Option<&str> {
        self.dataset.as_ref().map(|d| d.key.as_str())
    }

    /// Titles are the identity key within a dataset; linear scan.
    pub fn find_by_title(&self, title: &str) -> Option<&Arc<Record>> {
        self.records.iter().find(|r| r.title == title)
    }
}

/// Which sub-indices a query consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    pub title: bool,
    pub description: bool,
}

impl FieldSet {
    pub const ALL: FieldSet = FieldSet { title: true, description: true };
    pub const NONE: FieldSet = FieldSet { title: false, description: false };

    pub fn is_empty(&self) -> bool { !self.title && !self.description }
}

impl Default for FieldSet {
    fn default() -> Self { Self::ALL }
}

/// User-editable query state. The window size lives with the pagination controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryState {
    pub text: String,
    pub fields: FieldSet,
}

pub mod prelude {
    pub use super::{
        Catalog, Dataset, DatasetLoadError, Declaration, FieldSet, QueryState, Record, RecordId,
        RecordSet, SearchConfig,
    };
}
