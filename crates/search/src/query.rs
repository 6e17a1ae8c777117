use msearch_core::{FieldSet, Record, RecordId};
use rustc_hash::FxHashSet;
use std::sync::Arc;

use crate::{Field, Index};

/// Records exposed to the presentation layer for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub records: Vec<Arc<Record>>,
    /// The window was filled; more matches may exist beyond it.
    pub truncated: bool,
}

impl ResultSet {
    fn windowed(records: Vec<Arc<Record>>, window: usize) -> Self {
        let truncated = records.len() >= window;
        Self { records, truncated }
    }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn titles(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(|r| r.title.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SearchDebugInfo {
    pub total: usize,
    pub title_hits: usize,
    pub description_hits: usize,
    pub merged: usize,
}

pub fn search(index: &Index, text: &str, fields: FieldSet, window: usize) -> ResultSet {
    search_with_debug(index, text, fields, window).0
}

/// Field-scoped lookup capped at `window`.
///
/// Empty text lists the whole collection in dataset order without touching the
/// sub-indices. With both fields on, title matches come first, then description
/// matches not already listed, each in dataset order. With no field enabled the
/// result is empty, even for empty text.
pub fn search_with_debug(index: &Index, text: &str, fields: FieldSet, window: usize) -> (ResultSet, SearchDebugInfo) {
    let started = std::time::Instant::now();
    let window = window.max(1);
    let records = index.records();
    let mut dbg = SearchDebugInfo { total: records.len(), ..SearchDebugInfo::default() };

    if fields.is_empty() {
        return (ResultSet::default(), dbg);
    }
    if text.is_empty() {
        let all: Vec<Arc<Record>> = records.records.iter().take(window).cloned().collect();
        dbg.merged = all.len();
        return (ResultSet::windowed(all, window), dbg);
    }

    let title_ids = if fields.title { index.lookup(Field::Title, text) } else { Vec::new() };
    let descr_ids = if fields.description { index.lookup(Field::Description, text) } else { Vec::new() };
    dbg.title_hits = title_ids.len();
    dbg.description_hits = descr_ids.len();

    let mut seen: FxHashSet<RecordId> = FxHashSet::default();
    let mut out: Vec<Arc<Record>> = Vec::with_capacity(window.min(title_ids.len() + descr_ids.len()));
    for id in title_ids.iter().chain(descr_ids.iter()) {
        if out.len() >= window { break; }
        if !seen.insert(*id) { continue; }
        // ids outside the collection are dropped, not reported
        if let Some(r) = records.get(*id) { out.push(Arc::clone(r)); }
    }
    dbg.merged = out.len();
    metrics::histogram!("search_eval_ms", started.elapsed().as_secs_f64() * 1_000.0);
    (ResultSet::windowed(out, window), dbg)
}
