use msearch_core::{IndexBuildError, Record, RecordId, RecordSet, SearchConfig};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::tokenize::Tokenizer;
use crate::{DescriptionIndex, Index, TitleIndex};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub indexed: usize,
    pub skipped: usize,
    pub title_terms: usize,
    pub description_terms: usize,
    pub elapsed: Duration,
}

pub enum BuildOutcome {
    Ready(Index),
    /// A newer load was requested before the build finished; nothing was produced.
    Stale { generation: u64 },
}

/// Incremental builder: feeds `build_batch` records per `step`.
pub struct IndexBuilder {
    records: Arc<RecordSet>,
    next: usize,
    batch: usize,
    max_title_len: usize,
    title: TitleIndex,
    description: FxHashMap<String, Vec<RecordId>>,
    stats: BuildStats,
    started: Instant,
}

impl IndexBuilder {
    pub fn new(records: Arc<RecordSet>, config: &SearchConfig) -> Self {
        Self {
            records,
            next: 0,
            batch: config.build_batch.max(1),
            max_title_len: config.max_title_len,
            title: TitleIndex::default(),
            description: FxHashMap::default(),
            stats: BuildStats::default(),
            started: Instant::now(),
        }
    }

    pub fn generation(&self) -> u64 { self.records.generation }
    pub fn is_done(&self) -> bool { self.next >= self.records.len() }

    /// Index the next batch. Returns true while records remain.
    pub fn step(&mut self) -> bool {
        let end = (self.next + self.batch).min(self.records.len());
        for i in self.next..end {
            let id = i as RecordId;
            let rec = Arc::clone(&self.records.records[i]);
            match tokenize_record(id, &rec, self.max_title_len) {
                Ok((title, description)) => {
                    self.title.insert(id, &title);
                    for tok in description {
                        let post = self.description.entry(tok).or_default();
                        if post.last() != Some(&id) { post.push(id); }
                    }
                    self.stats.indexed += 1;
                }
                Err(e) => {
                    debug!(error = %e, title = %rec.title, "skipping record");
                    self.stats.skipped += 1;
                }
            }
        }
        self.next = end;
        !self.is_done()
    }

    pub fn finish(mut self) -> Index {
        while self.step() {}
        let description = DescriptionIndex::from_postings(self.description);
        self.stats.title_terms = self.title.terms.len();
        self.stats.description_terms = description.terms.len();
        self.stats.elapsed = self.started.elapsed();

        metrics::gauge!("index_docs", self.stats.indexed as f64);
        metrics::histogram!("index_build_ms", self.stats.elapsed.as_secs_f64() * 1_000.0);
        if self.stats.skipped > 0 {
            metrics::counter!("index_skipped_records_total", self.stats.skipped as u64);
        }
        info!(
            dataset = self.records.dataset_key().unwrap_or(""),
            generation = self.records.generation,
            indexed = self.stats.indexed,
            skipped = self.stats.skipped,
            elapsed_ms = self.stats.elapsed.as_millis() as u64,
            "index built"
        );
        Index { records: self.records, title: self.title, description, stats: self.stats }
    }
}

fn tokenize_record(id: RecordId, rec: &Record, max_title_len: usize) -> Result<(Vec<String>, Vec<String>), IndexBuildError> {
    if rec.title.len() > max_title_len {
        return Err(IndexBuildError::TitleTooLong { id, len: rec.title.len(), max: max_title_len });
    }
    let title = Tokenizer::Title.tokens(&rec.title);
    if title.is_empty() {
        return Err(IndexBuildError::EmptyTitle { id });
    }
    Ok((title, Tokenizer::Description.tokens(&rec.description)))
}

/// Build in batches, yielding to the runtime between them. Before each batch the
/// latest requested generation is compared with the one being built; a mismatch
/// abandons the build.
pub async fn build_cooperative(
    records: Arc<RecordSet>,
    config: &SearchConfig,
    requested: watch::Receiver<u64>,
) -> BuildOutcome {
    let mut builder = IndexBuilder::new(records, config);
    let generation = builder.generation();
    loop {
        if *requested.borrow() != generation {
            debug!(generation, "index build superseded");
            return BuildOutcome::Stale { generation };
        }
        if !builder.step() { break; }
        tokio::task::yield_now().await;
    }
    BuildOutcome::Ready(builder.finish())
}
