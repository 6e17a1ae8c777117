//! msearch search: in-RAM option index over a `RecordSet`.
//!
//! Two independent sub-indices, both keyed by record position:
//! - title: distinct term vocabulary with postings plus a trigram map, matched by substring
//! - description: sorted term dictionary with postings, matched by prefix

#![forbid(unsafe_code)]

use msearch_core::{RecordId, RecordSet, SearchConfig};
use rustc_hash::FxHashMap;
use std::sync::Arc;

mod build;
mod query;
pub mod tokenize;

pub use build::{build_cooperative, BuildOutcome, BuildStats, IndexBuilder};
pub use query::{search, search_with_debug, ResultSet, SearchDebugInfo};
pub use tokenize::Tokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
}

impl Field {
    pub fn tokenizer(self) -> Tokenizer {
        match self {
            Field::Title => Tokenizer::Title,
            Field::Description => Tokenizer::Description,
        }
    }
}

type Trigram = [char; 3];

#[derive(Default)]
struct TitleIndex {
    terms: Vec<String>,
    term_ids: FxHashMap<String, u32>,
    postings: Vec<Vec<RecordId>>,      // term id -> ascending record ids
    grams: FxHashMap<Trigram, Vec<u32>>, // trigram -> ascending term ids
}

impl TitleIndex {
    fn insert(&mut self, id: RecordId, tokens: &[String]) {
        for tok in tokens {
            let tid = match self.term_ids.get(tok) {
                Some(tid) => *tid,
                None => self.add_term(tok),
            };
            let post = &mut self.postings[tid as usize];
            if post.last() != Some(&id) { post.push(id); }
        }
    }

    fn add_term(&mut self, tok: &str) -> u32 {
        let tid = self.terms.len() as u32;
        self.terms.push(tok.to_string());
        self.term_ids.insert(tok.to_string(), tid);
        self.postings.push(Vec::new());
        let chars: Vec<char> = tok.chars().collect();
        for w in chars.windows(3) {
            let post = self.grams.entry([w[0], w[1], w[2]]).or_default();
            if post.last() != Some(&tid) { post.push(tid); }
        }
        tid
    }

    /// Records having a title token that contains `term`.
    fn lookup(&self, term: &str) -> Vec<RecordId> {
        let chars: Vec<char> = term.chars().collect();
        let mut out: Vec<RecordId> = Vec::new();
        if chars.len() < 3 {
            for (tid, t) in self.terms.iter().enumerate() {
                if t.contains(term) { out.extend_from_slice(&self.postings[tid]); }
            }
        } else {
            let mut candidates: Option<Vec<u32>> = None;
            for w in chars.windows(3) {
                let Some(post) = self.grams.get(&[w[0], w[1], w[2]]) else { return Vec::new(); };
                let next = match candidates {
                    None => post.clone(),
                    Some(c) => intersect_sorted(&c, post),
                };
                if next.is_empty() { return Vec::new(); }
                candidates = Some(next);
            }
            for tid in candidates.unwrap_or_default() {
                if self.terms[tid as usize].contains(term) { out.extend_from_slice(&self.postings[tid as usize]); }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[derive(Default)]
struct DescriptionIndex {
    terms: Vec<(String, Vec<RecordId>)>, // sorted by term
}

impl DescriptionIndex {
    fn from_postings(postings: FxHashMap<String, Vec<RecordId>>) -> Self {
        let mut terms: Vec<(String, Vec<RecordId>)> = postings.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Self { terms }
    }

    /// Records having a description token that starts with `prefix`.
    fn lookup(&self, prefix: &str) -> Vec<RecordId> {
        let start = self.terms.partition_point(|(t, _)| t.as_str() < prefix);
        let mut out: Vec<RecordId> = Vec::new();
        for (_t, post) in self.terms[start..].iter().take_while(|(t, _)| t.starts_with(prefix)) {
            out.extend_from_slice(post);
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Build-once index over exactly one `RecordSet`.
pub struct Index {
    records: Arc<RecordSet>,
    title: TitleIndex,
    description: DescriptionIndex,
    stats: BuildStats,
}

impl Index {
    /// Synchronous build; see `build_cooperative` for the yielding variant.
    pub fn build(records: Arc<RecordSet>, config: &SearchConfig) -> Self {
        let mut builder = IndexBuilder::new(records, config);
        while builder.step() {}
        builder.finish()
    }

    pub fn records(&self) -> &Arc<RecordSet> { &self.records }
    pub fn generation(&self) -> u64 { self.records.generation }
    pub fn stats(&self) -> &BuildStats { &self.stats }

    /// All query terms must match (intersection). Ascending record ids.
    pub fn lookup(&self, field: Field, query: &str) -> Vec<RecordId> {
        let terms = field.tokenizer().tokens(query);
        let mut acc: Option<Vec<RecordId>> = None;
        for term in terms.iter() {
            let ids = match field {
                Field::Title => self.title.lookup(term),
                Field::Description => self.description.lookup(term),
            };
            let next = match acc {
                None => ids,
                Some(a) => intersect_sorted(&a, &ids),
            };
            if next.is_empty() { return Vec::new(); }
            acc = Some(next);
        }
        acc.unwrap_or_default()
    }
}

fn intersect_sorted<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut i = 0usize;
    let mut j = 0usize;
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => { out.push(a[i]); i += 1; j += 1; }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use msearch_core::{Dataset, Record};

    fn rec(title: &str, description: &str) -> Record {
        serde_json::from_value(serde_json::json!({ "title": title, "description": description })).unwrap()
    }

    fn set(items: Vec<Record>) -> Arc<RecordSet> {
        let ds = Dataset { key: "system".into(), title: "System".into(), path: "system.json".into() };
        Arc::new(RecordSet::new(1, ds, items))
    }

    fn index(items: Vec<Record>) -> Index { Index::build(set(items), &SearchConfig::default()) }

    #[test]
    fn title_substring_lookup() {
        let idx = index(vec![
            rec("services.nginx.enable", ""),
            rec("services.nginx.package", ""),
            rec("users.extraGroups", ""),
        ]);
        assert_eq!(idx.lookup(Field::Title, "nginx"), vec![0, 1]);
        assert_eq!(idx.lookup(Field::Title, "x.pack"), vec![1]);
        assert_eq!(idx.lookup(Field::Title, "EXTRA"), vec![2]);
        assert_eq!(idx.lookup(Field::Title, "s."), vec![0, 1, 2]);
        assert!(idx.lookup(Field::Title, "apache").is_empty());
    }

    #[test]
    fn title_terms_intersect() {
        let idx = index(vec![
            rec("services.nginx.enable", ""),
            rec("services.httpd.enable", ""),
            rec("services.nginx.package", ""),
        ]);
        assert_eq!(idx.lookup(Field::Title, "nginx enable"), vec![0]);
        assert_eq!(idx.lookup(Field::Title, "enable"), vec![0, 1]);
    }

    #[test]
    fn description_prefix_not_suffix() {
        let idx = index(vec![
            rec("a", "Enable the web engine."),
            rec("b", "Engineering notes"),
            rec("c", "Nothing here"),
        ]);
        assert_eq!(idx.lookup(Field::Description, "eng"), vec![0, 1]);
        assert_eq!(idx.lookup(Field::Description, "engineering"), vec![1]);
        assert!(idx.lookup(Field::Description, "gine").is_empty());
        assert_eq!(idx.lookup(Field::Description, "web eng"), vec![0]);
    }

    #[test]
    fn repeated_tokens_post_once() {
        let idx = index(vec![rec("x", "nginx nginx nginx"), rec("y", "nginx")]);
        assert_eq!(idx.lookup(Field::Description, "nginx"), vec![0, 1]);
    }

    #[test]
    fn query_without_terms_matches_nothing() {
        let idx = index(vec![rec("a.b", "text")]);
        assert!(idx.lookup(Field::Description, "!!").is_empty());
        assert!(idx.lookup(Field::Title, "   ").is_empty());
    }

    #[test]
    fn intersect_sorted_basic() {
        assert_eq!(intersect_sorted(&[1, 3, 5, 7], &[3, 4, 5, 8]), vec![3, 5]);
        assert!(intersect_sorted::<u32>(&[], &[1]).is_empty());
    }
}
