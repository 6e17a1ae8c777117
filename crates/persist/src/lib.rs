//! msearch persisted state: the shareable link form of a query.
//!
//! The state is a flat string map (`query`, `set`, `title`, `descr`) rendered as a
//! URL query string. Decoding never fails: missing or malformed entries fall back
//! to defaults so a hand-edited link still opens something.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use msearch_core::{Catalog, Dataset, FieldSet, QueryState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const KEY_QUERY: &str = "query";
pub const KEY_DATASET: &str = "set";
pub const KEY_TITLE: &str = "title";
pub const KEY_DESCRIPTION: &str = "descr";

/// Render order for the known keys; anything else follows in key order.
const KNOWN_KEYS: [&str; 4] = [KEY_QUERY, KEY_DATASET, KEY_TITLE, KEY_DESCRIPTION];

/// Flat string-to-string map with query-string encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: BTreeMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self { Self::default() }

    /// Parse `a=1&b=two`. A leading `?` is accepted, `+` is a space, repeated
    /// keys keep their first value, and pairs that fail to decode are dropped.
    pub fn from_query_string(raw: &str) -> Self {
        let mut out = Self::new();
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let (Some(k), Some(v)) = (decode(k), decode(v)) else {
                warn!(pair, "skipping undecodable query parameter");
                continue;
            };
            if out.pairs.contains_key(&k) {
                debug!(key = %k, "ignoring repeated query parameter");
                continue;
            }
            out.pairs.insert(k, v);
        }
        out
    }

    pub fn to_query_string(&self) -> String {
        let known = KNOWN_KEYS.iter().filter_map(|k| self.pairs.get_key_value(*k));
        let rest = self.pairs.iter().filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()));
        known
            .chain(rest)
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn get(&self, key: &str) -> Option<&str> { self.pairs.get(key).map(String::as_str) }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize { self.pairs.len() }
    pub fn is_empty(&self) -> bool { self.pairs.is_empty() }
}

fn decode(s: &str) -> Option<String> {
    urlencoding::decode(&s.replace('+', " ")).ok().map(|c| c.into_owned())
}

/// `true` unless the value is one of the explicit "off" spellings.
fn decode_flag(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => {
            let v = v.trim();
            !(v.is_empty() || ["false", "0", "off"].iter().any(|f| v.eq_ignore_ascii_case(f)))
        }
    }
}

fn encode_flag(flag: bool) -> &'static str {
    if flag { "true" } else { "" }
}

/// Everything a link restores. The result window is deliberately absent: a
/// reopened link starts at the base chunk size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub query: String,
    pub dataset: Option<String>,
    pub title: bool,
    pub description: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self { query: String::new(), dataset: None, title: true, description: true }
    }
}

impl PersistedState {
    pub fn new(query: &QueryState, dataset: Option<&str>) -> Self {
        Self {
            query: query.text.clone(),
            dataset: dataset.map(str::to_string),
            title: query.fields.title,
            description: query.fields.description,
        }
    }

    pub fn from_params(params: &QueryParams) -> Self {
        Self {
            query: params.get(KEY_QUERY).unwrap_or_default().to_string(),
            dataset: params.get(KEY_DATASET).map(str::to_string),
            title: decode_flag(params.get(KEY_TITLE)),
            description: decode_flag(params.get(KEY_DESCRIPTION)),
        }
    }

    pub fn to_params(&self) -> QueryParams {
        let mut p = QueryParams::new();
        p.insert(KEY_QUERY, self.query.as_str());
        if let Some(ds) = &self.dataset {
            p.insert(KEY_DATASET, ds.as_str());
        }
        p.insert(KEY_TITLE, encode_flag(self.title));
        p.insert(KEY_DESCRIPTION, encode_flag(self.description));
        p
    }

    pub fn from_query_string(raw: &str) -> Self { Self::from_params(&QueryParams::from_query_string(raw)) }
    pub fn to_query_string(&self) -> String { self.to_params().to_query_string() }

    pub fn query_state(&self) -> QueryState {
        QueryState {
            text: self.query.clone(),
            fields: FieldSet { title: self.title, description: self.description },
        }
    }

    /// The dataset to activate: the named one when the catalog knows it, otherwise the default.
    pub fn resolve_dataset<'a>(&self, catalog: &'a Catalog) -> &'a Dataset {
        if let Some(key) = self.dataset.as_deref() {
            if catalog.get(key).is_none() {
                warn!(dataset = key, fallback = %catalog.default_dataset().key, "unknown dataset in persisted state");
            }
        }
        catalog.resolve(self.dataset.as_deref())
    }

    /// Read a state file holding one query string. A missing file is the default state.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(s) => Ok(Self::from_query_string(s.trim())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading state file {}", path.display())),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        std::fs::write(path, self.to_query_string() + "\n")
            .with_context(|| format!("writing state file {}", path.display()))
    }
}

/// `MSEARCH_STATE_PATH`, else `~/.msearch/state`, else `./msearch.state`.
pub fn default_state_path() -> PathBuf {
    if let Ok(p) = std::env::var("MSEARCH_STATE_PATH") {
        return PathBuf::from(p);
    }
    if let Ok(home) = std::env::var("HOME") {
        return Path::new(&home).join(".msearch").join("state");
    }
    PathBuf::from("msearch.state")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let ds = |k: &str| Dataset { key: k.into(), title: k.to_uppercase(), path: format!("{k}.json") };
        Catalog::new(vec![ds("home"), ds("system")], Some("system".into()), Vec::new()).unwrap()
    }

    #[test]
    fn missing_keys_use_defaults() {
        let s = PersistedState::from_query_string("");
        assert_eq!(s, PersistedState::default());
        assert_eq!(s.resolve_dataset(&catalog()).key, "system");
    }

    #[test]
    fn flags_follow_link_encoding() {
        let s = PersistedState::from_query_string("query=nginx&set=home&title=&descr=true");
        assert_eq!(s.query, "nginx");
        assert_eq!(s.dataset.as_deref(), Some("home"));
        assert!(!s.title);
        assert!(s.description);

        for off in ["", "false", "FALSE", "0", "off", "Off"] {
            let p = QueryParams::from_query_string(&format!("title={off}"));
            assert!(!PersistedState::from_params(&p).title, "{off:?}");
        }
        for on in ["true", "1", "yes", "anything"] {
            let p = QueryParams::from_query_string(&format!("title={on}"));
            assert!(PersistedState::from_params(&p).title, "{on:?}");
        }
    }

    #[test]
    fn written_flags_encode_false_as_empty() {
        let s = PersistedState { query: "x".into(), dataset: None, title: false, description: true };
        let p = s.to_params();
        assert_eq!(p.get(KEY_TITLE), Some(""));
        assert_eq!(p.get(KEY_DESCRIPTION), Some("true"));
        assert_eq!(PersistedState::from_params(&p), s);
    }

    #[test]
    fn round_trips_through_query_string() {
        let cases = [
            PersistedState::default(),
            PersistedState { query: "services.nginx <name> & co=1".into(), dataset: Some("home".into()), title: false, description: true },
            PersistedState { query: "ünïcode + spaces".into(), dataset: None, title: true, description: false },
            PersistedState { query: String::new(), dataset: Some("system".into()), title: false, description: false },
        ];
        for s in cases {
            let raw = s.to_query_string();
            assert_eq!(PersistedState::from_query_string(&raw), s, "via {raw}");
        }
    }

    #[test]
    fn renders_known_keys_in_fixed_order() {
        let s = PersistedState { query: "a b".into(), dataset: Some("home".into()), title: true, description: false };
        assert_eq!(s.to_query_string(), "query=a%20b&set=home&title=true&descr=");
    }

    #[test]
    fn malformed_pairs_are_skipped_and_first_value_wins() {
        let p = QueryParams::from_query_string("?query=%FF%FE&set=home&set=system&query=ok&title");
        // first `query` fails to decode, so the later one is the first valid value
        assert_eq!(p.get(KEY_QUERY), Some("ok"));
        assert_eq!(p.get(KEY_DATASET), Some("home"));
        assert_eq!(p.get(KEY_TITLE), Some(""));
    }

    #[test]
    fn unknown_dataset_falls_back_to_default() {
        let s = PersistedState::from_query_string("set=darwin");
        assert_eq!(s.dataset.as_deref(), Some("darwin"));
        assert_eq!(s.resolve_dataset(&catalog()).key, "system");
    }

    #[test]
    fn query_state_mirrors_flags() {
        let s = PersistedState::from_query_string("query=x&descr=off");
        let q = s.query_state();
        assert_eq!(q.text, "x");
        assert_eq!(q.fields, FieldSet { title: true, description: false });
        assert_eq!(PersistedState::new(&q, None), PersistedState { dataset: None, ..s });
    }

    #[test]
    fn state_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state");
        assert_eq!(PersistedState::load_from(&path).unwrap(), PersistedState::default());
        let s = PersistedState { query: "boot".into(), dataset: Some("home".into()), title: true, description: false };
        s.save_to(&path).unwrap();
        assert_eq!(PersistedState::load_from(&path).unwrap(), s);
    }
}
