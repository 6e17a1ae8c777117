#![forbid(unsafe_code)]

use msearch_core::{Dataset, FieldSet, Record, RecordSet, SearchConfig};
use msearch_search::{search, Field, Index, Tokenizer};
use std::sync::Arc;

const TITLE_ONLY: FieldSet = FieldSet { title: true, description: false };
const DESCR_ONLY: FieldSet = FieldSet { title: false, description: true };

fn rec(title: &str, description: &str) -> Record {
    serde_json::from_value(serde_json::json!({ "title": title, "description": description, "type": "string" })).unwrap()
}

/// Option-like titles across a handful of namespaces.
fn corpus(n: usize) -> Vec<Record> {
    let roots = ["services", "boot", "networking", "programs", "users"];
    let leaves = ["enable", "package", "extraConfig", "settings.<name>", "port"];
    (0..n)
        .map(|i| {
            let title = format!("{}.mod{}.{}", roots[i % roots.len()], i, leaves[i % leaves.len()]);
            let description = format!("Configure module {} for the {} subsystem; see manual section {}.", i, roots[i % roots.len()], i % 7);
            rec(&title, &description)
        })
        .collect()
}

fn build(records: Vec<Record>) -> Index {
    let ds = Dataset { key: "system".into(), title: "NixOS".into(), path: "system.json".into() };
    Index::build(Arc::new(RecordSet::new(1, ds, records)), &SearchConfig { build_batch: 16, ..SearchConfig::default() })
}

#[test]
fn empty_query_returns_min_of_len_and_window_in_order() {
    for n in [1usize, 3, 40, 300] {
        let idx = build(corpus(n));
        for window in [1usize, 2, 39, 250, 1000] {
            let res = search(&idx, "", FieldSet::ALL, window);
            assert_eq!(res.len(), n.min(window), "n={n} window={window}");
            for (i, r) in res.records.iter().enumerate() {
                assert_eq!(r.title, idx.records().records[i].title);
            }
            assert_eq!(res.truncated, n >= window);
        }
    }
}

#[test]
fn no_field_enabled_is_always_empty() {
    let idx = build(corpus(50));
    for q in ["", "services", "mod1", "zzz", "."] {
        assert!(search(&idx, q, FieldSet::NONE, 250).is_empty(), "query {q:?}");
    }
}

#[test]
fn every_title_substring_matches_its_record() {
    let records = corpus(30);
    let idx = build(records.clone());
    for (id, r) in records.iter().enumerate() {
        let chars: Vec<char> = r.title.chars().collect();
        for start in 0..chars.len() {
            for end in (start + 1)..=chars.len().min(start + 8) {
                let q: String = chars[start..end].iter().collect();
                if Tokenizer::Title.tokens(&q).is_empty() { continue; }
                let res = search(&idx, &q, TITLE_ONLY, usize::MAX);
                assert!(
                    res.records.iter().any(|m| m.title == r.title),
                    "substring {q:?} of record {id} ({}) did not match",
                    r.title
                );
            }
        }
    }
}

#[test]
fn description_prefixes_match_and_inner_suffixes_do_not() {
    let idx = build(vec![
        rec("a.one", "Enable the compositor"),
        rec("a.two", "Unrelated wording"),
    ]);
    for p in ["c", "co", "comp", "composit", "compositor"] {
        let res = search(&idx, p, DESCR_ONLY, 250);
        assert!(res.titles().any(|t| t == "a.one"), "prefix {p:?}");
    }
    for s in ["ositor", "itor", "mpositor"] {
        assert!(search(&idx, s, DESCR_ONLY, 250).is_empty(), "suffix {s:?}");
    }
}

#[test]
fn nginx_scenario() {
    let idx = build(vec![
        rec("services.nginx.enable", ""),
        rec("services.nginx.package", ""),
        rec("users.extraGroups", ""),
    ]);
    let res = search(&idx, "nginx", TITLE_ONLY, 250);
    assert_eq!(res.titles().collect::<Vec<_>>(), vec!["services.nginx.enable", "services.nginx.package"]);
    assert!(!res.truncated);
}

#[test]
fn merged_results_never_repeat() {
    let idx = build(corpus(200));
    for q in ["services", "mod1", "enable", "config", "s"] {
        let res = search(&idx, q, FieldSet::ALL, 1000);
        let mut titles: Vec<&str> = res.titles().collect();
        let before = titles.len();
        titles.sort_unstable();
        titles.dedup();
        assert_eq!(titles.len(), before, "duplicates for {q:?}");
    }
}

#[test]
fn lookups_agree_with_linear_scan() {
    let records = corpus(120);
    let idx = build(records.clone());
    for q in ["mod1", "ing.mo", "<name>", "port", "d.e"] {
        let expected: Vec<u32> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.title.to_lowercase().contains(q))
            .map(|(i, _)| i as u32)
            .collect();
        assert_eq!(idx.lookup(Field::Title, q), expected, "query {q:?}");
    }
}
