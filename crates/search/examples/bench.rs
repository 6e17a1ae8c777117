use msearch_core::{Dataset, FieldSet, Record, RecordSet, SearchConfig};
use msearch_search::{search, Index};
use std::sync::Arc;
use std::time::Instant;

fn gen_record(i: usize) -> Record {
    let roots = ["services", "boot", "networking", "programs", "hardware", "users"];
    let leaves = ["enable", "package", "extraConfig", "settings", "port", "<name>.path"];
    let root = roots[i % roots.len()];
    serde_json::from_value(serde_json::json!({
        "title": format!("{root}.module{:05}.{}", i, leaves[i % leaves.len()]),
        "description": format!("Configure module {i} of the {root} tree. Default values follow upstream release {}.", i % 40),
        "type": if i % 2 == 0 { "boolean" } else { "string" },
    }))
    .unwrap()
}

fn percentile_us(xs: &mut [u128], p: f64) -> u128 {
    xs.sort_unstable();
    let idx = ((xs.len() as f64 - 1.0) * p).round() as usize;
    xs[idx]
}

fn main() {
    let n: usize = std::env::var("MSEARCH_BENCH_DOCS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(50_000);
    let window: usize = std::env::var("MSEARCH_BENCH_WINDOW")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(250);

    eprintln!("generating {} records", n);
    let ds = Dataset { key: "bench".into(), title: "Bench".into(), path: "bench.json".into() };
    let set = Arc::new(RecordSet::new(1, ds, (0..n).map(gen_record).collect()));

    let t0 = Instant::now();
    let index = Index::build(set, &SearchConfig::default());
    let build_ms = t0.elapsed().as_secs_f64() * 1_000.0;

    let short: Vec<String> = ["s", "en", "po", "<n"].iter().map(|s| s.to_string()).collect();
    let titles: Vec<String> = (0..n).step_by(n.saturating_div(200).max(1)).map(|i| format!("module{:05}", i)).collect();
    let words: Vec<String> = ["upstream", "conf", "release", "tree module"].iter().map(|s| s.to_string()).collect();

    let run = |label: &str, qs: &[String], fields: FieldSet| {
        let mut times: Vec<u128> = Vec::with_capacity(qs.len());
        for q in qs {
            let t = Instant::now();
            let _ = search(&index, q, fields, window);
            times.push(t.elapsed().as_micros());
        }
        let p50 = percentile_us(&mut times.clone(), 0.50) as f64 / 1000.0;
        let p99 = percentile_us(&mut times, 0.99) as f64 / 1000.0;
        println!("{}: p50={:.3}ms p99={:.3}ms ({} queries, window={})", label, p50, p99, qs.len(), window);
    };

    let stats = index.stats();
    println!(
        "index_build: {:.1}ms docs={} title_terms={} description_terms={}",
        build_ms, stats.indexed, stats.title_terms, stats.description_terms
    );
    run("title_short", &short, FieldSet { title: true, description: false });
    run("title_substring", &titles, FieldSet { title: true, description: false });
    run("description_prefix", &words, FieldSet { title: false, description: true });
    run("merged", &words, FieldSet::ALL);
}
