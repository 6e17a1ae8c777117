use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use msearch_api::{spawn_session, Command, View};
use msearch_core::{Catalog, Dataset, Record, RecordSet, SearchConfig};
use msearch_persist::{default_state_path, PersistedState};
use msearch_search::{search_with_debug, Index, ResultSet};
use msearch_store::{load_catalog, FsSource, LoadOutcome, RecordStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "msearchctl", version, about = "Search configuration options")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Dataset catalog (meta.json); dataset paths are relative to its directory
    #[arg(long = "catalog", env = "MSEARCH_CATALOG", global = true, default_value = "meta.json")]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List datasets and navigation links from the catalog
    Datasets,
    /// Search one dataset
    Search {
        /// Query text; empty lists every option
        #[arg(default_value = "")]
        query: String,
        /// Dataset key (default: the catalog default, or the one in --link)
        #[arg(long = "set")]
        set: Option<String>,
        /// Skip the title index
        #[arg(long = "no-title", action = ArgAction::SetTrue)]
        no_title: bool,
        /// Skip the description index
        #[arg(long = "no-descr", action = ArgAction::SetTrue)]
        no_descr: bool,
        /// Number of result chunks to show
        #[arg(long = "pages", default_value_t = 1)]
        pages: usize,
        /// Start from a shared link query string, e.g. "query=nginx&set=system&title=true&descr="
        #[arg(long = "link")]
        link: Option<String>,
        /// Print per-field hit counts
        #[arg(long = "explain", action = ArgAction::SetTrue)]
        explain: bool,
    },
    /// Show every field of one option
    Show {
        /// Exact option title, e.g. services.nginx.enable
        title: String,
        #[arg(long = "set")]
        set: Option<String>,
    },
    /// Incremental session: each stdin line replaces the query
    Interactive {
        /// Start from a shared link query string
        #[arg(long = "link")]
        link: Option<String>,
        /// Restore the state saved by the previous interactive session
        #[arg(long = "resume", action = ArgAction::SetTrue)]
        resume: bool,
    },
}

fn init_tracing() {
    let env = std::env::var("MSEARCH_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("MSEARCH_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid MSEARCH_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let config = SearchConfig::from_env();
    let catalog = load_catalog(&cli.catalog).await?;

    match cli.command {
        Commands::Datasets => match cli.output {
            Output::Human => {
                for d in catalog.datasets() {
                    let marker = if d.key == catalog.default_dataset().key { "*" } else { " " };
                    println!("{} {:<12} {:<28} {}", marker, d.key, d.title, d.path);
                }
                for l in catalog.links() {
                    println!("  link: {} <{}>", l.name, l.href);
                }
            }
            Output::Json => {
                #[derive(serde::Serialize)]
                struct Listing<'a> { default: &'a str, datasets: &'a [Dataset], links: &'a [msearch_core::NavLink] }
                let listing = Listing { default: &catalog.default_dataset().key, datasets: catalog.datasets(), links: catalog.links() };
                println!("{}", serde_json::to_string_pretty(&listing)?);
            }
        },
        Commands::Search { query, set, no_title, no_descr, pages, link, explain } => {
            let mut state = link.as_deref().map(PersistedState::from_query_string).unwrap_or_default();
            if !query.is_empty() || link.is_none() {
                state.query = query;
            }
            if no_title { state.title = false; }
            if no_descr { state.description = false; }
            let dataset = match set.as_deref() {
                Some(key) => catalog.get(key).ok_or_else(|| anyhow!("unknown dataset {key}"))?.clone(),
                None => state.resolve_dataset(&catalog).clone(),
            };
            state.dataset = Some(dataset.key.clone());
            info!(dataset = %dataset.key, query = %state.query, "search invoked");

            let records = load_dataset(&cli.catalog, dataset).await?;
            let index = Index::build(records, &config);
            let window = config.chunk_size.saturating_mul(pages.max(1));
            let q = state.query_state();
            let (results, dbg) = search_with_debug(&index, &q.text, q.fields, window);
            let link = state.to_query_string();

            match cli.output {
                Output::Human => {
                    for r in &results.records {
                        println!("{:<56} {}", r.title, r.kind);
                    }
                    println!("{}", counter_label(&results));
                    println!("link: ?{}", link);
                }
                Output::Json => {
                    #[derive(serde::Serialize)]
                    struct Row<'a> { title: &'a str, #[serde(rename = "type")] kind: &'a str, read_only: bool }
                    #[derive(serde::Serialize)]
                    struct Page<'a> {
                        results: Vec<Row<'a>>,
                        shown: usize,
                        truncated: bool,
                        link: &'a str,
                        #[serde(skip_serializing_if = "Option::is_none")]
                        debug: Option<&'a msearch_search::SearchDebugInfo>,
                    }
                    let rows = results.records.iter().map(|r| Row { title: &r.title, kind: &r.kind, read_only: r.read_only }).collect();
                    let page = Page { results: rows, shown: results.len(), truncated: results.truncated, link: &link, debug: explain.then_some(&dbg) };
                    println!("{}", serde_json::to_string_pretty(&page)?);
                }
            }
            if explain && matches!(cli.output, Output::Human) {
                eprintln!("debug: total={} title_hits={} description_hits={} merged={}", dbg.total, dbg.title_hits, dbg.description_hits, dbg.merged);
            }
        }
        Commands::Show { title, set } => {
            let dataset = catalog.resolve(set.as_deref()).clone();
            if let Some(key) = set.as_deref() {
                if key != dataset.key { bail!("unknown dataset {key}"); }
            }
            let records = load_dataset(&cli.catalog, dataset.clone()).await?;
            let Some(record) = records.find_by_title(&title) else {
                bail!("no option named {title} in {}", dataset.key);
            };
            match cli.output {
                Output::Human => print_record(record),
                Output::Json => println!("{}", serde_json::to_string_pretty(&**record)?),
            }
        }
        Commands::Interactive { link, resume } => {
            let state_path = default_state_path();
            let seed = match (link, resume) {
                (Some(raw), _) => PersistedState::from_query_string(&raw),
                (None, true) => PersistedState::load_from(&state_path)?,
                (None, false) => PersistedState::default(),
            };
            interactive(Arc::new(catalog), FsSource::for_catalog(&cli.catalog), config, seed, cli.output, &state_path).await?;
        }
    }

    Ok(())
}

async fn load_dataset(catalog_path: &Path, dataset: Dataset) -> Result<Arc<RecordSet>> {
    let source = FsSource::for_catalog(catalog_path);
    let store = RecordStore::new();
    let key = dataset.key.clone();
    let ticket = store.begin(dataset);
    match store.load(&source, ticket).await.with_context(|| format!("loading dataset {key}"))? {
        LoadOutcome::Installed(set) => Ok(set),
        LoadOutcome::Superseded { generation } => bail!("load of {key} superseded (generation {generation})"),
    }
}

/// "N options", with a `+` when the window is full.
fn counter_label(results: &ResultSet) -> String {
    format!("{}{} options", results.len(), if results.truncated { "+" } else { "" })
}

fn print_record(r: &Record) {
    println!("{}", r.title);
    println!("  type:       {}", if r.kind.is_empty() { "-" } else { r.kind.as_str() });
    println!("  read-only:  {}", if r.read_only { "yes" } else { "no" });
    if let Some(d) = &r.default_value { println!("  default:    {}", d); }
    if let Some(e) = &r.example_value { println!("  example:    {}", e); }
    if !r.description.is_empty() {
        println!();
        for line in r.description.lines() {
            println!("  {}", line);
        }
    }
    if !r.declarations.is_empty() {
        println!();
        println!("  declared in:");
        for d in &r.declarations {
            println!("    {} <{}>", d.name, d.url);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Send(Command),
    Quit,
    Invalid(String),
}

fn parse_flag(arg: &str) -> Option<bool> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// One stdin line. Plain text is the new query; `:` starts a directive.
fn parse_input(line: &str) -> Input {
    let Some(directive) = line.strip_prefix(':') else {
        return Input::Send(Command::SetQuery(line.to_string()));
    };
    let (name, arg) = directive.split_once(' ').unwrap_or((directive, ""));
    let arg = arg.trim();
    let input = match name {
        "title" => parse_flag(arg).map(|on| Input::Send(Command::SetTitleSearch(on))),
        "descr" => parse_flag(arg).map(|on| Input::Send(Command::SetDescriptionSearch(on))),
        "set" if !arg.is_empty() => Some(Input::Send(Command::SelectDataset(arg.to_string()))),
        "more" => Some(Input::Send(Command::LoadMore)),
        "reload" => Some(Input::Send(Command::Reload)),
        "quit" | "q" => Some(Input::Quit),
        _ => None,
    };
    input.unwrap_or_else(|| Input::Invalid(line.to_string()))
}

fn render_view(v: &View, output: Output) {
    if let Some(e) = &v.load_error {
        eprintln!("failed to load {}: {}", v.dataset.key, e);
        return;
    }
    if v.dataset_loading {
        eprintln!("loading {}...", v.dataset.title);
        return;
    }
    if v.index_loading {
        eprintln!("indexing {}...", v.dataset.title);
        return;
    }
    match output {
        Output::Human => {
            for r in &v.results.records {
                println!("{:<56} {}", r.title, r.kind);
            }
            println!("{} [{}]", counter_label(&v.results), v.dataset.key);
        }
        Output::Json => {
            let titles: Vec<&str> = v.results.titles().collect();
            let line = serde_json::json!({
                "dataset": v.dataset.key,
                "query": v.query.text,
                "results": titles,
                "truncated": v.truncated,
                "revision": v.revision,
            });
            println!("{}", line);
        }
    }
}

async fn interactive(
    catalog: Arc<Catalog>,
    source: FsSource,
    config: SearchConfig,
    seed: PersistedState,
    output: Output,
    state_path: &Path,
) -> Result<()> {
    let session = spawn_session(catalog, Arc::new(source), config, Some(seed));

    let mut views = session.subscribe();
    let printer = tokio::spawn(async move {
        let mut last: Option<(u64, bool, bool)> = None;
        while views.changed().await.is_ok() {
            let v = views.borrow_and_update().clone();
            let key = (v.revision, v.is_loading(), v.load_error.is_some());
            if last == Some(key) { continue; }
            last = Some(key);
            render_view(&v, output);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else { break };
                match parse_input(&line) {
                    Input::Send(cmd) => {
                        if session.send(cmd).await.is_err() { break; }
                    }
                    Input::Quit => break,
                    Input::Invalid(raw) => eprintln!("unrecognised input: {raw}"),
                }
            }
            _ = signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    let state = session.params();
    if let Err(e) = state.save_to(state_path) {
        warn!(error = %e, "failed to save session state");
    }
    session.shutdown().await;
    let _ = printer.await;
    if matches!(output, Output::Human) {
        eprintln!("link: ?{}", state.to_query_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_replace_the_query() {
        assert_eq!(parse_input("services.nginx"), Input::Send(Command::SetQuery("services.nginx".into())));
        assert_eq!(parse_input(""), Input::Send(Command::SetQuery(String::new())));
    }

    #[test]
    fn directives_map_to_commands() {
        assert_eq!(parse_input(":title off"), Input::Send(Command::SetTitleSearch(false)));
        assert_eq!(parse_input(":descr on"), Input::Send(Command::SetDescriptionSearch(true)));
        assert_eq!(parse_input(":set home"), Input::Send(Command::SelectDataset("home".into())));
        assert_eq!(parse_input(":more"), Input::Send(Command::LoadMore));
        assert_eq!(parse_input(":reload"), Input::Send(Command::Reload));
        assert_eq!(parse_input(":quit"), Input::Quit);
    }

    #[test]
    fn malformed_directives_are_reported() {
        for bad in [":title maybe", ":set", ":bogus", ":descr"] {
            assert_eq!(parse_input(bad), Input::Invalid(bad.to_string()), "{bad}");
        }
    }

    #[test]
    fn counter_marks_full_window() {
        let r = ResultSet::default();
        assert_eq!(counter_label(&r), "0 options");
        let r = ResultSet { truncated: true, ..ResultSet::default() };
        assert_eq!(counter_label(&r), "0+ options");
    }
}
