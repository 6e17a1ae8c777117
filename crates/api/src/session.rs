use msearch_core::{Catalog, Dataset, DatasetLoadError, QueryState, Record, SearchConfig};
use msearch_persist::PersistedState;
use msearch_search::{build_cooperative, search, BuildOutcome, Index, ResultSet};
use msearch_store::{LoadOutcome, LoadTicket, RecordSource, RecordStore};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{Debouncer, Pagination};

const COMMAND_QUEUE: usize = 64;

/// State changes a frontend can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetQuery(String),
    SetTitleSearch(bool),
    SetDescriptionSearch(bool),
    SelectDataset(String),
    LoadMore,
    /// Fetch the selected dataset again, e.g. after a failed load.
    Reload,
}

/// What the presentation layer sees.
#[derive(Debug, Clone)]
pub struct View {
    pub results: ResultSet,
    /// Query the results were evaluated for.
    pub query: QueryState,
    pub window: usize,
    pub truncated: bool,
    /// Selected dataset; during a load the results may still come from the previous one.
    pub dataset: Dataset,
    pub dataset_loading: bool,
    pub index_loading: bool,
    pub load_error: Option<Arc<DatasetLoadError>>,
    /// Completed evaluations so far.
    pub revision: u64,
}

impl View {
    pub fn is_loading(&self) -> bool { self.dataset_loading || self.index_loading }
}

#[derive(Debug, thiserror::Error)]
#[error("session task has stopped")]
pub struct SessionClosed;

pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<View>,
    params_rx: watch::Receiver<PersistedState>,
    store: RecordStore,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, cmd: Command) -> Result<(), SessionClosed> {
        self.cmd_tx.send(cmd).await.map_err(|_| SessionClosed)
    }

    pub fn view(&self) -> View { self.view_rx.borrow().clone() }
    pub fn subscribe(&self) -> watch::Receiver<View> { self.view_rx.clone() }

    pub fn params(&self) -> PersistedState { self.params_rx.borrow().clone() }
    pub fn subscribe_params(&self) -> watch::Receiver<PersistedState> { self.params_rx.clone() }

    pub fn store(&self) -> &RecordStore { &self.store }

    /// Close the command channel and wait for the session task to exit.
    pub async fn shutdown(self) {
        drop(self.cmd_tx);
        let _ = self.task.await;
    }
}

enum Internal {
    Fetched { ticket: LoadTicket, result: Result<Vec<Record>, DatasetLoadError> },
    Built(BuildOutcome),
}

/// Start a session on the dataset named by `seed` (or the catalog default) and
/// begin loading it immediately.
pub fn spawn_session(
    catalog: Arc<Catalog>,
    source: Arc<dyn RecordSource>,
    config: SearchConfig,
    seed: Option<PersistedState>,
) -> SessionHandle {
    let seed = seed.unwrap_or_default();
    let dataset = seed.resolve_dataset(&catalog).clone();
    let query = seed.query_state();
    let pagination = Pagination::new(config.chunk_size);

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(COMMAND_QUEUE);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel::<Internal>();
    let (view_tx, view_rx) = watch::channel(View {
        results: ResultSet::default(),
        query: query.clone(),
        window: pagination.limit(),
        truncated: false,
        dataset: dataset.clone(),
        dataset_loading: false,
        index_loading: false,
        load_error: None,
        revision: 0,
    });
    let (params_tx, params_rx) = watch::channel(PersistedState::new(&query, Some(dataset.key.as_str())));
    let store = RecordStore::new();

    let session = Session {
        catalog,
        source,
        store: store.clone(),
        debouncer: Debouncer::new(config.debounce),
        config,
        evaluated: query.clone(),
        query,
        selected: dataset.clone(),
        pagination,
        index: None,
        results: ResultSet::default(),
        dataset_loading: false,
        index_loading: false,
        load_error: None,
        revision: 0,
        view_tx,
        params_tx,
        internal_tx,
    };
    let task = tokio::spawn(session.run(cmd_rx, internal_rx, dataset));
    SessionHandle { cmd_tx, view_rx, params_rx, store, task }
}

struct Session {
    catalog: Arc<Catalog>,
    source: Arc<dyn RecordSource>,
    store: RecordStore,
    config: SearchConfig,
    query: QueryState,
    selected: Dataset,
    pagination: Pagination,
    debouncer: Debouncer,
    /// Index over the installed record set; `None` while a load or build is in flight.
    index: Option<Arc<Index>>,
    results: ResultSet,
    evaluated: QueryState,
    dataset_loading: bool,
    index_loading: bool,
    load_error: Option<Arc<DatasetLoadError>>,
    revision: u64,
    view_tx: watch::Sender<View>,
    params_tx: watch::Sender<PersistedState>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl Session {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
        initial: Dataset,
    ) {
        info!(dataset = %initial.key, "session started");
        self.start_load(initial);
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                maybe = cmd_rx.recv() => match maybe {
                    Some(cmd) => self.apply(cmd),
                    None => break,
                },
                Some(ev) = internal_rx.recv() => self.on_internal(ev),
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.debouncer.fire(Instant::now()) {
                        self.evaluate();
                    }
                }
            }
        }
        info!("session stopped");
    }

    fn apply(&mut self, cmd: Command) {
        debug!(?cmd, "command");
        match cmd {
            Command::SetQuery(text) => self.query.text = text,
            Command::SetTitleSearch(on) => self.query.fields.title = on,
            Command::SetDescriptionSearch(on) => self.query.fields.description = on,
            Command::LoadMore => self.pagination.increase(),
            Command::SelectDataset(key) => match self.catalog.get(&key) {
                None => warn!(dataset = %key, "ignoring unknown dataset"),
                Some(ds) if ds.key == self.selected.key => debug!(dataset = %key, "dataset already selected"),
                Some(ds) => {
                    let ds = ds.clone();
                    self.selected = ds.clone();
                    self.start_load(ds);
                }
            },
            Command::Reload => self.start_load(self.selected.clone()),
        }
        self.debouncer.touch(Instant::now());
        self.params_tx.send_replace(PersistedState::new(&self.query, Some(self.selected.key.as_str())));
        self.publish();
    }

    fn start_load(&mut self, dataset: Dataset) {
        let ticket = self.store.begin(dataset);
        self.pagination.reset();
        self.index = None;
        self.dataset_loading = true;
        self.index_loading = false;
        self.load_error = None;

        let source = Arc::clone(&self.source);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = source.fetch(&ticket.dataset).await;
            let _ = tx.send(Internal::Fetched { ticket, result });
        });
        self.publish();
    }

    fn on_internal(&mut self, ev: Internal) {
        match ev {
            Internal::Fetched { ticket, result } => self.on_fetched(ticket, result),
            Internal::Built(outcome) => self.on_built(outcome),
        }
    }

    fn on_fetched(&mut self, ticket: LoadTicket, result: Result<Vec<Record>, DatasetLoadError>) {
        if !self.store.is_current(&ticket) {
            debug!(dataset = %ticket.dataset.key, generation = ticket.generation, "discarding superseded fetch");
            return;
        }
        match result {
            Ok(records) => match self.store.commit(ticket, records) {
                LoadOutcome::Installed(set) => {
                    self.dataset_loading = false;
                    self.index_loading = true;
                    let config = self.config.clone();
                    let requested = self.store.subscribe_requested();
                    let tx = self.internal_tx.clone();
                    tokio::spawn(async move {
                        let outcome = build_cooperative(set, &config, requested).await;
                        let _ = tx.send(Internal::Built(outcome));
                    });
                }
                LoadOutcome::Superseded { .. } => return,
            },
            Err(e) => {
                self.store.fail(&ticket, &e);
                self.dataset_loading = false;
                self.index_loading = false;
                self.load_error = Some(Arc::new(e));
            }
        }
        self.publish();
    }

    fn on_built(&mut self, outcome: BuildOutcome) {
        let index = match outcome {
            BuildOutcome::Ready(index) => index,
            BuildOutcome::Stale { generation } => {
                debug!(generation, "discarding stale index build");
                return;
            }
        };
        let generation = index.generation();
        if generation != self.store.requested() || generation != self.store.current().generation {
            debug!(generation, "discarding index for a superseded load");
            return;
        }
        self.index = Some(Arc::new(index));
        self.index_loading = false;
        self.debouncer.touch(Instant::now());
        self.publish();
    }

    /// Recompute results. Suppressed until an index for the current load exists, so
    /// the previous results stay visible meanwhile.
    fn evaluate(&mut self) {
        let Some(index) = self.index.as_ref() else {
            debug!(dataset = %self.selected.key, "evaluation suppressed; no index");
            return;
        };
        self.results = search(index, &self.query.text, self.query.fields, self.pagination.limit());
        self.evaluated = self.query.clone();
        self.revision += 1;
        metrics::counter!("session_evaluations_total", 1u64);
        debug!(
            query = %self.query.text,
            shown = self.results.len(),
            window = self.pagination.limit(),
            revision = self.revision,
            "evaluated"
        );
        self.publish();
    }

    fn publish(&self) {
        self.view_tx.send_replace(View {
            results: self.results.clone(),
            query: self.evaluated.clone(),
            window: self.pagination.limit(),
            truncated: self.results.truncated,
            dataset: self.selected.clone(),
            dataset_loading: self.dataset_loading,
            index_loading: self.index_loading,
            load_error: self.load_error.clone(),
            revision: self.revision,
        });
    }
}
