use crate::error::{FetchError, HeatmapError};
use crate::heat_cell::{HeatCell, Snapshot};
use crate::source::{HeatmapQuery, HeatmapSource};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

#[derive(Clone, Debug, PartialEq)]
pub enum FetchState {
    Idle,
    Loading(HeatmapQuery),
    Success(Arc<Snapshot>),
    Failed(String),
}

/// Result of one request, tagged with the generation it was issued under.
#[derive(Debug)]
pub struct FetchOutcome {
    pub generation: u64,
    pub query: HeatmapQuery,
    pub result: Result<Vec<HeatCell>, FetchError>,
}

/// One spawned request: the task calling the source and the supervisor
/// that reports its outcome, including a panic, back to the coordinator.
struct InFlight {
    generation: u64,
    fetch: AbortHandle,
    supervisor: JoinHandle<()>,
}

impl InFlight {
    fn abort(&self) {
        self.fetch.abort();
        self.supervisor.abort();
    }
}

/// Issues heatmap requests and commits only the newest one's result.
///
/// Every `request` bumps the generation; an outcome whose generation is not
/// the latest is dropped, so a slow response for an old (metric, resolution)
/// pair can never overwrite a newer state.
pub struct FetchCoordinator<S: HeatmapSource + 'static> {
    source: Arc<S>,
    state: FetchState,
    generation: u64,
    tasks: Vec<InFlight>,
    tx: mpsc::UnboundedSender<FetchOutcome>,
    rx: mpsc::UnboundedReceiver<FetchOutcome>,
    closed: bool,
}

impl<S: HeatmapSource + 'static> FetchCoordinator<S> {
    pub fn new(source: S) -> Self {
        Self::with_shared(Arc::new(source))
    }

    pub fn with_shared(source: Arc<S>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            state: FetchState::Idle,
            generation: 0,
            tasks: Vec::new(),
            tx,
            rx,
            closed: false,
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, FetchState::Loading(_))
    }

    /// The committed snapshot; `None` while loading, after a failure or when idle.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        match &self.state {
            FetchState::Success(snapshot) => Some(Arc::clone(snapshot)),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FetchState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Starts a request on the tokio runtime and moves to `Loading`.
    /// Returns the generation the result will be matched against.
    pub fn request(&mut self, query: HeatmapQuery) -> u64 {
        let generation = self.begin(query);
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();

        tracing::info!(
            generation,
            metric = %query.metric,
            resolution = u8::from(query.resolution),
            "requesting heatmap"
        );
        let fetch = tokio::spawn(async move { source.fetch(&query).await });
        let abort = fetch.abort_handle();
        let supervisor = tokio::spawn(async move {
            let result = match fetch.await {
                Ok(result) => result,
                Err(err) if err.is_panic() => {
                    tracing::error!(generation, "heatmap request panicked");
                    Err(FetchError::Aborted)
                }
                // cancelled by shutdown
                Err(_) => return,
            };
            // receiver is gone once the coordinator was dropped
            let _ = tx.send(FetchOutcome {
                generation,
                query,
                result,
            });
        });

        self.tasks.retain(|task| !task.supervisor.is_finished());
        tracing::trace!(generation, in_flight = self.tasks.len(), "heatmap request spawned");
        self.tasks.push(InFlight {
            generation,
            fetch: abort,
            supervisor,
        });
        generation
    }

    /// Moves to `Loading` for `query` without spawning anything.
    pub fn begin(&mut self, query: HeatmapQuery) -> u64 {
        self.closed = false;
        self.generation += 1;
        self.state = FetchState::Loading(query);
        self.generation
    }

    /// Commits `outcome` if it belongs to the latest request. Returns whether state changed.
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        if self.closed || outcome.generation != self.generation {
            tracing::debug!(
                generation = outcome.generation,
                latest = self.generation,
                "discarding stale heatmap response"
            );
            return false;
        }

        self.state = match outcome.result {
            Ok(cells) => {
                let snapshot = Snapshot::new(outcome.query.metric, outcome.query.resolution, cells);
                tracing::info!(
                    generation = outcome.generation,
                    cells = snapshot.len(),
                    "heatmap snapshot committed"
                );
                FetchState::Success(Arc::new(snapshot))
            }
            Err(err) => {
                let err = HeatmapError::from(err);
                tracing::warn!(generation = outcome.generation, %err, "heatmap fetch failed");
                FetchState::Failed(err.to_string())
            }
        };
        true
    }

    /// Drains finished requests without waiting. Returns whether state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.rx.try_recv() {
            changed |= self.apply(outcome);
        }
        changed
    }

    /// Waits until the latest request has resolved. Returns whether state changed.
    pub async fn settle(&mut self) -> bool {
        let mut changed = self.poll();
        while self.is_loading() && !self.closed {
            match self.rx.recv().await {
                Some(outcome) => changed |= self.apply(outcome),
                None => break,
            }
        }
        changed
    }

    /// Abandons every in-flight request and returns to `Idle`.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            tracing::debug!(generation = task.generation, "abandoning heatmap request");
            task.abort();
        }
        while self.rx.try_recv().is_ok() {}
        self.closed = true;
        self.state = FetchState::Idle;
    }
}

impl<S: HeatmapSource + 'static> Drop for FetchCoordinator<S> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
