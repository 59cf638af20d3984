use crate::core::geo::TileCoord;
use crate::tiles::source::TileSource;
use crate::tiles::store::TileStore;
use crate::tiles::transport::TileTransport;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use futures::FutureExt;
use fxhash::FxHashSet;
use image::{DynamicImage, GenericImageView};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Why a fetch produced no tile. Carried as data inside a
/// [`FetchOutcome`]; failures never cross the task boundary as panics.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The server has no tile at this coordinate. Not an error condition:
    /// never logged as one, never retried, never cached.
    #[error("tile not found (404)")]
    NotFound,

    #[error("http status {0}")]
    Status(u16),

    #[error("transport: {0}")]
    Transport(String),

    #[error("decode: {0}")]
    Decode(String),

    #[error("decoded image has zero area")]
    EmptyImage,

    /// The fetch task hit an unexpected fault, contained to this tile
    #[error("fetch task failed")]
    TaskFailed,
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }
}

/// Result of one dispatched fetch. Produced exactly once per dispatch and
/// consumed exactly once by the viewport merge loop.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub coord: TileCoord,
    pub result: Result<Arc<DynamicImage>, FetchError>,
}

/// Shared bookkeeping of tiles currently being fetched, used purely for
/// deduplication. An entry is added before dispatch and removed exactly
/// once: when its outcome is consumed, on a failed handover, or on
/// cancellation.
#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    set: Arc<RwLock<FxHashSet<TileCoord>>>,
}

impl InFlightSet {
    /// Marks `coord` as in flight. Returns false if it already was, in
    /// which case the caller must not start another fetch.
    pub fn try_begin(&self, coord: TileCoord) -> bool {
        self.set
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(coord)
    }

    /// Releases the marker so the tile can be fetched again later
    pub fn clear(&self, coord: TileCoord) {
        self.set
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&coord);
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        self.set
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&coord)
    }

    pub fn len(&self) -> usize {
        self.set.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Issues deduplicated, cancellable tile fetches and funnels every
/// outcome into one bounded result channel.
///
/// Each fetch runs as an independent tokio task; the in-flight set
/// guarantees at most one outstanding fetch per coordinate, which is the
/// only concurrency bound the interactive path needs.
pub struct FetchDispatcher {
    source: Arc<dyn TileSource>,
    transport: Arc<dyn TileTransport>,
    store: Arc<TileStore>,
    in_flight: InFlightSet,
    runtime: tokio::runtime::Handle,
    result_tx: Sender<FetchOutcome>,
    result_rx: Receiver<FetchOutcome>,
    stop_tx: Option<Sender<()>>,
    stop_rx: Receiver<()>,
    send_timeout: Duration,
}

impl FetchDispatcher {
    /// Creates a dispatcher. Must be called from within a tokio runtime;
    /// the runtime handle is captured so fetches can be dispatched from
    /// any thread afterwards.
    pub fn new(
        source: Arc<dyn TileSource>,
        transport: Arc<dyn TileTransport>,
        store: Arc<TileStore>,
        result_buffer: usize,
        send_timeout: Duration,
    ) -> Self {
        let runtime = tokio::runtime::Handle::try_current()
            .expect("FetchDispatcher must be created inside a tokio runtime");
        let (result_tx, result_rx) = crossbeam_channel::bounded(result_buffer.max(1));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        Self {
            source,
            transport,
            store,
            in_flight: InFlightSet::default(),
            runtime,
            result_tx,
            result_rx,
            stop_tx: Some(stop_tx),
            stop_rx,
            send_timeout,
        }
    }

    /// Starts a fetch for `coord` unless one is already outstanding.
    /// Returns whether a new fetch was dispatched.
    pub fn dispatch(&self, coord: TileCoord) -> bool {
        if !self.in_flight.try_begin(coord) {
            return false;
        }
        let task = FetchTask {
            coord,
            url: self.source.url(coord),
            transport: Arc::clone(&self.transport),
            store: Arc::clone(&self.store),
            in_flight: self.in_flight.clone(),
            result_tx: self.result_tx.clone(),
            stop_rx: self.stop_rx.clone(),
            send_timeout: self.send_timeout,
        };
        self.runtime.spawn(task.run());
        true
    }

    /// Drains completed outcomes, releasing each tile's in-flight marker.
    /// Non-blocking; intended to be called from the single merge loop.
    pub fn drain(&self) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.result_rx.try_recv() {
            self.in_flight.clear(outcome.coord);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Whether outcomes are waiting to be drained
    pub fn has_pending_results(&self) -> bool {
        !self.result_rx.is_empty()
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    /// Closes the stop channel. Pending fetches and handovers observe it
    /// and release their in-flight markers instead of blocking.
    pub fn shutdown(&mut self) {
        self.stop_tx = None;
    }
}

struct FetchTask {
    coord: TileCoord,
    url: String,
    transport: Arc<dyn TileTransport>,
    store: Arc<TileStore>,
    in_flight: InFlightSet,
    result_tx: Sender<FetchOutcome>,
    stop_rx: Receiver<()>,
    send_timeout: Duration,
}

impl FetchTask {
    async fn run(self) {
        let coord = self.coord;
        let result = AssertUnwindSafe(fetch_and_cache(
            self.transport.as_ref(),
            &self.store,
            &self.url,
            coord,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            log::error!("fetch task for {:?} panicked: {}", coord, panic_message(&*payload));
            Err(FetchError::TaskFailed)
        });

        deliver(
            FetchOutcome { coord, result },
            self.result_tx,
            self.stop_rx,
            self.in_flight,
            self.send_timeout,
        )
        .await;
    }
}

/// One complete fetch: GET, classify, decode, write through to disk.
async fn fetch_and_cache(
    transport: &dyn TileTransport,
    store: &TileStore,
    url: &str,
    coord: TileCoord,
) -> Result<Arc<DynamicImage>, FetchError> {
    log::debug!("fetch tile {:?} from {}", coord, url);
    let response = transport.get(url).await?;
    match response.status {
        404 => return Err(FetchError::NotFound),
        status if !(200..300).contains(&status) => return Err(FetchError::Status(status)),
        _ => {}
    }

    let image =
        image::load_from_memory(&response.body).map_err(|e| FetchError::Decode(e.to_string()))?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(FetchError::EmptyImage);
    }

    // Best effort: a failed cache write must not fail the fetch.
    if store.is_enabled() {
        if let Err(err) = store.write(coord, &image) {
            log::warn!("failed to cache tile {:?}: {}", coord, err);
        }
    }

    Ok(Arc::new(image))
}

/// Hands the outcome to the consumer. If the channel stays full past the
/// send timeout, or the consumer is gone, the outcome is dropped and the
/// in-flight marker cleared so the tile can be retried later.
async fn deliver(
    outcome: FetchOutcome,
    result_tx: Sender<FetchOutcome>,
    stop_rx: Receiver<()>,
    in_flight: InFlightSet,
    send_timeout: Duration,
) {
    let coord = outcome.coord;
    match result_tx.try_send(outcome) {
        // The marker stays set until the consumer drains this outcome.
        Ok(()) => {}
        Err(TrySendError::Disconnected(_)) => {
            log::debug!("result channel closed, dropping outcome for {:?}", coord);
            in_flight.clear(coord);
        }
        Err(TrySendError::Full(outcome)) => {
            // Bounded wait, run off the async executor so a stalled
            // consumer can't tie up a runtime worker.
            let stop = stop_rx.clone();
            let delivered = tokio::task::spawn_blocking(move || {
                crossbeam_channel::select! {
                    send(result_tx, outcome) -> res => res.is_ok(),
                    recv(stop) -> _ => false,
                    default(send_timeout) => false,
                }
            })
            .await
            .unwrap_or(false);
            if !delivered {
                log::debug!("dropping outcome for {:?} (consumer stopped or busy)", coord);
                in_flight.clear(coord);
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("opaque panic payload")
}
