//! Bulk tile prefetching: walks a bounding box at a fixed zoom and fills
//! the disk cache ahead of interactive use. A batch path, independent of
//! the viewport controller.

use crate::core::geo::{self, LatLng, LatLngBounds, TileCoord};
use crate::tiles::fetch::FetchError;
use crate::tiles::source::TileSource;
use crate::tiles::store::TileStore;
use crate::tiles::transport::TileTransport;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One batch cache-fill job
#[derive(Debug, Clone)]
pub struct PrefetchJob {
    /// Geographic area to cover
    pub bounds: LatLngBounds,
    /// Zoom level to walk
    pub zoom: u8,
    /// Stop after this many successful downloads
    pub target_count: usize,
    /// Concurrent downloads; 0 means one per available CPU
    pub concurrency: usize,
}

/// Aggregate counters for a finished prefetch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchReport {
    pub downloaded: u64,
    pub skipped: u64,
    pub errored: u64,
    pub elapsed: Duration,
}

/// Walks the job's tile set with bounded concurrency, skipping tiles
/// already on disk and storing the rest. Stops cooperatively once the
/// download target is reached: the dispatch loop checks the counter and
/// the cancellation flag, and every worker re-checks both after acquiring
/// its permit, so the overshoot is bounded by the concurrency limit.
pub async fn run(
    job: PrefetchJob,
    source: Arc<dyn TileSource>,
    transport: Arc<dyn TileTransport>,
    store: Arc<TileStore>,
) -> PrefetchReport {
    let started = Instant::now();
    let coords = tile_range(&job.bounds, job.zoom);
    let concurrency = if job.concurrency == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    } else {
        job.concurrency
    };
    log::info!(
        "prefetch: {} candidate tiles at zoom {}, target {}, concurrency {}",
        coords.len(),
        job.zoom,
        job.target_count,
        concurrency
    );

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let cancelled = Arc::new(AtomicBool::new(false));
    let downloaded = Arc::new(AtomicU64::new(0));
    let skipped = Arc::new(AtomicU64::new(0));
    let errored = Arc::new(AtomicU64::new(0));
    let target = job.target_count as u64;

    let mut workers = JoinSet::new();
    for coord in coords {
        if target == 0
            || downloaded.load(Ordering::SeqCst) >= target
            || cancelled.load(Ordering::SeqCst)
        {
            break;
        }
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let url = source.url(coord);
        let transport = Arc::clone(&transport);
        let store = Arc::clone(&store);
        let cancelled = Arc::clone(&cancelled);
        let downloaded = Arc::clone(&downloaded);
        let skipped = Arc::clone(&skipped);
        let errored = Arc::clone(&errored);

        workers.spawn(async move {
            let _permit = permit;
            // Re-check after the permit wait; another worker may have hit
            // the target in the meantime.
            if cancelled.load(Ordering::SeqCst) || downloaded.load(Ordering::SeqCst) >= target {
                return;
            }
            if store.contains(coord) {
                skipped.fetch_add(1, Ordering::SeqCst);
                return;
            }
            match fetch_raw(transport.as_ref(), &url).await {
                Ok(bytes) => {
                    if let Err(err) = store.write_raw(coord, &bytes) {
                        log::warn!("prefetch: failed to store {:?}: {}", coord, err);
                        errored.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                    let total = downloaded.fetch_add(1, Ordering::SeqCst) + 1;
                    if total >= target {
                        cancelled.store(true, Ordering::SeqCst);
                    }
                }
                Err(FetchError::NotFound) => {
                    // Nothing to cache there; not an error.
                    skipped.fetch_add(1, Ordering::SeqCst);
                }
                Err(err) => {
                    log::warn!("prefetch: {:?} failed: {}", coord, err);
                    errored.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
    }
    while workers.join_next().await.is_some() {}

    let report = PrefetchReport {
        downloaded: downloaded.load(Ordering::SeqCst),
        skipped: skipped.load(Ordering::SeqCst),
        errored: errored.load(Ordering::SeqCst),
        elapsed: started.elapsed(),
    };
    log::info!(
        "prefetch done: {} downloaded, {} skipped, {} errored in {:?}",
        report.downloaded,
        report.skipped,
        report.errored,
        report.elapsed
    );
    report
}

async fn fetch_raw(transport: &dyn TileTransport, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = transport.get(url).await?;
    match response.status {
        404 => Err(FetchError::NotFound),
        status if (200..300).contains(&status) => Ok(response.body),
        status => Err(FetchError::Status(status)),
    }
}

/// Rectangular tile set covering `bounds` at `zoom`. The north-west
/// corner maps to the smallest indices; rows outside the pyramid are
/// skipped and columns wrap like everywhere else.
fn tile_range(bounds: &LatLngBounds, zoom: u8) -> Vec<TileCoord> {
    let nw = geo::lat_lng_to_tile(
        &LatLng::new(bounds.north_east.lat, bounds.south_west.lng),
        zoom,
    );
    let se = geo::lat_lng_to_tile(
        &LatLng::new(bounds.south_west.lat, bounds.north_east.lng),
        zoom,
    );
    let min_x = nw.x.floor() as i64;
    let max_x = se.x.floor() as i64;
    let min_y = nw.y.floor() as i64;
    let max_y = se.y.floor() as i64;

    let mut coords = Vec::new();
    for x in min_x..=max_x {
        for y in min_y..=max_y {
            if let Some(coord) = TileCoord::wrapped(zoom, x, y) {
                coords.push(coord);
            }
        }
    }
    coords
}
