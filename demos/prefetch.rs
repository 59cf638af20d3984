//! Fills the disk tile cache for a bounding box ahead of interactive use.
//!
//! Usage: `cargo run --example prefetch -- [config.json]`

use std::sync::Arc;
use tileview::prefetch::{self, PrefetchJob};
use tileview::{HttpTransport, LatLngBounds, MapConfig, TemplateSource, TileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => MapConfig::from_json_file(path)?,
        None => MapConfig::default(),
    };

    let cache_dir = config
        .cache_dir
        .clone()
        .unwrap_or_else(|| "cache/tiles".into());
    let store = Arc::new(TileStore::open(cache_dir));
    let source = Arc::new(TemplateSource::new(&config.server));
    let transport = Arc::new(HttpTransport::new(&config.server)?);

    // Southeast Asia at a regional zoom level.
    let job = PrefetchJob {
        bounds: LatLngBounds::from_coords(-11.0, 92.0, 28.0, 141.0),
        zoom: 7,
        target_count: 500,
        concurrency: 8,
    };

    let report = prefetch::run(job, source, transport, store).await;
    println!(
        "downloaded {} / skipped {} / errored {} in {:.1?}",
        report.downloaded, report.skipped, report.errored, report.elapsed
    );
    Ok(())
}
