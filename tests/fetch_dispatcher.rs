mod support;

use std::sync::Arc;
use std::time::Duration;
use support::{png_tile, MockTransport};
use tileview::{
    FetchDispatcher, FetchError, FetchOutcome, TemplateSource, TileCoord, TileServerConfig,
    TileStore,
};

fn dispatcher_with(transport: Arc<MockTransport>, store: Arc<TileStore>) -> FetchDispatcher {
    let source = Arc::new(TemplateSource::new(&TileServerConfig::default()));
    FetchDispatcher::new(source, transport, store, 64, Duration::from_millis(500))
}

/// Polls until at least one outcome arrives
async fn drain_outcomes(dispatcher: &FetchDispatcher) -> Vec<FetchOutcome> {
    for _ in 0..400 {
        let outcomes = dispatcher.drain();
        if !outcomes.is_empty() {
            return outcomes;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no fetch outcome arrived in time");
}

#[tokio::test]
async fn dispatch_is_deduplicated() {
    let transport = Arc::new(
        MockTransport::new(200, png_tile(8)).with_delay(Duration::from_millis(100)),
    );
    let dispatcher = dispatcher_with(Arc::clone(&transport), Arc::new(TileStore::disabled()));
    let coord = TileCoord::new(57, 12, 7);

    assert!(dispatcher.dispatch(coord));
    // Second dispatch before the first completes must be a no-op.
    assert!(!dispatcher.dispatch(coord));
    assert!(dispatcher.in_flight().contains(coord));

    let outcomes = drain_outcomes(&dispatcher).await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].result.is_ok());
    assert_eq!(transport.requests(), 1);
    assert!(dispatcher.in_flight().is_empty());
}

#[tokio::test]
async fn not_found_is_an_outcome_not_a_cache_entry() {
    let transport = Arc::new(MockTransport::new(404, Vec::new()));
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TileStore::open(dir.path()));
    let dispatcher = dispatcher_with(transport, Arc::clone(&store));
    let coord = TileCoord::new(1, 2, 3);

    dispatcher.dispatch(coord);
    let outcomes = drain_outcomes(&dispatcher).await;
    assert!(matches!(
        outcomes[0].result.as_ref().unwrap_err(),
        FetchError::NotFound
    ));
    assert!(!store.contains(coord), "404 must never be cached");
}

#[tokio::test]
async fn server_error_is_classified_by_status() {
    let transport = Arc::new(MockTransport::new(500, Vec::new()));
    let dispatcher = dispatcher_with(transport, Arc::new(TileStore::disabled()));
    dispatcher.dispatch(TileCoord::new(0, 0, 1));

    let outcomes = drain_outcomes(&dispatcher).await;
    assert!(matches!(
        outcomes[0].result.as_ref().unwrap_err(),
        FetchError::Status(500)
    ));
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let transport = Arc::new(MockTransport::new(200, b"not a png".to_vec()));
    let dispatcher = dispatcher_with(transport, Arc::new(TileStore::disabled()));
    dispatcher.dispatch(TileCoord::new(4, 4, 4));

    let outcomes = drain_outcomes(&dispatcher).await;
    assert!(matches!(
        outcomes[0].result.as_ref().unwrap_err(),
        FetchError::Decode(_)
    ));
}

#[tokio::test]
async fn successful_fetch_writes_through_to_disk() {
    let transport = Arc::new(MockTransport::new(200, png_tile(8)));
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TileStore::open(dir.path()));
    let dispatcher = dispatcher_with(transport, Arc::clone(&store));
    let coord = TileCoord::new(57, 12, 7);

    dispatcher.dispatch(coord);
    let outcomes = drain_outcomes(&dispatcher).await;
    assert!(outcomes[0].result.is_ok());
    assert!(store.contains(coord));
    assert!(store.read(coord).is_some());
}

#[tokio::test]
async fn failed_tile_can_be_dispatched_again() {
    let transport = Arc::new(MockTransport::new(500, Vec::new()));
    let dispatcher = dispatcher_with(Arc::clone(&transport), Arc::new(TileStore::disabled()));
    let coord = TileCoord::new(7, 7, 7);

    dispatcher.dispatch(coord);
    drain_outcomes(&dispatcher).await;
    // Draining released the in-flight marker, so a retry goes out.
    assert!(dispatcher.dispatch(coord));
    drain_outcomes(&dispatcher).await;
    assert_eq!(transport.requests(), 2);
}

#[tokio::test]
async fn teardown_with_pending_fetch_is_clean() {
    let transport = Arc::new(
        MockTransport::new(200, png_tile(8)).with_delay(Duration::from_millis(150)),
    );
    let mut dispatcher = dispatcher_with(transport, Arc::new(TileStore::disabled()));
    dispatcher.dispatch(TileCoord::new(9, 9, 9));

    dispatcher.shutdown();
    drop(dispatcher);
    // The in-flight task finishes against a closed channel without
    // panicking the runtime.
    tokio::time::sleep(Duration::from_millis(250)).await;
}
