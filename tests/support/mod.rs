//! Shared fixtures for the integration tests: a canned HTTP transport and
//! a tiny PNG tile generator.

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tileview::{FetchError, TileTransport, TransportResponse};

/// Canned transport: per-URL responses with a default fallback, an
/// optional artificial delay, and a request counter.
pub struct MockTransport {
    default: (u16, Vec<u8>),
    responses: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    delay: Duration,
    requests: AtomicUsize,
}

impl MockTransport {
    pub fn new(default_status: u16, default_body: Vec<u8>) -> Self {
        Self {
            default: (default_status, default_body),
            responses: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_response(&self, url: impl Into<String>, status: u16, body: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.into(), (status, body));
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        Ok(TransportResponse { status, body })
    }
}

/// Encodes a square single-color PNG tile
pub fn png_tile(size: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        size,
        size,
        image::Rgba([90, 120, 180, 255]),
    ));
    let mut cursor = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, image::ImageOutputFormat::Png)
        .unwrap();
    cursor.into_inner()
}
