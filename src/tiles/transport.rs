use crate::core::config::TileServerConfig;
use crate::tiles::fetch::FetchError;
use async_trait::async_trait;

/// Raw tile-server response before classification
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// HTTP seam used by the fetch dispatcher and the bulk prefetcher.
/// Implementations must be safe to share across concurrent fetch tasks.
#[async_trait]
pub trait TileTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, FetchError>;
}

/// reqwest-backed transport. The client is built once per component with
/// the configured User-Agent and request timeout so that tile servers
/// don't reject anonymous traffic and stalled requests stay bounded.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(server: &TileServerConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(server.user_agent.clone())
            .timeout(server.fetch_timeout())
            .pool_max_idle_per_host(16)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TileTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .to_vec();
        Ok(TransportResponse { status, body })
    }
}
