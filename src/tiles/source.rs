use crate::core::config::TileServerConfig;
use crate::core::geo::TileCoord;

/// Trait representing anything that can produce tile URLs for a given coordinate.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;
}

/// Tile source driven by a URL template with `{s}`, `{z}`, `{x}` and `{y}`
/// placeholders. The subdomain shard is picked by a deterministic hash of
/// the coordinate, so repeated requests for the same tile land on the same
/// host and connection pool.
pub struct TemplateSource {
    template: String,
    subdomains: Vec<String>,
    api_key: Option<String>,
}

impl TemplateSource {
    pub fn new(server: &TileServerConfig) -> Self {
        Self {
            template: server.url_template.clone(),
            subdomains: server.subdomains.clone(),
            api_key: server.api_key.clone(),
        }
    }

    fn subdomain(&self, coord: TileCoord) -> &str {
        if self.subdomains.is_empty() {
            return "";
        }
        let idx = fxhash::hash64(&coord) as usize % self.subdomains.len();
        &self.subdomains[idx]
    }
}

impl TileSource for TemplateSource {
    fn url(&self, coord: TileCoord) -> String {
        let mut url = self
            .template
            .replace("{s}", self.subdomain(coord))
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string());
        if let Some(key) = &self.api_key {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str("key=");
            url.push_str(key);
        }
        url
    }
}
