use crate::core::geo::TileCoord;
use crate::{MapError, Result};
use image::{DynamicImage, GenericImageView};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Serializes the disk-cache write path for the whole process. Tile
/// writes are infrequent relative to fetch latency, so one lock is
/// enough; reads stay lock-free at the filesystem level.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Disk-backed tile store with files at `{root}/{z}/{x}/{y}.png`.
///
/// Writes are atomic (temp file + rename), so readers never observe a
/// partially written entry. Entries that fail to decode are deleted on
/// read, so bad data is never served twice.
pub struct TileStore {
    root: Option<PathBuf>,
}

impl TileStore {
    /// Opens the store, creating the root directory if needed. A root
    /// that cannot be created disables caching for the session instead of
    /// failing: fetches still work, just uncached.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        match fs::create_dir_all(&root) {
            Ok(()) => Self { root: Some(root) },
            Err(err) => {
                log::warn!("cache root {:?} unavailable, caching disabled: {}", root, err);
                Self { root: None }
            }
        }
    }

    /// A store that never caches
    pub fn disabled() -> Self {
        Self { root: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    /// File path for a tile, if caching is enabled
    pub fn tile_path(&self, coord: TileCoord) -> Option<PathBuf> {
        self.root.as_ref().map(|root| {
            root.join(coord.z.to_string())
                .join(coord.x.to_string())
                .join(format!("{}.png", coord.y))
        })
    }

    /// Whether an entry exists for `coord`, without decoding it
    pub fn contains(&self, coord: TileCoord) -> bool {
        self.tile_path(coord).map_or(false, |path| path.exists())
    }

    /// Reads and decodes a cached tile. An entry that fails to decode or
    /// has zero area is treated as corrupt: the file is deleted and the
    /// read comes back as a miss, same as an absent entry.
    pub fn read(&self, coord: TileCoord) -> Option<DynamicImage> {
        let path = self.tile_path(coord)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to read cached tile {:?}: {}", path, err);
                }
                return None;
            }
        };
        match image::load_from_memory(&bytes) {
            Ok(image) if image.dimensions().0 > 0 && image.dimensions().1 > 0 => Some(image),
            Ok(_) => {
                self.discard_corrupt(&path, "zero-area image");
                None
            }
            Err(err) => {
                self.discard_corrupt(&path, &err.to_string());
                None
            }
        }
    }

    fn discard_corrupt(&self, path: &Path, reason: &str) {
        log::warn!("corrupt cache entry {:?} ({}), deleting", path, reason);
        if let Err(err) = fs::remove_file(path) {
            log::warn!("failed to delete corrupt cache entry {:?}: {}", path, err);
        }
    }

    /// Encodes `image` as PNG and atomically installs it at the tile's
    /// path. A crash mid-write leaves only an orphan temp file in the
    /// tile directory, never a partial entry at the final path.
    pub fn write(&self, coord: TileCoord, image: &DynamicImage) -> Result<()> {
        let path = self.tile_path(coord).ok_or(MapError::CacheDisabled)?;
        let _guard = WRITE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let dir = path.parent().expect("tile path always has a parent");
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        image.write_to(tmp.as_file_mut(), image::ImageOutputFormat::Png)?;
        tmp.persist(&path).map_err(|e| MapError::Io(e.error))?;
        Ok(())
    }

    /// Atomically installs already-encoded tile bytes (the prefetch path
    /// stores exactly what the server sent).
    pub fn write_raw(&self, coord: TileCoord, bytes: &[u8]) -> Result<()> {
        let path = self.tile_path(coord).ok_or(MapError::CacheDisabled)?;
        let _guard = WRITE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let dir = path.parent().expect("tile path always has a parent");
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(&path).map_err(|e| MapError::Io(e.error))?;
        Ok(())
    }
}
