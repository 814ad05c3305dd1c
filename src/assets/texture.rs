use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tracing::debug;

use super::fetcher::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Texture not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Texture backend error: {0}")]
    Backend(String),
}

/// Backend-side texture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// A cached texture as seen by callers
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub id: TextureId,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub premultiplied: bool,
}

/// RGBA8 pixels ready for upload
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub premultiplied: bool,
}

impl DecodedImage {
    pub fn decode(bytes: &[u8], premultiply: bool) -> Result<Self, TextureError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        let mut rgba = image.into_raw();
        if premultiply {
            premultiply_alpha(&mut rgba);
        }
        Ok(Self {
            width,
            height,
            rgba,
            premultiplied: premultiply,
        })
    }
}

/// Scale each colour channel by its pixel's alpha
pub fn premultiply_alpha(rgba: &mut [u8]) {
    for pixel in rgba.chunks_exact_mut(4) {
        let alpha = pixel[3] as u32;
        for channel in &mut pixel[..3] {
            *channel = ((*channel as u32 * alpha + 127) / 255) as u8;
        }
    }
}

/// The rendering backend's texture store
pub trait TextureBackend: Send + Sync {
    fn create_texture(&self, image: &DecodedImage) -> Result<TextureId, TextureError>;

    /// Replace the pixels of an existing texture
    fn upload(&self, id: TextureId, image: &DecodedImage) -> Result<(), TextureError>;

    fn delete_texture(&self, id: TextureId);
}

/// Backend that only hands out ids and tracks which are alive
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: AtomicU32,
    live: Mutex<HashSet<TextureId>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of textures allocated and not yet deleted
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    /// Number of textures ever allocated
    pub fn allocated_count(&self) -> u32 {
        self.next_id.load(Ordering::SeqCst)
    }
}

impl TextureBackend for HeadlessBackend {
    fn create_texture(&self, image: &DecodedImage) -> Result<TextureId, TextureError> {
        let id = TextureId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.live
            .lock()
            .map_err(|e| TextureError::Backend(e.to_string()))?
            .insert(id);
        debug!("Created texture {:?} ({}x{})", id, image.width, image.height);
        Ok(id)
    }

    fn upload(&self, id: TextureId, image: &DecodedImage) -> Result<(), TextureError> {
        let live = self.live.lock().map_err(|e| TextureError::Backend(e.to_string()))?;
        if !live.contains(&id) {
            return Err(TextureError::Backend(format!("texture {:?} does not exist", id)));
        }
        debug!("Uploaded {}x{} into texture {:?}", image.width, image.height, id);
        Ok(())
    }

    fn delete_texture(&self, id: TextureId) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(&id);
        }
    }
}
