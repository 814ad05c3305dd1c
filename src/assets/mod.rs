//! Resource access: byte fetching, texture decoding and the texture cache

pub mod fetcher;
pub mod texture;
pub mod cache;

pub use fetcher::{fetch_bytes, FetchError, FetchResponse, FileFetcher, HttpFetcher, ResourceFetcher};
pub use texture::{DecodedImage, HeadlessBackend, TextureBackend, TextureError, TextureId, TextureInfo};
pub use cache::{CacheStats, TextureCache, TextureKey};
