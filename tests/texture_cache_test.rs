mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use live2d_mascot::assets::{HeadlessBackend, TextureCache, TextureError, TextureKey};

fn cache() -> (Arc<MockFetcher>, Arc<HeadlessBackend>, Arc<TextureCache>) {
    let fetcher = MockFetcher::new();
    fetcher.insert("a.png", png(4, 2));
    fetcher.insert("b.png", png(8, 8));
    let backend = Arc::new(HeadlessBackend::new());
    let cache = Arc::new(TextureCache::new(fetcher.clone(), backend.clone()));
    (fetcher, backend, cache)
}

#[tokio::test]
async fn test_same_key_shares_one_allocation() {
    let (_, backend, cache) = cache();

    let first = cache.get("a.png", true).await.unwrap();
    let second = cache.get("a.png", true).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!((first.width, first.height), (4, 2));
    assert_eq!(backend.allocated_count(), 1);

    let stats = cache.stats().await;
    assert_eq!((stats.hits, stats.misses, stats.allocations), (1, 1, 1));
    assert_eq!(stats.hit_ratio(), 50.0);
}

#[tokio::test]
async fn test_concurrent_loads_of_one_key_allocate_once() {
    let (fetcher, backend, cache) = cache();
    fetcher.insert_delayed("slow.png", png(2, 2), Duration::from_millis(20));

    let loads: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("slow.png", true).await.unwrap().id })
        })
        .collect();

    let mut ids = Vec::new();
    for load in loads {
        ids.push(load.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(backend.allocated_count(), 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_alpha_modes_are_separate_entries() {
    let (_, backend, cache) = cache();

    let premultiplied = cache.get("a.png", true).await.unwrap();
    let straight = cache.get("a.png", false).await.unwrap();
    assert_ne!(premultiplied.id, straight.id);
    assert!(premultiplied.premultiplied);
    assert!(!straight.premultiplied);
    assert_eq!(backend.live_count(), 2);

    // Releasing one key leaves the other alpha mode alone
    assert!(cache.release(&TextureKey::new("a.png", false)).await);
    assert_eq!(backend.live_count(), 1);
    assert!(cache.contains("a.png", true).await);

    cache.get("a.png", false).await.unwrap();
    assert_eq!(cache.release_path("a.png").await, 2);
    assert_eq!(backend.live_count(), 0);
    assert!(!cache.contains("a.png", true).await);
}

#[tokio::test]
async fn test_shared_handle_survives_until_last_owner_releases() {
    let (_, backend, cache) = cache();
    let first = cache.get("a.png", true).await.unwrap();
    let second = cache.get("a.png", true).await.unwrap();

    assert!(cache.release_handle(first.id).await);
    assert_eq!(backend.live_count(), 1);
    assert!(cache.contains("a.png", true).await);

    assert!(cache.release_handle(second.id).await);
    assert_eq!(backend.live_count(), 0);
    assert!(!cache.release_handle(second.id).await);
    assert_eq!(cache.stats().await.releases, 1);
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let (_, backend, cache) = cache();
    let texture = cache.get("b.png", true).await.unwrap();

    assert!(cache.release_handle(texture.id).await);
    assert!(!cache.release_handle(texture.id).await);
    assert!(!cache.release(&TextureKey::new("b.png", true)).await);
    assert_eq!(cache.release_path("b.png").await, 0);
    assert_eq!(backend.live_count(), 0);
    assert_eq!(cache.stats().await.releases, 1);

    // A released key loads into a fresh allocation
    let reloaded = cache.get("b.png", true).await.unwrap();
    assert_ne!(reloaded.id, texture.id);
}

#[tokio::test]
async fn test_release_all() {
    let (_, backend, cache) = cache();
    cache.get("a.png", true).await.unwrap();
    cache.get("b.png", true).await.unwrap();
    cache.get("b.png", false).await.unwrap();

    cache.release_all().await;
    assert!(cache.is_empty().await);
    assert_eq!(backend.live_count(), 0);
    assert_eq!(backend.allocated_count(), 3);
}

#[tokio::test]
async fn test_missing_and_broken_textures_are_errors() {
    let (fetcher, backend, cache) = cache();
    fetcher.insert("broken.png", "nope");

    assert!(matches!(
        cache.get("missing.png", true).await,
        Err(TextureError::NotFound(_))
    ));
    assert!(matches!(
        cache.get("broken.png", true).await,
        Err(TextureError::Decode(_))
    ));
    assert_eq!(backend.allocated_count(), 0);
    assert!(cache.is_empty().await);
}
