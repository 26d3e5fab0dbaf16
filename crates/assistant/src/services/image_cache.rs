//! Short-lived store for reply images.
//!
//! LINE fetches image messages by URL, so reply images are kept here under a
//! random ID until they expire.

use std::time::Duration;

use axum::body::Bytes;
use moka::future::Cache;
use uuid::Uuid;

const MAX_IMAGES: u64 = 1_000;

/// Cache of JPEG bytes keyed by UUID.
#[derive(Clone)]
pub struct ImageCache {
    images: Cache<Uuid, Bytes>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("images", &self.images.entry_count())
            .finish()
    }
}

impl ImageCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let images = Cache::builder()
            .max_capacity(MAX_IMAGES)
            .time_to_live(ttl)
            .build();
        Self { images }
    }

    /// Store `bytes` and return the ID to serve them under.
    pub async fn insert(&self, bytes: Vec<u8>) -> Uuid {
        let id = Uuid::new_v4();
        self.images.insert(id, Bytes::from(bytes)).await;
        id
    }

    /// Look up a stored image.
    pub async fn get(&self, id: &Uuid) -> Option<Bytes> {
        self.images.get(id).await
    }
}
