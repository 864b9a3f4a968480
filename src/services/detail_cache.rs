use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::Movie;

/// Write-once memo of hydrated movies, keyed by movie id
///
/// Entries are never evicted or refreshed: movie metadata is treated as
/// immutable for the lifetime of a browsing session. Cloning the handle
/// shares the underlying map.
#[derive(Clone, Default)]
pub struct DetailCache {
    entries: Arc<RwLock<HashMap<String, Movie>>>,
}

impl DetailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Movie> {
        self.entries.read().await.get(id).cloned()
    }

    /// Stores `movie` unless an entry for `id` already exists
    pub async fn put(&self, id: String, movie: Movie) {
        self.entries.write().await.entry(id).or_insert(movie);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every entry; intended for test isolation
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
