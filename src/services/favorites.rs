use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    db::store::{get_json, set_json, KeyValueStore, StoreKey},
    error::AppResult,
    models::{FavoriteRecord, Movie, NewFavorite, User},
    services::providers::CloudFavorites,
};

/// Which favorites set is authoritative
///
/// Exactly one set exists at a time: the guest ids persisted locally, or the
/// signed-in user's cloud records. They are never merged into a third set.
#[derive(Debug, Clone, PartialEq)]
pub enum FavoritesState {
    Guest {
        ids: Vec<String>,
    },
    Authenticated {
        user: User,
        favorites: Vec<FavoriteRecord>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteChange {
    Add(String),
    Remove(String),
}

/// Result of a toggle; the UI may still render optimistically on failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    Failed {
        change: FavoriteChange,
        reason: String,
    },
}

impl ToggleOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, ToggleOutcome::Failed { .. })
    }
}

/// What happened to each guest id during reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Added to the cloud
    pub synced: Vec<String>,
    /// Skipped, the cloud already had them
    pub already_in_cloud: Vec<String>,
    /// Skipped, no metadata in the loaded movie list
    pub dropped: Vec<String>,
    /// The cloud write failed; these favorites are lost
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.synced.is_empty()
            && self.already_in_cloud.is_empty()
            && self.dropped.is_empty()
            && self.failed.is_empty()
    }
}

pub struct FavoritesReconciler {
    local: Arc<dyn KeyValueStore>,
    cloud: Arc<dyn CloudFavorites>,
    state: FavoritesState,
}

impl FavoritesReconciler {
    /// Starts as a guest with the ids persisted locally
    pub async fn load(
        local: Arc<dyn KeyValueStore>,
        cloud: Arc<dyn CloudFavorites>,
    ) -> AppResult<Self> {
        let ids = read_guest_ids(local.as_ref()).await?;
        tracing::debug!(count = ids.len(), "Loaded guest favorites");

        Ok(Self {
            local,
            cloud,
            state: FavoritesState::Guest { ids },
        })
    }

    pub fn state(&self) -> &FavoritesState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            FavoritesState::Authenticated { user, .. } => Some(user),
            FavoritesState::Guest { .. } => None,
        }
    }

    pub fn is_favorite(&self, movie_id: &str) -> bool {
        match &self.state {
            FavoritesState::Guest { ids } => ids.iter().any(|id| id == movie_id),
            FavoritesState::Authenticated { favorites, .. } => {
                favorites.iter().any(|f| f.movie_id == movie_id)
            }
        }
    }

    /// Movie ids of the authoritative set
    pub fn favorite_ids(&self) -> Vec<String> {
        match &self.state {
            FavoritesState::Guest { ids } => ids.clone(),
            FavoritesState::Authenticated { favorites, .. } => {
                favorites.iter().map(|f| f.movie_id.clone()).collect()
            }
        }
    }

    /// Adds or removes `movie` in whichever set is authoritative
    ///
    /// In-memory state changes only when the write went through.
    pub async fn toggle(&mut self, movie: &Movie) -> ToggleOutcome {
        let outcome = match &mut self.state {
            FavoritesState::Guest { ids } => {
                toggle_guest(self.local.as_ref(), ids, &movie.id).await
            }
            FavoritesState::Authenticated { user, favorites } => {
                toggle_cloud(self.cloud.as_ref(), &user.id, favorites, movie).await
            }
        };

        if let ToggleOutcome::Failed { change, reason } = &outcome {
            tracing::warn!(movie_id = %movie.id, change = ?change, reason = %reason, "Favorite write failed");
        }

        outcome
    }

    /// Switches to `user` and pushes pending guest favorites to the cloud
    ///
    /// `loaded` is the currently displayed movie list, used for metadata.
    pub async fn sign_in(&mut self, user: User, loaded: &[Movie]) -> ReconcileReport {
        let listed = self.cloud.list_favorites(&user.id).await;
        if let Err(e) = &listed {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to load cloud favorites");
        }
        let cloud_known = listed.is_ok();
        let favorites = listed.unwrap_or_default();

        tracing::info!(user_id = %user.id, cloud = favorites.len(), "Favorites signed in");

        let previous = std::mem::replace(
            &mut self.state,
            FavoritesState::Authenticated { user, favorites },
        );

        match previous {
            FavoritesState::Guest { ids } if !ids.is_empty() => {
                self.reconcile(ids, loaded, cloud_known).await
            }
            _ => ReconcileReport::default(),
        }
    }

    /// Drops the cloud set and falls back to local favorites
    ///
    /// The cloud set is gone even when reading local storage fails.
    pub async fn sign_out(&mut self) -> AppResult<()> {
        let previous = std::mem::replace(
            &mut self.state,
            FavoritesState::Guest { ids: Vec::new() },
        );
        if let FavoritesState::Authenticated { user, .. } = &previous {
            tracing::info!(user_id = %user.id, "Favorites signed out");
        }

        let ids = read_guest_ids(self.local.as_ref()).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read guest favorites after sign-out");
            e
        })?;
        self.state = FavoritesState::Guest { ids };
        Ok(())
    }

    /// Reloads the cloud set of the signed-in user
    pub async fn refresh(&mut self) -> AppResult<()> {
        if let FavoritesState::Authenticated { user, favorites } = &mut self.state {
            *favorites = self.cloud.list_favorites(&user.id).await?;
        }
        Ok(())
    }

    /// One-shot, at-most-once merge of guest ids into the cloud
    ///
    /// Local ids are cleared before any cloud write, so a failed write loses
    /// that favorite. Without a known cloud set nothing is written.
    async fn reconcile(
        &mut self,
        local_ids: Vec<String>,
        loaded: &[Movie],
        cloud_known: bool,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let mut seen = HashSet::new();
        let local_ids: Vec<String> = local_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let cleared = set_json(
            self.local.as_ref(),
            &StoreKey::GuestFavorites,
            &Vec::<String>::new(),
        )
        .await;
        if let Err(e) = cleared {
            tracing::warn!(error = %e, "Failed to clear guest favorites");
        }

        let FavoritesState::Authenticated { user, favorites } = &mut self.state else {
            return report;
        };

        if !cloud_known {
            tracing::warn!(
                user_id = %user.id,
                count = local_ids.len(),
                "Cloud set unknown, guest favorites not synced"
            );
            report.failed = local_ids;
            return report;
        }

        let mut cloud_ids: HashSet<String> = favorites.iter().map(|f| f.movie_id.clone()).collect();

        for id in local_ids {
            if cloud_ids.contains(&id) {
                report.already_in_cloud.push(id);
                continue;
            }

            let Some(movie) = loaded.iter().find(|m| m.id == id) else {
                tracing::debug!(movie_id = %id, "No metadata for guest favorite, dropping");
                report.dropped.push(id);
                continue;
            };

            match self.cloud.add_favorite(NewFavorite::from_movie(&user.id, movie)).await {
                Ok(record) => {
                    favorites.push(record);
                    cloud_ids.insert(id.clone());
                    report.synced.push(id);
                }
                Err(e) => {
                    tracing::warn!(movie_id = %id, error = %e, "Failed to sync guest favorite");
                    report.failed.push(id);
                }
            }
        }

        tracing::info!(
            user_id = %user.id,
            synced = report.synced.len(),
            already_in_cloud = report.already_in_cloud.len(),
            dropped = report.dropped.len(),
            failed = report.failed.len(),
            "Guest favorites reconciled"
        );

        report
    }
}

async fn read_guest_ids(local: &dyn KeyValueStore) -> AppResult<Vec<String>> {
    match get_json::<Vec<String>>(local, &StoreKey::GuestFavorites).await {
        Ok(ids) => Ok(ids.unwrap_or_default()),
        Err(crate::error::AppError::Serialization(e)) => {
            tracing::warn!(error = %e, "Ignoring unreadable guest favorites");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

async fn toggle_guest(
    local: &dyn KeyValueStore,
    ids: &mut Vec<String>,
    movie_id: &str,
) -> ToggleOutcome {
    let removing = ids.iter().any(|id| id == movie_id);
    let next: Vec<String> = if removing {
        ids.iter().filter(|id| *id != movie_id).cloned().collect()
    } else {
        ids.iter().cloned().chain(std::iter::once(movie_id.to_string())).collect()
    };

    let change = if removing {
        FavoriteChange::Remove(movie_id.to_string())
    } else {
        FavoriteChange::Add(movie_id.to_string())
    };

    match set_json(local, &StoreKey::GuestFavorites, &next).await {
        Ok(()) => {
            *ids = next;
            if removing {
                ToggleOutcome::Removed
            } else {
                ToggleOutcome::Added
            }
        }
        Err(e) => ToggleOutcome::Failed {
            change,
            reason: e.to_string(),
        },
    }
}

async fn toggle_cloud(
    cloud: &dyn CloudFavorites,
    user_id: &str,
    favorites: &mut Vec<FavoriteRecord>,
    movie: &Movie,
) -> ToggleOutcome {
    let existing: Vec<String> = favorites
        .iter()
        .filter(|f| f.movie_id == movie.id)
        .map(|f| f.document_id.clone())
        .collect();

    if existing.is_empty() {
        return match cloud.add_favorite(NewFavorite::from_movie(user_id, movie)).await {
            Ok(record) => {
                favorites.push(record);
                ToggleOutcome::Added
            }
            Err(e) => ToggleOutcome::Failed {
                change: FavoriteChange::Add(movie.id.clone()),
                reason: e.to_string(),
            },
        };
    }

    for document_id in existing {
        if let Err(e) = cloud.remove_favorite(&document_id).await {
            return ToggleOutcome::Failed {
                change: FavoriteChange::Remove(movie.id.clone()),
                reason: e.to_string(),
            };
        }
        favorites.retain(|f| f.document_id != document_id);
    }

    ToggleOutcome::Removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::{MemoryStore, MockKeyValueStore};
    use crate::error::AppError;
    use crate::services::providers::MockCloudFavorites;
    use chrono::Utc;

    fn movie(id: &str) -> Movie {
        Movie {
            id: id.to_string(),
            title: format!("Title {}", id),
            poster_url: Some(format!("https://cdn.test/{}.jpg", id)),
            rating: Some("PG-13".to_string()),
            ..Default::default()
        }
    }

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            email: "viewer@example.com".to_string(),
            name: None,
        }
    }

    fn record(movie_id: &str) -> FavoriteRecord {
        FavoriteRecord {
            document_id: format!("doc-{}", movie_id),
            user_id: "user-1".to_string(),
            movie_id: movie_id.to_string(),
            title: format!("Title {}", movie_id),
            poster_url: None,
            rating: None,
            created_at: Utc::now(),
        }
    }

    fn record_from(favorite: &NewFavorite) -> FavoriteRecord {
        FavoriteRecord {
            document_id: format!("doc-{}", favorite.movie_id),
            user_id: favorite.user_id.clone(),
            movie_id: favorite.movie_id.clone(),
            title: favorite.title.clone(),
            poster_url: favorite.poster_url.clone(),
            rating: favorite.rating.clone(),
            created_at: favorite.created_at,
        }
    }

    async fn store_with(ids: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        set_json(store.as_ref(), &StoreKey::GuestFavorites, &ids)
            .await
            .unwrap();
        store
    }

    async fn persisted(store: &MemoryStore) -> Vec<String> {
        get_json(store, &StoreKey::GuestFavorites)
            .await
            .unwrap()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_guest_toggle_twice_restores_state() {
        let store = store_with(&["b"]).await;
        let mut favorites =
            FavoritesReconciler::load(store.clone(), Arc::new(MockCloudFavorites::new()))
                .await
                .unwrap();

        assert_eq!(favorites.toggle(&movie("a")).await, ToggleOutcome::Added);
        assert!(favorites.is_favorite("a"));
        assert_eq!(persisted(&store).await, vec!["b", "a"]);

        assert_eq!(favorites.toggle(&movie("a")).await, ToggleOutcome::Removed);
        assert!(!favorites.is_favorite("a"));
        assert_eq!(persisted(&store).await, vec!["b"]);
        assert_eq!(favorites.favorite_ids(), persisted(&store).await);
    }

    #[tokio::test]
    async fn test_guest_toggle_failed_persist_leaves_state() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_set()
            .returning(|_, _| Err(AppError::Internal("disk full".to_string())));

        let mut favorites =
            FavoritesReconciler::load(Arc::new(store), Arc::new(MockCloudFavorites::new()))
                .await
                .unwrap();

        let outcome = favorites.toggle(&movie("a")).await;
        assert!(!outcome.is_applied());
        assert_eq!(
            outcome,
            ToggleOutcome::Failed {
                change: FavoriteChange::Add("a".to_string()),
                reason: "Internal error: disk full".to_string(),
            }
        );
        assert!(!favorites.is_favorite("a"));
    }

    #[tokio::test]
    async fn test_corrupt_guest_favorites_start_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&StoreKey::GuestFavorites, "{oops".to_string())
            .await
            .unwrap();

        let favorites = FavoritesReconciler::load(store, Arc::new(MockCloudFavorites::new()))
            .await
            .unwrap();
        assert!(favorites.favorite_ids().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_skips_ids_already_in_cloud() {
        let store = store_with(&["A", "B"]).await;
        let mut cloud = MockCloudFavorites::new();
        cloud
            .expect_list_favorites()
            .times(1)
            .returning(|_| Ok(vec![record("B")]));
        cloud
            .expect_add_favorite()
            .withf(|f| f.movie_id == "A" && f.user_id == "user-1" && f.title == "Title A")
            .times(1)
            .returning(|f| Ok(record_from(&f)));

        let mut favorites = FavoritesReconciler::load(store.clone(), Arc::new(cloud))
            .await
            .unwrap();
        let report = favorites.sign_in(user(), &[movie("A"), movie("B")]).await;

        assert_eq!(report.synced, vec!["A"]);
        assert_eq!(report.already_in_cloud, vec!["B"]);
        assert!(report.failed.is_empty());

        let mut ids = favorites.favorite_ids();
        ids.sort();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(persisted(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_failure_still_clears_local() {
        let store = store_with(&["A", "B"]).await;
        let mut cloud = MockCloudFavorites::new();
        cloud
            .expect_list_favorites()
            .returning(|_| Ok(vec![record("B")]));
        cloud
            .expect_add_favorite()
            .times(1)
            .returning(|_| Err(AppError::ExternalApi("503".to_string())));

        let mut favorites = FavoritesReconciler::load(store.clone(), Arc::new(cloud))
            .await
            .unwrap();
        let report = favorites.sign_in(user(), &[movie("A")]).await;

        assert_eq!(report.failed, vec!["A"]);
        assert!(persisted(&store).await.is_empty());
        assert!(!favorites.is_favorite("A"));
        assert!(favorites.is_favorite("B"));
    }

    #[tokio::test]
    async fn test_reconcile_drops_ids_without_metadata() {
        let store = store_with(&["gone"]).await;
        let mut cloud = MockCloudFavorites::new();
        cloud.expect_list_favorites().returning(|_| Ok(Vec::new()));
        cloud.expect_add_favorite().never();

        let mut favorites = FavoritesReconciler::load(store.clone(), Arc::new(cloud))
            .await
            .unwrap();
        let report = favorites.sign_in(user(), &[movie("other")]).await;

        assert_eq!(report.dropped, vec!["gone"]);
        assert!(favorites.favorite_ids().is_empty());
        assert!(persisted(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_without_guest_favorites_skips_reconcile() {
        let store = Arc::new(MemoryStore::new());
        let mut cloud = MockCloudFavorites::new();
        cloud
            .expect_list_favorites()
            .returning(|_| Ok(vec![record("X")]));
        cloud.expect_add_favorite().never();

        let mut favorites = FavoritesReconciler::load(store, Arc::new(cloud))
            .await
            .unwrap();
        let report = favorites.sign_in(user(), &[]).await;

        assert!(report.is_empty());
        assert!(favorites.is_favorite("X"));
        assert_eq!(favorites.user().map(|u| u.id.as_str()), Some("user-1"));
    }

    #[tokio::test]
    async fn test_authenticated_toggle_uses_cloud() {
        let store = Arc::new(MemoryStore::new());
        let mut cloud = MockCloudFavorites::new();
        cloud.expect_list_favorites().returning(|_| Ok(Vec::new()));
        cloud
            .expect_add_favorite()
            .times(1)
            .returning(|f| Ok(record_from(&f)));
        cloud
            .expect_remove_favorite()
            .withf(|document_id| document_id.to_string() == "doc-m1")
            .times(1)
            .returning(|_| Ok(()));

        let mut favorites = FavoritesReconciler::load(store.clone(), Arc::new(cloud))
            .await
            .unwrap();
        favorites.sign_in(user(), &[]).await;

        assert_eq!(favorites.toggle(&movie("m1")).await, ToggleOutcome::Added);
        assert!(favorites.is_favorite("m1"));
        // Cloud writes never touch local storage
        assert!(persisted(&store).await.is_empty());

        assert_eq!(favorites.toggle(&movie("m1")).await, ToggleOutcome::Removed);
        assert!(!favorites.is_favorite("m1"));
    }

    #[tokio::test]
    async fn test_authenticated_remove_failure_keeps_favorite() {
        let mut cloud = MockCloudFavorites::new();
        cloud
            .expect_list_favorites()
            .returning(|_| Ok(vec![record("m1")]));
        cloud
            .expect_remove_favorite()
            .returning(|_| Err(AppError::ExternalApi("timeout".to_string())));

        let mut favorites =
            FavoritesReconciler::load(Arc::new(MemoryStore::new()), Arc::new(cloud))
                .await
                .unwrap();
        favorites.sign_in(user(), &[]).await;

        let outcome = favorites.toggle(&movie("m1")).await;
        assert!(matches!(
            outcome,
            ToggleOutcome::Failed {
                change: FavoriteChange::Remove(_),
                ..
            }
        ));
        assert!(favorites.is_favorite("m1"));
    }

    #[tokio::test]
    async fn test_sign_out_returns_to_local_set() {
        let store = Arc::new(MemoryStore::new());
        let mut cloud = MockCloudFavorites::new();
        cloud
            .expect_list_favorites()
            .returning(|_| Ok(vec![record("cloud-only")]));

        let mut favorites = FavoritesReconciler::load(store.clone(), Arc::new(cloud))
            .await
            .unwrap();
        favorites.sign_in(user(), &[]).await;
        assert!(favorites.is_favorite("cloud-only"));

        favorites.sign_out().await.unwrap();
        assert!(matches!(favorites.state(), FavoritesState::Guest { .. }));
        assert!(!favorites.is_favorite("cloud-only"));

        favorites.toggle(&movie("local")).await;
        assert_eq!(persisted(&store).await, vec!["local"]);
    }

    #[tokio::test]
    async fn test_cloud_list_failure_writes_nothing() {
        let store = store_with(&["B", "A"]).await;
        let mut cloud = MockCloudFavorites::new();
        cloud
            .expect_list_favorites()
            .times(1)
            .returning(|_| Err(AppError::ExternalApi("503".to_string())));
        cloud.expect_add_favorite().never();

        let mut favorites = FavoritesReconciler::load(store.clone(), Arc::new(cloud))
            .await
            .unwrap();
        let report = favorites.sign_in(user(), &[movie("A"), movie("B")]).await;

        assert!(report.synced.is_empty());
        assert_eq!(report.failed, vec!["B", "A"]);
        assert!(persisted(&store).await.is_empty());
        assert_eq!(favorites.user().map(|u| u.id.as_str()), Some("user-1"));
        assert!(favorites.favorite_ids().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_syncs_repeated_local_id_once() {
        let store = store_with(&["A", "A"]).await;
        let mut cloud = MockCloudFavorites::new();
        cloud.expect_list_favorites().returning(|_| Ok(Vec::new()));
        cloud
            .expect_add_favorite()
            .times(1)
            .returning(|f| Ok(record_from(&f)));

        let mut favorites = FavoritesReconciler::load(store, Arc::new(cloud))
            .await
            .unwrap();
        let report = favorites.sign_in(user(), &[movie("A")]).await;

        assert_eq!(report.synced, vec!["A"]);
        assert!(report.already_in_cloud.is_empty());
        assert_eq!(favorites.favorite_ids(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_sign_out_leaves_cloud_set_when_store_fails() {
        let reads = std::sync::atomic::AtomicUsize::new(0);
        let mut store = MockKeyValueStore::new();
        store.expect_get().returning(move |_| {
            if reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Ok(None)
            } else {
                Err(AppError::Internal("store offline".to_string()))
            }
        });
        let mut cloud = MockCloudFavorites::new();
        cloud
            .expect_list_favorites()
            .returning(|_| Ok(vec![record("cloud-only")]));

        let mut favorites = FavoritesReconciler::load(Arc::new(store), Arc::new(cloud))
            .await
            .unwrap();
        favorites.sign_in(user(), &[]).await;
        assert!(favorites.user().is_some());

        tokio_test::assert_err!(favorites.sign_out().await);
        assert_eq!(favorites.user(), None);
        assert_eq!(favorites.state(), &FavoritesState::Guest { ids: Vec::new() });
        assert!(!favorites.is_favorite("cloud-only"));
    }
}
