use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::Instrument;

use crate::{
    error::{AppError, AppResult},
    models::{ListParams, Movie, Pagination},
    request_id::{fetch_span, RequestId},
    services::{
        detail_cache::DetailCache,
        poster_validator::{is_plausible_poster_url, ImageProbe, PosterValidator, TimeoutPolicy},
        providers::MovieApi,
    },
};

/// Tuning knobs for the fetch pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Movies displayed per page
    pub page_size: usize,
    /// Summaries requested for the landing page before poster filtering
    pub landing_pool_size: usize,
    /// Detail requests in flight at once
    pub hydration_batch_size: usize,
    /// Upper bound for one poster validation
    pub poster_timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            page_size: 15,
            landing_pool_size: 30,
            hydration_batch_size: 5,
            poster_timeout: Duration::from_millis(1500),
            timeout_policy: TimeoutPolicy::AssumeValid,
        }
    }
}

/// What the UI asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieQuery {
    pub page: u32,
    pub search: String,
    pub genre: String,
}

impl Default for MovieQuery {
    fn default() -> Self {
        Self::landing()
    }
}

impl MovieQuery {
    pub fn new(page: u32, search: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            page,
            search: search.into(),
            genre: genre.into(),
        }
    }

    /// First page, no search, no genre
    pub fn landing() -> Self {
        Self::new(1, "", "")
    }

    /// The unfiltered first page gets poster validation
    pub fn is_landing(&self) -> bool {
        self.page == 1 && self.search.trim().is_empty() && self.genre.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CatalogStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed {
        message: String,
        retryable: bool,
    },
}

/// Snapshot published to the UI after every visible change
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    pub movies: Vec<Movie>,
    pub pagination: Pagination,
    pub status: CatalogStatus,
    pub query: Option<MovieQuery>,
    /// Generation of the fetch that last wrote this view
    pub generation: u64,
}

/// Result of one completed fetch
#[derive(Debug, Clone)]
pub struct MoviePage {
    pub movies: Vec<Movie>,
    pub pagination: Pagination,
    pub landing: bool,
}

/// Movie-list acquisition: token, list, batched hydration, landing filter
///
/// Every fetch takes a new generation number. Only the newest generation may
/// write the published [`CatalogView`], so a slow response to an older
/// request can't overwrite fresher state.
pub struct FetchPipeline {
    api: Arc<dyn MovieApi>,
    details: DetailCache,
    posters: PosterValidator,
    settings: PipelineSettings,
    token: Mutex<Option<String>>,
    generation: AtomicU64,
    last_query: Mutex<Option<MovieQuery>>,
    view: watch::Sender<CatalogView>,
}

impl FetchPipeline {
    pub fn new(
        api: Arc<dyn MovieApi>,
        probe: Arc<dyn ImageProbe>,
        settings: PipelineSettings,
    ) -> Self {
        let posters = PosterValidator::new(probe, settings.timeout_policy);
        Self::with_caches(api, DetailCache::new(), posters, settings)
    }

    pub fn with_caches(
        api: Arc<dyn MovieApi>,
        details: DetailCache,
        posters: PosterValidator,
        settings: PipelineSettings,
    ) -> Self {
        let (view, _) = watch::channel(CatalogView::default());
        Self {
            api,
            details,
            posters,
            settings,
            token: Mutex::new(None),
            generation: AtomicU64::new(0),
            last_query: Mutex::new(None),
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogView> {
        self.view.subscribe()
    }

    /// Current published snapshot
    pub fn view(&self) -> CatalogView {
        self.view.borrow().clone()
    }

    pub fn pagination(&self) -> Pagination {
        self.view.borrow().pagination
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn detail_cache(&self) -> &DetailCache {
        &self.details
    }

    pub fn poster_validator(&self) -> &PosterValidator {
        &self.posters
    }

    /// Fetches a page and publishes it if no newer fetch started meanwhile
    pub async fn fetch(&self, query: MovieQuery) -> AppResult<MoviePage> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let request_id = RequestId::new();
        let span = fetch_span(&request_id, query.page, query.is_landing());

        *self.last_query.lock().await = Some(query.clone());
        self.publish(generation, |view| {
            view.status = CatalogStatus::Loading;
            view.query = Some(query.clone());
        });

        let result = self
            .run(generation, request_id, &query)
            .instrument(span.clone())
            .await;

        let published = span.in_scope(|| match &result {
            Ok(page) => self.publish(generation, |view| {
                view.movies = page.movies.clone();
                view.pagination = page.pagination;
                view.status = CatalogStatus::Ready;
            }),
            Err(e) => {
                tracing::error!(error = %e, "Catalog fetch failed");
                self.publish(generation, |view| {
                    view.movies.clear();
                    view.status = CatalogStatus::Failed {
                        message: e.user_message(),
                        retryable: e.is_retryable(),
                    };
                })
            }
        });

        if !published {
            tracing::debug!(parent: &span, generation, "Discarding stale catalog response");
        }

        result
    }

    /// Replays the last requested query, or the landing page if none
    pub async fn retry(&self) -> AppResult<MoviePage> {
        let query = self
            .last_query
            .lock()
            .await
            .clone()
            .unwrap_or_else(MovieQuery::landing);
        tracing::info!(page = query.page, "Retrying catalog fetch");
        self.fetch(query).await
    }

    async fn run(
        &self,
        generation: u64,
        request_id: RequestId,
        query: &MovieQuery,
    ) -> AppResult<MoviePage> {
        let token = self.token().await?;
        let landing = query.is_landing();

        let params = ListParams {
            page: query.page,
            limit: if landing {
                self.settings.landing_pool_size
            } else {
                self.settings.page_size
            },
            search: non_empty(&query.search),
            genre: non_empty(&query.genre),
        };

        let list = self.api.list_movies(&token, &params, request_id).await?;
        let pagination = Pagination {
            current_page: list.page.unwrap_or(query.page),
            total_pages: list.total_pages,
            total_results: list.total,
        };

        let mut movies: Vec<Movie> = list.data.into_iter().map(Movie::from).collect();

        // Placeholders go out immediately so the grid can render
        if !landing {
            self.publish(generation, |view| {
                view.movies = movies.clone();
                view.pagination = pagination;
            });
        }

        self.hydrate(generation, &token, &mut movies, !landing).await;

        if landing {
            movies = self.filter_landing(movies).await;
        }

        Ok(MoviePage {
            movies,
            pagination,
            landing,
        })
    }

    /// Returns the session token, acquiring it on first use
    async fn token(&self) -> AppResult<String> {
        let mut token = self.token.lock().await;
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }

        let fresh = self.api.fetch_token().await.map_err(|e| match e {
            AppError::Connectivity(_) => e,
            other => AppError::Connectivity(other.to_string()),
        })?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// Hydrates summaries in sequential batches of concurrent detail fetches
    ///
    /// Failed items keep their summary form. When `progressive` is set, the
    /// view is republished after every batch.
    async fn hydrate(
        &self,
        generation: u64,
        token: &str,
        movies: &mut [Movie],
        progressive: bool,
    ) {
        let ids: Vec<String> = movies.iter().map(|m| m.id.clone()).collect();
        let batch_size = self.settings.hydration_batch_size.max(1);

        for (batch_index, batch) in ids.chunks(batch_size).enumerate() {
            let mut tasks = Vec::new();

            for id in batch {
                let api = Arc::clone(&self.api);
                let cache = self.details.clone();
                let token = token.to_string();
                let id = id.clone();
                let task = tokio::spawn(async move {
                    let result: AppResult<Movie> = async {
                        memoized!(cache, id, async { api.movie_details(&token, &id).await })
                    }
                    .await;
                    (id, result)
                });
                tasks.push(task);
            }

            let mut hydrated = 0;
            let mut failed = 0;

            for task in tasks {
                match task.await {
                    Ok((id, Ok(detail))) => {
                        for slot in movies.iter_mut().filter(|m| m.id == id) {
                            *slot = Movie {
                                id: id.clone(),
                                ..detail.clone()
                            };
                        }
                        hydrated += 1;
                    }
                    Ok((id, Err(e))) => {
                        tracing::warn!(movie_id = %id, error = %e, "Detail fetch failed, keeping summary");
                        failed += 1;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Task join error");
                        failed += 1;
                    }
                }
            }

            tracing::debug!(
                batch = batch_index,
                hydrated = hydrated,
                failed = failed,
                "Hydration batch settled"
            );

            if progressive {
                self.publish(generation, |view| view.movies = movies.to_vec());
            }
        }
    }

    /// Keeps landing candidates whose posters load, in order, up to a page
    async fn filter_landing(&self, movies: Vec<Movie>) -> Vec<Movie> {
        let pool = movies.len();
        let candidates: Vec<(Movie, String)> = movies
            .into_iter()
            .filter_map(|movie| {
                let url = movie.poster_url.clone()?;
                is_plausible_poster_url(&url).then_some((movie, url))
            })
            .collect();
        let plausible = candidates.len();

        let mut tasks = Vec::new();
        for (_, url) in &candidates {
            let validator = self.posters.clone();
            let url = url.clone();
            let timeout = self.settings.poster_timeout;
            tasks.push(tokio::spawn(async move {
                validator.validate(&url, timeout).await
            }));
        }

        let mut kept = Vec::new();
        for ((movie, url), task) in candidates.into_iter().zip(tasks) {
            match task.await {
                Ok(true) => kept.push(movie),
                Ok(false) => tracing::debug!(movie_id = %movie.id, url = %url, "Dropping movie with broken poster"),
                Err(e) => tracing::error!(error = %e, "Task join error"),
            }
        }
        kept.truncate(self.settings.page_size);

        tracing::info!(
            pool = pool,
            plausible = plausible,
            kept = kept.len(),
            "Landing posters validated"
        );

        kept
    }

    /// Applies `update` to the view if `generation` is still the newest fetch
    fn publish(&self, generation: u64, update: impl FnOnce(&mut CatalogView)) -> bool {
        self.view.send_if_modified(|view| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(view);
            view.generation = generation;
            true
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
