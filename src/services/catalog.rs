use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::{
    error::AppResult,
    services::{
        intent::FilterCommand,
        pipeline::{CatalogView, FetchPipeline, MovieQuery},
    },
};

/// Runs only the last scheduled task once `delay` passes without a new one
struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    async fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let mut pending = self.pending.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    async fn cancel(&self) {
        if let Some(handle) = self.pending.lock().await.take() {
            handle.abort();
        }
    }
}

/// Turns filter and paging input into pipeline fetches
///
/// Search and genre changes are debounced; page changes, retries and
/// resets fetch right away.
pub struct CatalogController {
    pipeline: Arc<FetchPipeline>,
    query: Arc<Mutex<MovieQuery>>,
    debouncer: Debouncer,
}

impl CatalogController {
    pub fn new(pipeline: Arc<FetchPipeline>, debounce: Duration) -> Self {
        Self {
            pipeline,
            query: Arc::new(Mutex::new(MovieQuery::landing())),
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn view(&self) -> watch::Receiver<CatalogView> {
        self.pipeline.subscribe()
    }

    /// The query the next fetch will use
    pub async fn query(&self) -> MovieQuery {
        self.query.lock().await.clone()
    }

    pub async fn set_search(&self, text: &str) {
        {
            let mut query = self.query.lock().await;
            query.search = text.to_string();
            query.page = 1;
        }
        self.schedule_fetch().await;
    }

    pub async fn set_genre(&self, genre: &str) {
        {
            let mut query = self.query.lock().await;
            query.genre = genre.to_string();
            query.page = 1;
        }
        self.schedule_fetch().await;
    }

    /// Returns `false` without fetching when `page` is out of range
    pub async fn handle_page_change(&self, page: u32) -> AppResult<bool> {
        let total_pages = self.pipeline.pagination().total_pages.max(1);
        if page < 1 || page > total_pages {
            tracing::debug!(page, total_pages, "Ignoring out-of-range page change");
            return Ok(false);
        }

        self.debouncer.cancel().await;
        let query = {
            let mut query = self.query.lock().await;
            query.page = page;
            query.clone()
        };
        self.pipeline.fetch(query).await?;
        Ok(true)
    }

    pub async fn retry(&self) -> AppResult<()> {
        self.debouncer.cancel().await;
        self.pipeline.retry().await?;
        Ok(())
    }

    pub async fn apply(&self, command: FilterCommand) -> AppResult<()> {
        tracing::debug!(command = ?command, "Applying filter command");

        match command {
            FilterCommand::Genre(genre) => self.set_genre(&genre).await,
            FilterCommand::Search(text) => self.set_search(&text).await,
            FilterCommand::ClearFilters => {
                self.debouncer.cancel().await;
                *self.query.lock().await = MovieQuery::landing();
                self.pipeline.fetch(MovieQuery::landing()).await?;
            }
            FilterCommand::NextPage => {
                let page = self.query.lock().await.page;
                self.handle_page_change(page.saturating_add(1)).await?;
            }
            FilterCommand::PreviousPage => {
                let page = self.query.lock().await.page;
                self.handle_page_change(page.saturating_sub(1)).await?;
            }
        }

        Ok(())
    }

    async fn schedule_fetch(&self) {
        let pipeline = Arc::clone(&self.pipeline);
        let query = Arc::clone(&self.query);

        self.debouncer
            .schedule(async move {
                let query = query.lock().await.clone();
                // Failures are published to the view
                let _ = pipeline.fetch(query).await;
            })
            .await;
    }
}
