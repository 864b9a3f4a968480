use std::sync::Arc;

use reqwest::Client as HttpClient;
use tracing_subscriber::EnvFilter;

use reelscout::{
    config::Config,
    db::{create_redis_client, KeyValueStore, MemoryStore, RedisStore},
    services::{
        favorites::FavoritesReconciler,
        pipeline::{FetchPipeline, MovieQuery},
        poster_validator::HttpImageProbe,
        providers::{HttpCloudClient, HttpMovieApi},
        session::SessionManager,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let local: Arc<dyn KeyValueStore> = match create_redis_client(&config.redis_url) {
        Ok(client) => Arc::new(RedisStore::new(client, "reelscout")),
        Err(e) => {
            tracing::warn!(error = %e, "Invalid Redis URL, keeping state in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let cloud = Arc::new(HttpCloudClient::new(
        config.cloud_api_url.clone(),
        config.cloud_project_id.clone(),
        config.cloud_database_id.clone(),
        config.cloud_collection_id.clone(),
    ));
    let session = SessionManager::new(cloud.clone(), local.clone());
    let user = match session.restore().await {
        Ok(Some(user)) => {
            tracing::info!(user_id = %user.id, "Session restored");
            Some(user)
        }
        Ok(None) => {
            tracing::info!("Browsing as guest");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not restore session");
            None
        }
    };

    let http_client = HttpClient::new();
    let api = Arc::new(HttpMovieApi::with_client(
        http_client.clone(),
        config.movies_api_url.clone(),
    ));
    let probe = Arc::new(HttpImageProbe::new(http_client));
    let pipeline = FetchPipeline::new(api, probe, config.pipeline_settings());

    tracing::info!(api_url = %config.movies_api_url, "Fetching landing page");

    let page = pipeline.fetch(MovieQuery::landing()).await?;
    let favorites = match FavoritesReconciler::load(local, cloud).await {
        Ok(mut favorites) => {
            // The cloud set is authoritative once signed in
            if let Some(user) = user {
                let report = favorites.sign_in(user, &page.movies).await;
                if !report.is_empty() {
                    tracing::info!(report = ?report, "Guest favorites reconciled at startup");
                }
            }
            favorites.favorite_ids()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not load guest favorites");
            Vec::new()
        }
    };

    println!(
        "Page {} of {} ({} movies total)",
        page.pagination.current_page, page.pagination.total_pages, page.pagination.total_results
    );
    for movie in &page.movies {
        let marker = if favorites.contains(&movie.id) { "*" } else { " " };
        match movie.release_year() {
            Some(year) => println!("{} {} ({})", marker, movie.title, year),
            None => println!("{} {}", marker, movie.title),
        }
    }

    Ok(())
}
