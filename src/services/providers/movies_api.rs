/// Movies REST API provider
///
/// API Flow:
/// 1. Token: GET /auth/token → `{ token }`, reused for the session
/// 2. List: GET /movies?page&limit&search&genre → summaries + pagination
/// 3. Detail: GET /movies/{id} → full movie record
use crate::{
    error::{AppError, AppResult},
    models::{ListParams, Movie, MovieListResponse, TokenResponse},
    request_id::{RequestId, REQUEST_ID_HEADER},
    services::providers::MovieApi,
};
use reqwest::{Client as HttpClient, Url};

#[derive(Clone)]
pub struct HttpMovieApi {
    http_client: HttpClient,
    api_url: String,
}

impl HttpMovieApi {
    pub fn new(api_url: String) -> Self {
        Self::with_client(HttpClient::new(), api_url)
    }

    pub fn with_client(http_client: HttpClient, api_url: String) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{api_url}/movies/{id}` with `id` encoded as a single path segment
    fn detail_url(&self, id: &str) -> AppResult<Url> {
        let mut url = Url::parse(&format!("{}/movies", self.api_url))
            .map_err(|e| AppError::InvalidInput(format!("Invalid movies API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::InvalidInput("Movies API URL cannot hold a path".to_string()))?
            .push(id);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl MovieApi for HttpMovieApi {
    async fn fetch_token(&self) -> AppResult<String> {
        let url = format!("{}/auth/token", self.api_url);
        let response = self.http_client.get(&url).send().await.map_err(|e| {
            tracing::error!(error = %e, "Token request failed");
            AppError::Connectivity(format!("Token request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Connectivity(format!(
                "Token endpoint returned status {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Connectivity(format!("Malformed token response: {}", e)))?;

        if token.token.is_empty() {
            return Err(AppError::Connectivity(
                "Token endpoint returned an empty token".to_string(),
            ));
        }

        tracing::info!(provider = self.name(), "Acquired API token");

        Ok(token.token)
    }

    async fn list_movies(
        &self,
        token: &str,
        params: &ListParams,
        request_id: RequestId,
    ) -> AppResult<MovieListResponse> {
        let url = format!("{}/movies", self.api_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .header(REQUEST_ID_HEADER, request_id.as_str())
            .query(&params.query_pairs())
            .send()
            .await
            .map_err(|e| AppError::Connectivity(format!("Movie list request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                page = params.page,
                "Movie list request failed"
            );
            return Err(AppError::FetchFailed(format!(
                "API returned status {}: {}",
                status, body
            )));
        }

        let list: MovieListResponse = response.json().await?;

        tracing::info!(
            page = params.page,
            limit = params.limit,
            results = list.data.len(),
            total = list.total,
            provider = self.name(),
            "Movie list fetched"
        );

        Ok(list)
    }

    async fn movie_details(&self, token: &str, id: &str) -> AppResult<Movie> {
        let url = self.detail_url(id)?;
        let response = self.http_client.get(url).bearer_auth(token).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Movie {} not found", id)));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "API returned status {}: {}",
                status, body
            )));
        }

        let movie: Movie = response.json().await?;
        tracing::debug!(movie_id = %id, "Movie details fetched");

        Ok(movie)
    }

    fn name(&self) -> &'static str {
        "movies_api"
    }
}
