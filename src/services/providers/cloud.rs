/// Cloud auth/favorites store client
///
/// Talks to a document-store backend-as-a-service over REST. Every request
/// carries the project id; authenticated requests also carry the session
/// secret obtained at login. Favorites are documents in one collection,
/// filtered by `userId`.
use std::sync::Arc;

use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{FavoriteRecord, NewFavorite, User},
    services::providers::{CloudAccount, CloudFavorites},
};

pub const PROJECT_HEADER: &str = "X-Project";

/// Placeholder that asks the store to assign an id
const UNIQUE_ID: &str = "unique()";

#[derive(Debug, Deserialize)]
struct SessionResponse {
    secret: String,
}

#[derive(Debug, Deserialize)]
struct DocumentList<T> {
    documents: Vec<T>,
}

#[derive(Clone)]
pub struct HttpCloudClient {
    http_client: HttpClient,
    api_url: String,
    project_id: String,
    database_id: String,
    collection_id: String,
    session: Arc<RwLock<Option<String>>>,
}

impl HttpCloudClient {
    pub fn new(
        api_url: String,
        project_id: String,
        database_id: String,
        collection_id: String,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            project_id,
            database_id,
            collection_id,
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Resumes a previously established session
    pub fn with_session(self, secret: String) -> Self {
        Self {
            session: Arc::new(RwLock::new(Some(secret))),
            ..self
        }
    }

    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.api_url, self.database_id, self.collection_id
        )
    }

    async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, url)
            .header(PROJECT_HEADER, &self.project_id);

        match self.session.read().await.as_ref() {
            Some(secret) => builder.bearer_auth(secret),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> AppResult<reqwest::Response> {
        let response = builder.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthenticated);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Cloud store returned status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> AppResult<T> {
        Ok(self.send(builder).await?.json().await?)
    }

    async fn start_session(&self, builder: RequestBuilder) -> AppResult<User> {
        let session: SessionResponse = self.send_json(builder).await?;
        *self.session.write().await = Some(session.secret);

        self.current_user()
            .await?
            .ok_or(AppError::Unauthenticated)
    }
}

#[async_trait::async_trait]
impl CloudAccount for HttpCloudClient {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> AppResult<User> {
        let url = format!("{}/account", self.api_url);
        let builder = self.request(Method::POST, &url).await.json(&json!({
            "userId": UNIQUE_ID,
            "email": email,
            "password": password,
            "name": name,
        }));
        let user: User = self.send_json(builder).await?;

        tracing::info!(user_id = %user.id, "Cloud account created");

        self.login_with_password(email, password).await
    }

    async fn login_with_password(&self, email: &str, password: &str) -> AppResult<User> {
        let url = format!("{}/account/sessions/email", self.api_url);
        let builder = self
            .request(Method::POST, &url)
            .await
            .json(&json!({ "email": email, "password": password }));

        let user = self.start_session(builder).await?;
        tracing::info!(user_id = %user.id, "Signed in with password");
        Ok(user)
    }

    async fn send_magic_link(&self, email: &str, redirect_url: &str) -> AppResult<()> {
        let url = format!("{}/account/tokens/magic-url", self.api_url);
        let builder = self.request(Method::POST, &url).await.json(&json!({
            "userId": UNIQUE_ID,
            "email": email,
            "url": redirect_url,
        }));
        self.send(builder).await?;
        tracing::info!("Magic link sent");
        Ok(())
    }

    async fn verify_magic_link(&self, user_id: &str, secret: &str) -> AppResult<User> {
        let url = format!("{}/account/sessions/magic-url", self.api_url);
        let builder = self
            .request(Method::PUT, &url)
            .await
            .json(&json!({ "userId": user_id, "secret": secret }));

        let user = self.start_session(builder).await?;
        tracing::info!(user_id = %user.id, "Signed in with magic link");
        Ok(user)
    }

    async fn recover_password(&self, email: &str, redirect_url: &str) -> AppResult<()> {
        let url = format!("{}/account/recovery", self.api_url);
        let builder = self
            .request(Method::POST, &url)
            .await
            .json(&json!({ "email": email, "url": redirect_url }));
        self.send(builder).await?;
        Ok(())
    }

    async fn current_user(&self) -> AppResult<Option<User>> {
        if !self.has_session().await {
            return Ok(None);
        }

        let url = format!("{}/account", self.api_url);
        let builder = self.request(Method::GET, &url).await;
        match self.send_json::<User>(builder).await {
            Ok(user) => Ok(Some(user)),
            Err(AppError::Unauthenticated) => {
                tracing::debug!("Cloud session expired");
                *self.session.write().await = None;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn logout(&self) -> AppResult<()> {
        let url = format!("{}/account/sessions/current", self.api_url);
        let builder = self.request(Method::DELETE, &url).await;
        let result = self.send(builder).await;

        // The local session is gone either way
        *self.session.write().await = None;

        match result {
            Ok(_) | Err(AppError::Unauthenticated) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn session_secret(&self) -> Option<String> {
        self.session.read().await.clone()
    }

    async fn resume_session(&self, secret: String) {
        *self.session.write().await = Some(secret);
    }
}

#[async_trait::async_trait]
impl CloudFavorites for HttpCloudClient {
    async fn list_favorites(&self, user_id: &str) -> AppResult<Vec<FavoriteRecord>> {
        let query = json!({
            "method": "equal",
            "attribute": "userId",
            "values": [user_id],
        })
        .to_string();

        let builder = self
            .request(Method::GET, &self.documents_url())
            .await
            .query(&[("queries[]", query)]);
        let list: DocumentList<FavoriteRecord> = self.send_json(builder).await?;

        tracing::debug!(user_id = %user_id, count = list.documents.len(), "Cloud favorites listed");

        Ok(list.documents)
    }

    async fn add_favorite(&self, favorite: NewFavorite) -> AppResult<FavoriteRecord> {
        let builder = self
            .request(Method::POST, &self.documents_url())
            .await
            .json(&json!({ "documentId": UNIQUE_ID, "data": favorite }));
        let record: FavoriteRecord = self.send_json(builder).await?;

        tracing::info!(
            movie_id = %record.movie_id,
            document_id = %record.document_id,
            "Cloud favorite added"
        );

        Ok(record)
    }

    async fn remove_favorite(&self, document_id: &str) -> AppResult<()> {
        let url = format!("{}/{}", self.documents_url(), document_id);
        let builder = self.request(Method::DELETE, &url).await;
        self.send(builder).await?;

        tracing::info!(document_id = %document_id, "Cloud favorite removed");

        Ok(())
    }
}
