/// External service abstractions
///
/// The movies REST API and the cloud auth/favorites store are both consumed
/// through traits so the pipeline and reconciler can be exercised against
/// fakes. The HTTP implementations live in the submodules.
use crate::{
    error::AppResult,
    models::{FavoriteRecord, ListParams, Movie, MovieListResponse, NewFavorite, User},
    request_id::RequestId,
};

pub mod cloud;
pub mod movies_api;

pub use cloud::HttpCloudClient;
pub use movies_api::HttpMovieApi;

/// The movies REST API
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieApi: Send + Sync {
    /// Obtain a bearer token for subsequent requests
    async fn fetch_token(&self) -> AppResult<String>;

    /// List movie summaries for a page, optionally filtered
    async fn list_movies(
        &self,
        token: &str,
        params: &ListParams,
        request_id: RequestId,
    ) -> AppResult<MovieListResponse>;

    /// Fetch the full record of one movie
    async fn movie_details(&self, token: &str, id: &str) -> AppResult<Movie>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Account operations of the cloud store
///
/// Session tokens are kept by the implementation; callers only see users.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CloudAccount: Send + Sync {
    async fn create_account(&self, email: &str, password: &str, name: Option<String>)
        -> AppResult<User>;

    async fn login_with_password(&self, email: &str, password: &str) -> AppResult<User>;

    /// Email a one-time sign-in link that redirects to `redirect_url`
    async fn send_magic_link(&self, email: &str, redirect_url: &str) -> AppResult<()>;

    /// Complete a magic-link sign-in with the values carried by the link
    async fn verify_magic_link(&self, user_id: &str, secret: &str) -> AppResult<User>;

    async fn recover_password(&self, email: &str, redirect_url: &str) -> AppResult<()>;

    /// The signed-in user, `None` when there is no valid session
    async fn current_user(&self) -> AppResult<Option<User>>;

    async fn logout(&self) -> AppResult<()>;

    /// Secret of the active session, if any
    async fn session_secret(&self) -> Option<String>;

    /// Adopt a secret persisted by an earlier run
    async fn resume_session(&self, secret: String);
}

/// Favorites collection of the cloud store, scoped by user id
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CloudFavorites: Send + Sync {
    async fn list_favorites(&self, user_id: &str) -> AppResult<Vec<FavoriteRecord>>;

    async fn add_favorite(&self, favorite: NewFavorite) -> AppResult<FavoriteRecord>;

    async fn remove_favorite(&self, document_id: &str) -> AppResult<()>;
}
