use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Movie;

/// An authenticated account in the cloud store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(rename = "$id", alias = "id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A cloud favorite, owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    /// Store-assigned document id
    #[serde(rename = "$id", alias = "documentId")]
    pub document_id: String,
    pub user_id: String,
    pub movie_id: String,
    pub title: String,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub rating: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a cloud favorite
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewFavorite {
    pub user_id: String,
    pub movie_id: String,
    pub title: String,
    pub poster_url: Option<String>,
    pub rating: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewFavorite {
    pub fn from_movie(user_id: &str, movie: &Movie) -> Self {
        Self {
            user_id: user_id.to_string(),
            movie_id: movie.id.clone(),
            title: movie.title.clone(),
            poster_url: movie.poster_url.clone(),
            rating: movie.rating.clone(),
            created_at: Utc::now(),
        }
    }
}
