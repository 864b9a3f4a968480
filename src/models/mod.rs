use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod favorite;

pub use favorite::{FavoriteRecord, NewFavorite, User};

/// Minimal list-endpoint entry, superseded once its detail arrives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovieSummary {
    pub id: String,
    pub title: String,
}

/// A genre as returned by the API: either a bare name or an object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Genre {
    Name(String),
    Object {
        #[serde(alias = "title")]
        name: String,
    },
}

impl Genre {
    pub fn name(&self) -> &str {
        match self {
            Genre::Name(name) => name,
            Genre::Object { name } => name,
        }
    }
}

impl Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Running time: whole minutes or an ISO-8601 period such as `PT2H10M`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Runtime {
    Minutes(u32),
    Iso(String),
}

impl Runtime {
    /// Normalized minutes, `None` when an ISO period can't be parsed
    pub fn minutes(&self) -> Option<u32> {
        match self {
            Runtime::Minutes(m) => Some(*m),
            Runtime::Iso(period) => parse_iso_minutes(period),
        }
    }
}

/// Parses the time part of an ISO-8601 duration (`PT1H30M`, `PT95M`, `PT45S`)
fn parse_iso_minutes(period: &str) -> Option<u32> {
    let time = period.trim().strip_prefix("PT")?;
    if time.is_empty() {
        return None;
    }

    let mut total_seconds: u32 = 0;
    let mut digits = String::new();
    for c in time.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u32 = digits.parse().ok()?;
        digits.clear();
        let unit = match c.to_ascii_uppercase() {
            'H' => 3600,
            'M' => 60,
            'S' => 1,
            _ => return None,
        };
        total_seconds = total_seconds.checked_add(value.checked_mul(unit)?)?;
    }

    // Trailing digits without a unit
    if !digits.is_empty() {
        return None;
    }

    Some(total_seconds / 60)
}

/// A movie in summary or hydrated form, joined on `id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default, alias = "ratingValue")]
    pub rating: Option<String>,
    #[serde(default, alias = "summary")]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default, alias = "duration")]
    pub runtime: Option<Runtime>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, alias = "datePublished")]
    pub release_date: Option<String>,
}

impl Movie {
    /// True once any detail field beyond id/title is populated
    pub fn is_hydrated(&self) -> bool {
        self.poster_url.is_some()
            || self.rating.is_some()
            || self.overview.is_some()
            || !self.genres.is_empty()
            || self.runtime.is_some()
            || self.year.is_some()
            || self.release_date.is_some()
    }

    /// Release year, falling back to the leading year of `release_date`
    pub fn release_year(&self) -> Option<i32> {
        self.year.or_else(|| {
            self.release_date
                .as_deref()
                .and_then(|date| date.get(0..4))
                .and_then(|year| year.parse().ok())
        })
    }

    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres
            .iter()
            .any(|g| g.name().eq_ignore_ascii_case(genre))
    }
}

impl From<MovieSummary> for Movie {
    fn from(summary: MovieSummary) -> Self {
        Movie {
            id: summary.id,
            title: summary.title,
            ..Default::default()
        }
    }
}

/// Pagination of the most recently completed fetch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_results: u64,
}

// ============================================================================
// Movies API Types
// ============================================================================

/// API response from GET /auth/token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// API response from GET /movies
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieListResponse {
    #[serde(default)]
    pub data: Vec<MovieSummary>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: Option<u32>,
}

/// Query parameters for GET /movies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub limit: usize,
    pub search: Option<String>,
    pub genre: Option<String>,
}

impl ListParams {
    /// Query pairs with empty filters left out
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(search) = self.search.as_ref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.clone()));
        }
        if let Some(genre) = self.genre.as_ref().filter(|g| !g.is_empty()) {
            pairs.push(("genre", genre.clone()));
        }
        pairs
    }
}
