/// Poster validation for the landing page
///
/// A poster is "valid" when its URL actually serves an image. Outcomes are
/// memoized per URL for the lifetime of the validator; concurrent callers for
/// the same URL share one probe.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as HttpClient;
use tokio::sync::{Mutex, OnceCell};

/// Substrings that mark a stock/default artwork URL
const PLACEHOLDER_MARKERS: &[&str] = &[
    "placeholder",
    "no-image",
    "noimage",
    "no_image",
    "no-poster",
    "no_poster",
    "default",
    "missing",
];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif"];

/// Result of a single load attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Loaded,
    Failed,
}

/// How a probe that neither loads nor fails within the timeout is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Count as valid, the rendering layer falls back if it later breaks
    #[default]
    AssumeValid,
    /// Count as invalid
    Exclude,
}

/// Attempts to load a resource as an image
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ImageProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Probes over HTTP: a 2xx response with an `image/*` content type loads
#[derive(Clone, Default)]
pub struct HttpImageProbe {
    http_client: HttpClient,
}

impl HttpImageProbe {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait::async_trait]
impl ImageProbe for HttpImageProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Poster request failed");
                return ProbeOutcome::Failed;
            }
        };

        let is_image = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false);

        if response.status().is_success() && is_image {
            ProbeOutcome::Loaded
        } else {
            tracing::debug!(
                url = %url,
                status = %response.status(),
                is_image = is_image,
                "Poster did not load"
            );
            ProbeOutcome::Failed
        }
    }
}

/// Memoized poster validation
#[derive(Clone)]
pub struct PosterValidator {
    probe: Arc<dyn ImageProbe>,
    policy: TimeoutPolicy,
    outcomes: Arc<Mutex<HashMap<String, Arc<OnceCell<bool>>>>>,
}

impl PosterValidator {
    pub fn new(probe: Arc<dyn ImageProbe>, policy: TimeoutPolicy) -> Self {
        Self {
            probe,
            policy,
            outcomes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `url` loads as an image, probing at most once per URL
    pub async fn validate(&self, url: &str, timeout: Duration) -> bool {
        let cell = {
            let mut outcomes = self.outcomes.lock().await;
            outcomes.entry(url.to_string()).or_default().clone()
        };

        *cell
            .get_or_init(|| async {
                match tokio::time::timeout(timeout, self.probe.probe(url)).await {
                    Ok(ProbeOutcome::Loaded) => true,
                    Ok(ProbeOutcome::Failed) => false,
                    Err(_) => {
                        tracing::debug!(
                            url = %url,
                            timeout_ms = timeout.as_millis() as u64,
                            policy = ?self.policy,
                            "Poster validation timed out"
                        );
                        self.policy == TimeoutPolicy::AssumeValid
                    }
                }
            })
            .await
    }

    /// The settled outcome for `url`, if any
    pub async fn cached(&self, url: &str) -> Option<bool> {
        let outcomes = self.outcomes.lock().await;
        outcomes.get(url).and_then(|cell| cell.get().copied())
    }

    /// Drops every memoized outcome; intended for test isolation
    pub async fn clear(&self) {
        self.outcomes.lock().await.clear();
    }
}

/// Cheap syntactic check run before any network validation
///
/// Rejects empty URLs, known placeholder artwork, and anything that is not an
/// http(s) URL whose path ends in an image extension.
pub fn is_plausible_poster_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }

    let lower = url.to_ascii_lowercase();
    if PLACEHOLDER_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return false;
    }

    let Some(rest) = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
    else {
        return false;
    };

    let without_query = rest.split(['?', '#']).next().unwrap_or_default();
    let Some((host, path)) = without_query.split_once('/') else {
        return false;
    };
    if host.is_empty() {
        return false;
    }

    path.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}
