/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No authenticated user")]
    Unauthenticated,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether replaying the same request can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Connectivity(_)
                | AppError::FetchFailed(_)
                | AppError::HttpClient(_)
                | AppError::ExternalApi(_)
        )
    }

    /// Message shown in the catalog error state
    pub fn user_message(&self) -> String {
        match self {
            AppError::Connectivity(_) | AppError::HttpClient(_) => {
                "Unable to reach the movie service. Check your connection and try again.".to_string()
            }
            AppError::FetchFailed(_) | AppError::ExternalApi(_) => {
                "Movies could not be loaded right now. Please try again.".to_string()
            }
            AppError::NotFound(msg) | AppError::InvalidInput(msg) => msg.clone(),
            AppError::Unauthenticated => "Please sign in to continue.".to_string(),
            AppError::Store(_) | AppError::Serialization(_) | AppError::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_is_retryable() {
        let err = AppError::Connectivity("token endpoint unreachable".to_string());
        assert!(err.is_retryable());
        assert!(err.user_message().contains("try again"));
    }

    #[test]
    fn test_invalid_input_is_not_retryable() {
        let err = AppError::InvalidInput("Page must be at least 1".to_string());
        assert!(!err.is_retryable());
        assert_eq!(err.user_message(), "Page must be at least 1");
    }
}
