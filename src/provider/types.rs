use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Provider timed out after {0} ms")]
    Timeout(u64),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
