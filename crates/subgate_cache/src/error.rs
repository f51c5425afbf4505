use thiserror::Error;

/// Persistence failures surfaced by a cache backend. The gateway treats
/// them as a cache-unavailable condition, never as a request failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file decode: {0}")]
    Decode(#[from] serde_json::Error),
}
