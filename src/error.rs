use thiserror::Error;

/// Errors surfaced to callers of the recommendation engine.
///
/// Insufficient data is deliberately not represented here: empty visit
/// histories, empty follow graphs and empty candidate sets all produce empty
/// ranked lists, logged at warning level. Cache failures degrade to direct
/// computation and are never surfaced either.
#[derive(Debug, Error)]
pub enum RecommendError {
    /// `limit` must be in 1..=50.
    #[error("recommendation limit must be between 1 and 50, got {0}")]
    InvalidLimit(usize),

    /// A data-gateway read failed. Gateway implementations own their own
    /// retry/backoff policy; by the time this surfaces the read is unrecoverable.
    #[error("data gateway read failed: {0}")]
    Gateway(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RecommendError>;
