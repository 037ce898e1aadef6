use thiserror::Error;

pub type Result<T> = std::result::Result<T, RatingError>;

/// Failures surfaced by the rating engine and its stores
#[derive(Debug, Error)]
pub enum RatingError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid rating type: {0}")]
    InvalidRatingType(String),

    #[error("invalid match shape: {0}")]
    InvalidMatchShape(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("store failure: {0}")]
    TransientStore(String),
}

impl RatingError {
    pub fn match_not_found(match_id: i64) -> Self {
        RatingError::NotFound(format!("match {}", match_id))
    }

    /// Read paths answer these with an empty result instead of failing
    pub fn is_empty_answer(&self) -> bool {
        matches!(
            self,
            RatingError::NotFound(_) | RatingError::InvalidRatingType(_)
        )
    }
}

impl From<rusqlite::Error> for RatingError {
    fn from(err: rusqlite::Error) -> Self {
        RatingError::TransientStore(err.to_string())
    }
}

impl From<r2d2::Error> for RatingError {
    fn from(err: r2d2::Error) -> Self {
        RatingError::TransientStore(format!("connection pool: {}", err))
    }
}

/// Add context to store errors
pub fn store_context(operation: &str, subject: &str) -> String {
    format!("Failed to {} for {}", operation, subject)
}

/// Wrap a store result with operation context
pub fn with_store_context<T, E>(result: std::result::Result<T, E>, operation: &str, subject: &str) -> Result<T>
where
    E: std::error::Error,
{
    result.map_err(|e| RatingError::TransientStore(format!("{}: {}", store_context(operation, subject), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_answer_kinds() {
        assert!(RatingError::NotFound("x".into()).is_empty_answer());
        assert!(RatingError::InvalidRatingType("x".into()).is_empty_answer());
        assert!(!RatingError::TransientStore("x".into()).is_empty_answer());
        assert!(!RatingError::InvalidMatchShape("x".into()).is_empty_answer());
        assert!(!RatingError::InvalidDate("x".into()).is_empty_answer());
    }

    #[test]
    fn test_sqlite_errors_are_transient() {
        let err: RatingError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RatingError::TransientStore(_)));
    }
}
