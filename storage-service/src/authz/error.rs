use service_core::error::AppError;
use thiserror::Error;

/// Failure modes of the authorization engine and the stores it consults.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("User {caller_id} is not the owner of resource {resource_id}")]
    NotOwner {
        caller_id: String,
        resource_id: String,
    },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Corrupt resource tree at {resource_id}: {reason}")]
    CorruptTree { resource_id: String, reason: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl AuthzError {
    /// Only store outages are worth retrying; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthzError::StoreUnavailable(_))
    }
}

impl From<mongodb::error::Error> for AuthzError {
    fn from(err: mongodb::error::Error) -> Self {
        AuthzError::StoreUnavailable(anyhow::Error::new(err))
    }
}

impl From<redis::RedisError> for AuthzError {
    fn from(err: redis::RedisError) -> Self {
        AuthzError::StoreUnavailable(anyhow::Error::new(err))
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Resource not found: {}", id))
            }
            e @ AuthzError::NotOwner { .. } => AppError::Forbidden(anyhow::anyhow!(e.to_string())),
            AuthzError::InvalidAction(a) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid action: {}", a))
            }
            e @ AuthzError::CorruptTree { .. } => {
                AppError::InternalError(anyhow::anyhow!(e.to_string()))
            }
            AuthzError::StoreUnavailable(e) => AppError::ServiceUnavailable(e),
        }
    }
}
