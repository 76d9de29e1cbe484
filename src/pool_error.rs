use crate::poolable::PoolId;

/// Error type for the object pool
#[derive(Debug, Clone, PartialEq)]
pub enum PoolError {
    /// Pool configuration failed validation
    InvalidConfig { pool_id: PoolId, details: String },

    /// `initialize` was called on a live container
    AlreadyInitialized { pool_id: PoolId },

    /// Operation on a container that was never initialized or was shut down
    NotInitialized { pool_id: PoolId },

    /// No pool registered under this id
    PoolNotFound { pool_id: PoolId },

    /// A pool with this id is already registered
    PoolExists { pool_id: PoolId },

    /// The entry is not managed by the pool it was released to
    NotOwned { pool_id: PoolId },

    /// The entry is already back in the pool
    DoubleRelease { pool_id: PoolId },

    /// The entry refused release through its `can_be_released` predicate
    CannotRelease { pool_id: PoolId },
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::InvalidConfig { pool_id, details } => {
                write!(f, "Invalid config for pool [{}]: {}", pool_id, details)
            }
            PoolError::AlreadyInitialized { pool_id } => {
                write!(f, "Pool [{}] already initialized", pool_id)
            }
            PoolError::NotInitialized { pool_id } => {
                write!(f, "Pool [{}] is not initialized", pool_id)
            }
            PoolError::PoolNotFound { pool_id } => {
                write!(f, "Pool [{}] not found", pool_id)
            }
            PoolError::PoolExists { pool_id } => {
                write!(f, "Pool [{}] already exists", pool_id)
            }
            PoolError::NotOwned { pool_id } => {
                write!(f, "Entry not managed by pool [{}]", pool_id)
            }
            PoolError::DoubleRelease { pool_id } => {
                write!(f, "Entry already released to pool [{}]", pool_id)
            }
            PoolError::CannotRelease { pool_id } => {
                write!(f, "Entry refused release to pool [{}]", pool_id)
            }
        }
    }
}

impl std::error::Error for PoolError {}

// Type alias for Result with PoolError
pub type PoolResult<T> = Result<T, PoolError>;
