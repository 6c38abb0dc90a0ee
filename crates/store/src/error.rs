use thiserror::Error;

/// Infrastructure-level persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness guarantee fired (duplicate primary key, duplicate
    /// find-or-create pair under race).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The targeted row does not exist.
    #[error("not found")]
    NotFound,

    /// The backing store failed (connection, query, corrupt row).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
