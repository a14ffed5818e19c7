use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure of a single remote-service call. Every variant is carried as data
/// inside a job result; nothing here ever crosses a thread boundary as a panic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Transient transport problem; the same call may succeed on retry.
    #[error("network error: {0}")]
    Network(String),

    /// Remote rejects calls until a successful auth job.
    #[error("not authenticated")]
    Unauthenticated,

    /// Bad arguments; not retryable as-is.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The service accepted the call but reported an error.
    #[error("remote api error: {0}")]
    Api(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// A job of this kind is already running; the request was dropped.
    /// Surface as a "busy" hint, not as a user-facing error.
    #[error("operation already in progress")]
    AlreadyInProgress,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("validation failed: {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
