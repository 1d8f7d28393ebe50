pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`] for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed a value outside the accepted domain.
    InvalidArgument,
    /// Inputs were individually valid but inconsistent or empty.
    Precondition,
    /// An internal invariant broke while computing.
    Computation,
    /// Reading or writing images failed.
    Io,
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::Config(_) | Self::ThreadPool(_) => {
                ErrorKind::InvalidArgument
            }
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::Computation(_) => ErrorKind::Computation,
            Self::Image(_) | Self::Io(_) => ErrorKind::Io,
        }
    }
}
