use thiserror::Error;

/// Failures talking to the social credit backend.
///
/// The `Display` output is what gets shown to the user, so every variant reads
/// as a plain sentence.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication token not found. Please login.")]
    NotLoggedIn,
    #[error("Session expired or invalid. Please login again.")]
    Unauthorized,
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("API key was not found in the server response.")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// True for the failures that should drop the local session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::NotLoggedIn)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Rejected user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Score delta must be a valid number.")]
    NotANumber,
    #[error("Score delta cannot be zero.")]
    Zero,
    #[error("User not found or ID is invalid.")]
    InvalidUserId,
}

pub type ApiResult<T> = Result<T, ApiError>;
