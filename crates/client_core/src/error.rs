use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";
pub const LOGIN_REJECTED_FALLBACK: &str = "Invalid username or password.";
pub const LOGIN_SUPERSEDED: &str = "Signed out before the login completed.";
pub const CATALOG_ERROR_FALLBACK: &str = "Failed to load creatures. Please try again.";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("server responded with status {status}")]
    Status { status: u16, message: Option<String> },
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Transport(String),
}

impl AuthError {
    pub fn user_message(&self) -> &str {
        match self {
            AuthError::Rejected(message) => message,
            AuthError::Transport(_) => NETWORK_ERROR_MESSAGE,
        }
    }
}

impl From<DispatchError> for AuthError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Status {
                status: 400..=499,
                message,
            } => AuthError::Rejected(message.unwrap_or_else(|| LOGIN_REJECTED_FALLBACK.to_string())),
            other => AuthError::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("catalog rejected the request with status {status}")]
    Rejected { status: u16, message: Option<String> },
    #[error("catalog request failed: {0}")]
    Transport(String),
}

impl CatalogError {
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::Rejected {
                message: Some(message),
                ..
            } => message.clone(),
            _ => CATALOG_ERROR_FALLBACK.to_string(),
        }
    }
}

impl From<DispatchError> for CatalogError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Status { status, message } => CatalogError::Rejected { status, message },
            other => CatalogError::Transport(other.to_string()),
        }
    }
}
