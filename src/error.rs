use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote {operation} failed: {message}")]
    RemoteOperationFailed {
        operation: &'static str,
        message: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        AppError::RemoteOperationFailed {
            operation,
            message: message.into(),
        }
    }

    /// Whether the error should keep the user out of authenticated screens.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::RemoteUnavailable(_) | AppError::Config(_))
    }

    /// Transient, user-facing rendition of the error.
    pub fn notification(&self) -> Notification {
        let message = match self {
            AppError::RemoteUnavailable(detail) => {
                error!("remote unavailable: {}", detail);
                "Connection failed. Please check your internet.".to_string()
            }
            AppError::RemoteOperationFailed { operation, message } => {
                error!("remote {} failed: {}", operation, message);
                match *operation {
                    "insert" => "Failed to add task".to_string(),
                    "update" => "Failed to update task".to_string(),
                    "delete" => "Failed to delete task".to_string(),
                    "purge" => "Failed to clear completed tasks".to_string(),
                    "select" => "Failed to load tasks".to_string(),
                    "profile" => "Failed to update profile".to_string(),
                    "sign_out" => "Failed to logout".to_string(),
                    "decode" => "Unexpected response from server".to_string(),
                    "request" => "Request failed. Please try again.".to_string(),
                    // auth errors carry a message meant for the user
                    _ => message.clone(),
                }
            }
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound => "Task not found".to_string(),
            AppError::Unauthenticated => "Please sign in first".to_string(),
            AppError::Config(msg) => msg.clone(),
        };

        Notification {
            level: Level::Error,
            message,
        }
    }
}

/// Errors raised mid-session. Only the startup health check reports
/// `RemoteUnavailable`.
impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AppError::remote("decode", e.to_string())
        } else {
            AppError::remote("request", e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }
}
