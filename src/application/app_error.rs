use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Payment gateway error: {message}")]
    Gateway { message: String, retryable: bool },

    #[error("Duplicate operation: {0}")]
    Duplicate(String),

    #[error("Storage error: {0}")]
    Persistence(String),

    #[error("Not found")]
    NotFound,

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Retryable gateway failure (processor unreachable, timed out, 5xx).
    pub fn gateway_retryable(message: impl Into<String>) -> Self {
        AppError::Gateway {
            message: message.into(),
            retryable: true,
        }
    }

    /// Non-retryable gateway rejection (bad request shape, 4xx).
    pub fn gateway_rejected(message: impl Into<String>) -> Self {
        AppError::Gateway {
            message: message.into(),
            retryable: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    ValidationError,
    GatewayError,
    DuplicateError,
    PersistenceError,
    NotFound,
    Unauthorized,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::GatewayError => "GATEWAY_ERROR",
            ErrorCode::DuplicateError => "DUPLICATE_ERROR",
            ErrorCode::PersistenceError => "PERSISTENCE_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
