use thiserror::Error;

/// A single failed field check from local form validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{context}: {message}")]
    Remote {
        context: &'static str,
        message: String,
    },

    #[error("{context}: request timed out")]
    Timeout { context: &'static str },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A cart synchronization is already in progress")]
    Busy,

    #[error("Cart is empty")]
    EmptyCart,
}

impl StorefrontError {
    pub fn remote(context: &'static str, message: impl Into<String>) -> Self {
        Self::Remote {
            context,
            message: message.into(),
        }
    }

    /// The single readable message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            StorefrontError::Validation(err) => err.message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, StorefrontError::Remote { .. } | StorefrontError::Timeout { .. })
    }
}

impl From<serde_json::Error> for StorefrontError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StorefrontError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
