//! Error types for storefront operations.

use thiserror::Error;

/// Result type alias for storefront operations.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Error taxonomy for the storefront client.
///
/// Reducers never hold this type in state: request results are carried in
/// actions as the rendered message so that state stays `Clone + PartialEq`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorefrontError {
    // ═══════════════════════════════════════════════════════════
    // Client-side Errors
    // ═══════════════════════════════════════════════════════════
    /// A field failed local validation.
    #[error("{message}")]
    Validation {
        /// Field name
        field: String,
        /// User-facing message
        message: String,
    },

    /// The requested quantity exceeds the stock on hand.
    #[error("Only {available} in stock")]
    InsufficientStock {
        /// Units available
        available: u32,
    },

    /// The action is not allowed from the current checkout stage.
    #[error("Invalid checkout transition: {0}")]
    InvalidTransition(String),

    /// No signed-in customer.
    #[error("Please sign in to place an order.")]
    Unauthenticated,

    // ═══════════════════════════════════════════════════════════
    // Backend Errors
    // ═══════════════════════════════════════════════════════════
    /// The request never produced a response (network, timeout).
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The response body did not match the expected shape.
    #[error("Failed to parse response: {0}")]
    ResponseParseFailed(String),

    /// The backend rejected the session token.
    #[error("Session expired, please sign in again")]
    Unauthorized,

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the response body, or a fallback
        message: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Gateway Errors
    // ═══════════════════════════════════════════════════════════
    /// The payment gateway hand-off failed.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// A gateway return URL could not be interpreted.
    #[error("Invalid return URL: {0}")]
    InvalidReturnUrl(String),

    // ═══════════════════════════════════════════════════════════
    // Host Errors
    // ═══════════════════════════════════════════════════════════
    /// Browser-storage style persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorefrontError {
    /// Build a validation error for a field.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
