//! # Payment Error Types
//!
//! Typed error handling for the shieldcart payment engine.
//! All payment operations return `Result<T, PaymentError>`.
//!
//! This module also owns the flat failure taxonomy ([`ErrorCategory`],
//! [`ErrorSeverity`]) and the [`Failure`] trait through which retry
//! predicates and the error classifier inspect any operation error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exhaustive, flat taxonomy every failure is classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Network,
    Payment,
    Validation,
    Authentication,
    Authorization,
    Configuration,
    System,
    User,
}

impl ErrorCategory {
    /// Upper-case name used as the log category
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::Payment => "PAYMENT",
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::Authentication => "AUTHENTICATION",
            ErrorCategory::Authorization => "AUTHORIZATION",
            ErrorCategory::Configuration => "CONFIGURATION",
            ErrorCategory::System => "SYSTEM",
            ErrorCategory::User => "USER",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived severity of a classified failure (ordered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error that exposes the machine-readable hints retry policies look at.
///
/// `code` mirrors error codes such as `NETWORK_ERROR` or `TIMEOUT`,
/// `status` an HTTP-like status when the failure came from a remote service.
/// `category` is set when the error knows its own taxonomy bucket; it takes
/// precedence over the category a caller classifies under.
pub trait Failure: std::error::Error + Send + Sync {
    fn code(&self) -> Option<&str> {
        None
    }

    fn category(&self) -> Option<ErrorCategory> {
        None
    }

    fn status(&self) -> Option<u16> {
        None
    }
}

/// Ad-hoc failure built from a message and optional hints
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RawFailure {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl RawFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    /// Builder: set error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Builder: set status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl Failure for RawFailure {
    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    fn status(&self) -> Option<u16> {
        self.status
    }
}

/// Core error type for all payment operations
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Currency not supported
    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// Computed total disagrees with the amount the client is about to charge
    #[error("Amount mismatch: expected {expected:.2}, calculated {calculated:.2}")]
    AmountMismatch { expected: f64, calculated: f64 },

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request to the provider timed out
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Payment signature or verification check failed
    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),

    /// Payment was declined
    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },

    /// A payment for this order already exists
    #[error("Duplicate payment detected for order {order_id}")]
    DuplicatePayment { order_id: String },

    /// Credentials rejected by the provider
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by provider
    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Configuration(_) => 500,
            PaymentError::InvalidRequest(_) => 400,
            PaymentError::UnsupportedCurrency { .. } => 400,
            PaymentError::AmountMismatch { .. } => 409,
            PaymentError::ProviderError { .. } => 502,
            PaymentError::NetworkError(_) => 503,
            PaymentError::Timeout(_) => 504,
            PaymentError::VerificationFailed(_) => 401,
            PaymentError::PaymentDeclined { .. } => 402,
            PaymentError::DuplicatePayment { .. } => 409,
            PaymentError::Unauthorized(_) => 401,
            PaymentError::RateLimited { .. } => 429,
            PaymentError::Serialization(_) => 500,
        }
    }
}

impl Failure for PaymentError {
    fn code(&self) -> Option<&str> {
        match self {
            PaymentError::NetworkError(_) => Some("NETWORK_ERROR"),
            PaymentError::Timeout(_) => Some("TIMEOUT"),
            PaymentError::RateLimited { .. } => Some("RATE_LIMITED"),
            PaymentError::PaymentDeclined { .. } => Some("PAYMENT_DECLINED"),
            PaymentError::VerificationFailed(_) => Some("VERIFICATION_FAILED"),
            _ => None,
        }
    }

    fn category(&self) -> Option<ErrorCategory> {
        let category = match self {
            PaymentError::Configuration(_) | PaymentError::UnsupportedCurrency { .. } => {
                ErrorCategory::Configuration
            }
            PaymentError::InvalidRequest(_) => ErrorCategory::Validation,
            PaymentError::NetworkError(_)
            | PaymentError::Timeout(_)
            | PaymentError::RateLimited { .. } => ErrorCategory::Network,
            PaymentError::AmountMismatch { .. }
            | PaymentError::ProviderError { .. }
            | PaymentError::VerificationFailed(_)
            | PaymentError::PaymentDeclined { .. }
            | PaymentError::DuplicatePayment { .. } => ErrorCategory::Payment,
            PaymentError::Unauthorized(_) => ErrorCategory::Authentication,
            PaymentError::Serialization(_) => ErrorCategory::System,
        };
        Some(category)
    }

    fn status(&self) -> Option<u16> {
        match self {
            PaymentError::ProviderError { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
