//! # pay-resilience
//!
//! Everything that stands between a validated cart and the money moving.
//!
//! - [`StructuredLogger`]: categorized entries, redaction, ring buffer, remote shipping
//! - [`ErrorHandler`]: failure taxonomy, severity, user-safe messages, spike detection
//! - [`RetryEngine`]: backoff with jitter, retry predicates, named circuit breakers
//! - [`CheckoutGuard`]: validate → discount → reconcile → create order
//!
//! All services are constructed explicitly and shared via `Arc`:
//!
//! ```rust,ignore
//! let logger = Arc::new(StructuredLogger::from_env()?);
//! let handler = Arc::new(ErrorHandler::new(logger.clone()));
//! let engine = Arc::new(RetryEngine::new(handler));
//! let guard = CheckoutGuard::new(reconciler, gateway, engine);
//!
//! let session = guard.checkout(&request).await?;
//! ```

pub mod checkout;
pub mod circuit;
pub mod config;
pub mod error_handler;
pub mod logger;
pub mod redact;
pub mod retry;

pub use checkout::{CheckoutError, CheckoutGuard, CheckoutRequest, CheckoutSession, CREATE_ORDER_CIRCUIT};
pub use circuit::{CircuitBreakerState, CircuitStatus};
pub use config::{Environment, LoggerConfig};
pub use error_handler::{ErrorContext, ErrorHandler, FrequencyStat, ProcessedError, SpikeDetector};
pub use logger::{
    HttpLogSink, LogEntry, LogExtras, LogLevel, LogMetadata, LogRecord, LogSink, LoggedError,
    RiskLevel, SecurityLogEntry, SecurityOutcome, StructuredLogger,
};
pub use redact::redact;
pub use retry::{
    CircuitBreakerOptions, CircuitOpenError, RetryConfig, RetryContext, RetryEngine, RetryError,
    RetryFailure, RetryOutcome, RetryWrapper,
};
