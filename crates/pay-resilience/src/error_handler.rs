//! # Error Classifier / Handler
//!
//! Turns any failure into a [`ProcessedError`]: a category, a derived
//! severity, a user-safe message, a retryability decision and an optional
//! retry delay hint. Classification is pure and table driven; handling adds
//! three side effects on top of it:
//!
//! 1. the error is written to the [`StructuredLogger`]
//! 2. a per `category:message` frequency counter is bumped, and a spike is
//!    logged when a key repeats too often in a short window
//! 3. verification failures and authentication errors raise security events

use crate::logger::{
    render_causes, LogExtras, LogLevel, LogMetadata, LoggedError, RiskLevel, SecurityOutcome,
    StructuredLogger,
};
use chrono::{DateTime, Utc};
use pay_core::{ErrorCategory, ErrorSeverity};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Base unit for suggested retry delays
pub const RETRY_DELAY_UNIT: Duration = Duration::from_secs(1);

/// Upper bound for suggested retry delays
pub const MAX_SUGGESTED_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Payment messages that always classify as critical
const CRITICAL_PAYMENT_PATTERNS: &[&str] = &[
    "signature",
    "verification",
    "duplicate payment",
    "amount mismatch",
    "currency mismatch",
];

/// Messages that are never retryable, whatever their category
const NON_RETRYABLE_PATTERNS: &[&str] = &[
    "invalid signature",
    "authentication failed",
    "unauthorized",
    "forbidden",
    "payment declined",
    "insufficient funds",
    "expired card",
    "invalid card",
    "duplicate payment",
];

/// Payment messages that indicate a transient failure
const TRANSIENT_PAYMENT_PATTERNS: &[&str] = &[
    "timeout",
    "network error",
    "server error",
    "gateway error",
    "temporary",
];

struct SeverityRule {
    applies: fn(ErrorCategory, &str) -> bool,
    severity: ErrorSeverity,
}

fn is_critical_payment(category: ErrorCategory, message: &str) -> bool {
    category == ErrorCategory::Payment
        && CRITICAL_PAYMENT_PATTERNS.iter().any(|p| message.contains(p))
}

fn is_access_control(category: ErrorCategory, _: &str) -> bool {
    matches!(
        category,
        ErrorCategory::Authentication | ErrorCategory::Authorization
    )
}

fn is_platform(category: ErrorCategory, _: &str) -> bool {
    matches!(category, ErrorCategory::System | ErrorCategory::Configuration)
}

fn is_network(category: ErrorCategory, _: &str) -> bool {
    category == ErrorCategory::Network
}

fn is_caller_mistake(category: ErrorCategory, _: &str) -> bool {
    matches!(category, ErrorCategory::Validation | ErrorCategory::User)
}

/// Evaluated top to bottom; the first match wins
const SEVERITY_RULES: &[SeverityRule] = &[
    SeverityRule {
        applies: is_critical_payment,
        severity: ErrorSeverity::Critical,
    },
    SeverityRule {
        applies: is_access_control,
        severity: ErrorSeverity::High,
    },
    SeverityRule {
        applies: is_platform,
        severity: ErrorSeverity::High,
    },
    SeverityRule {
        applies: is_network,
        severity: ErrorSeverity::Medium,
    },
    SeverityRule {
        applies: is_caller_mistake,
        severity: ErrorSeverity::Low,
    },
];

struct MessageRule {
    category: ErrorCategory,
    keywords: &'static [&'static str],
    message: &'static str,
}

pub const PAYMENT_VERIFICATION_MESSAGE: &str = "We couldn't verify your payment. If money was deducted, it will be refunded within 5-7 business days.";

/// Keyword driven user messages, evaluated top to bottom
const USER_MESSAGE_RULES: &[MessageRule] = &[
    MessageRule {
        category: ErrorCategory::Payment,
        keywords: &["network", "timeout"],
        message: "We couldn't reach the payment service. Please check your connection and try again.",
    },
    MessageRule {
        category: ErrorCategory::Payment,
        keywords: &["declined", "insufficient"],
        message: "Your payment was declined. Please try another payment method or contact your bank.",
    },
    MessageRule {
        category: ErrorCategory::Payment,
        keywords: &["expired"],
        message: "Your card has expired. Please use a different card.",
    },
    MessageRule {
        category: ErrorCategory::Payment,
        keywords: &["verification", "signature"],
        message: PAYMENT_VERIFICATION_MESSAGE,
    },
    MessageRule {
        category: ErrorCategory::Network,
        keywords: &["timeout"],
        message: "The request took too long to complete. Please try again.",
    },
    MessageRule {
        category: ErrorCategory::Network,
        keywords: &["offline", "connection"],
        message: "You appear to be offline. Please check your internet connection.",
    },
];

fn fallback_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Network => "A network problem occurred. Please try again in a moment.",
        ErrorCategory::Payment => "We couldn't process your payment. Please try again.",
        ErrorCategory::Validation => "Some of the information provided is invalid. Please review it and try again.",
        ErrorCategory::Authentication => "Your session has expired. Please sign in again.",
        ErrorCategory::Authorization => "You don't have permission to perform this action.",
        ErrorCategory::Configuration => "The service is temporarily unavailable. Please try again later.",
        ErrorCategory::System => "Something went wrong on our side. Please try again shortly.",
        ErrorCategory::User => "Please check your input and try again.",
    }
}

/// Derive severity from category and message
pub fn derive_severity(category: ErrorCategory, message: &str) -> ErrorSeverity {
    let lower = message.to_lowercase();
    SEVERITY_RULES
        .iter()
        .find(|rule| (rule.applies)(category, &lower))
        .map(|rule| rule.severity)
        .unwrap_or(ErrorSeverity::Medium)
}

/// Non-technical message safe to show an end user
pub fn user_message(category: ErrorCategory, message: &str) -> &'static str {
    let lower = message.to_lowercase();
    USER_MESSAGE_RULES
        .iter()
        .filter(|rule| rule.category == category)
        .find(|rule| rule.keywords.iter().any(|k| lower.contains(k)))
        .map(|rule| rule.message)
        .unwrap_or_else(|| fallback_message(category))
}

/// True when the message names a failure that must never be retried
pub fn is_final_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    NON_RETRYABLE_PATTERNS.iter().any(|p| lower.contains(p))
}

pub fn is_retryable(category: ErrorCategory, message: &str) -> bool {
    if is_final_failure(message) {
        return false;
    }
    let lower = message.to_lowercase();

    match category {
        ErrorCategory::Network | ErrorCategory::System => true,
        ErrorCategory::Payment => TRANSIENT_PAYMENT_PATTERNS.iter().any(|p| lower.contains(p)),
        _ => false,
    }
}

/// Suggested wait before a retry, scaled by category
pub fn suggested_retry_delay(category: ErrorCategory) -> Duration {
    let factor = match category {
        ErrorCategory::Network => 2,
        ErrorCategory::Payment => 3,
        ErrorCategory::System => 5,
        _ => 1,
    };
    (RETRY_DELAY_UNIT * factor).min(MAX_SUGGESTED_RETRY_DELAY)
}

/// Where and on whose behalf an error happened
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            order_id: None,
            payment_id: None,
            user_id: None,
            component: None,
            action: None,
            url: None,
            user_agent: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_payment_id(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    fn metadata(&self) -> LogMetadata {
        LogMetadata {
            order_id: self.order_id.clone(),
            payment_id: self.payment_id.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A classified failure. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedError {
    pub id: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    pub user_message: String,
    /// Debug rendering of the original error
    pub original: String,
    pub context: ErrorContext,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ProcessedError {
    /// High and critical errors must stop the transaction at the caller
    pub fn requires_halt(&self) -> bool {
        self.severity >= ErrorSeverity::High
    }
}

impl std::fmt::Display for ProcessedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}] {}", self.category, self.severity, self.message)
    }
}

impl std::error::Error for ProcessedError {}

/// Repeat detector settings
#[derive(Debug, Clone, Copy)]
pub struct SpikeDetector {
    /// A key counts as spiking once its count exceeds this
    pub threshold: u32,

    /// ...and its previous occurrence was less than this long ago
    pub window: Duration,
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self {
            threshold: 5,
            window: Duration::from_secs(5 * 60),
        }
    }
}

struct FrequencyRecord {
    count: u32,
    last_seen: Instant,
}

/// Occurrence count for one `category:message` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyStat {
    pub key: String,
    pub count: u32,
}

pub struct ErrorHandler {
    logger: Arc<StructuredLogger>,
    spike: SpikeDetector,
    frequency: Mutex<HashMap<String, FrequencyRecord>>,
}

impl ErrorHandler {
    pub fn new(logger: Arc<StructuredLogger>) -> Self {
        Self {
            logger,
            spike: SpikeDetector::default(),
            frequency: Mutex::new(HashMap::new()),
        }
    }

    /// Builder: override spike detection settings
    pub fn with_spike_detector(mut self, spike: SpikeDetector) -> Self {
        self.spike = spike;
        self
    }

    pub fn logger(&self) -> &Arc<StructuredLogger> {
        &self.logger
    }

    /// Classify, log and track an error
    pub fn handle_error<E>(
        &self,
        error: &E,
        category: ErrorCategory,
        context: ErrorContext,
    ) -> ProcessedError
    where
        E: std::error::Error + ?Sized,
    {
        let message = error.to_string();
        let retryable = is_retryable(category, &message);
        let processed = ProcessedError {
            id: format!("err_{}", Uuid::new_v4().simple()),
            category,
            severity: derive_severity(category, &message),
            user_message: user_message(category, &message).to_string(),
            original: format!("{:?}", error),
            retryable,
            retry_after: retryable.then(|| suggested_retry_delay(category)),
            timestamp: Utc::now(),
            stack: render_causes(error.source()),
            message,
            context,
        };

        self.log_processed(&processed);
        self.track_frequency(&processed);
        self.raise_security_events(&processed);

        processed
    }

    /// Handle a bare message
    pub fn handle_message(
        &self,
        message: impl Into<String>,
        category: ErrorCategory,
        context: ErrorContext,
    ) -> ProcessedError {
        let failure = pay_core::RawFailure::new(message);
        self.handle_error(&failure, category, context)
    }

    pub fn handle_payment_error<E>(
        &self,
        error: &E,
        order_id: Option<&str>,
        payment_id: Option<&str>,
    ) -> ProcessedError
    where
        E: std::error::Error + ?Sized,
    {
        let mut context = ErrorContext::new().with_component("payment");
        context.order_id = order_id.map(String::from);
        context.payment_id = payment_id.map(String::from);
        self.handle_error(error, ErrorCategory::Payment, context)
    }

    pub fn handle_network_error<E>(&self, error: &E, url: Option<&str>) -> ProcessedError
    where
        E: std::error::Error + ?Sized,
    {
        let mut context = ErrorContext::new().with_component("network");
        context.url = url.map(String::from);
        self.handle_error(error, ErrorCategory::Network, context)
    }

    pub fn handle_validation_error<E>(&self, error: &E, component: &str) -> ProcessedError
    where
        E: std::error::Error + ?Sized,
    {
        let context = ErrorContext::new().with_component(component);
        self.handle_error(error, ErrorCategory::Validation, context)
    }

    /// Current occurrence counts, most frequent first
    pub fn frequency_snapshot(&self) -> Vec<FrequencyStat> {
        let mut stats: Vec<_> = self
            .lock_frequency()
            .iter()
            .map(|(key, record)| FrequencyStat {
                key: key.clone(),
                count: record.count,
            })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        stats
    }

    pub fn reset_frequency(&self) {
        self.lock_frequency().clear();
    }

    fn lock_frequency(&self) -> MutexGuard<'_, HashMap<String, FrequencyRecord>> {
        self.frequency.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log_processed(&self, error: &ProcessedError) {
        let level = match error.severity {
            ErrorSeverity::Low => LogLevel::Info,
            ErrorSeverity::Medium => LogLevel::Warn,
            ErrorSeverity::High | ErrorSeverity::Critical => LogLevel::Error,
        };

        let extras = LogExtras::new()
            .with_data(json!({
                "error_id": error.id,
                "severity": error.severity,
                "retryable": error.retryable,
                "retry_after_ms": error.retry_after.map(|d| d.as_millis() as u64),
                "user_message": error.user_message,
                "component": error.context.component,
                "action": error.context.action,
                "url": error.context.url,
            }))
            .with_logged_error(LoggedError {
                message: error.original.clone(),
                stack: error.stack.clone(),
            })
            .with_metadata(error.context.metadata());

        self.logger
            .log(level, error.category.as_str(), error.message.clone(), extras);
    }

    fn track_frequency(&self, error: &ProcessedError) {
        let key = format!("{}:{}", error.category, error.message);
        let now = Instant::now();

        let spiking = {
            let mut frequency = self.lock_frequency();
            // keys quiet for a whole window can no longer spike
            frequency
                .retain(|_, r| now.saturating_duration_since(r.last_seen) < self.spike.window);
            let record = frequency.entry(key.clone()).or_insert(FrequencyRecord {
                count: 0,
                last_seen: now,
            });
            let since_last = now.saturating_duration_since(record.last_seen);
            record.count += 1;
            record.last_seen = now;
            (record.count > self.spike.threshold && since_last < self.spike.window)
                .then_some(record.count)
        };

        if let Some(count) = spiking {
            self.logger.log(
                LogLevel::Error,
                "SYSTEM",
                "Error spike detected",
                LogExtras::new()
                    .with_data(json!({
                        "key": key,
                        "count": count,
                        "severity": ErrorSeverity::Critical,
                        "error_id": error.id,
                    }))
                    .with_metadata(error.context.metadata()),
            );
        }
    }

    fn raise_security_events(&self, error: &ProcessedError) {
        let data = json!({
            "error_id": error.id,
            "order_id": error.context.order_id,
            "payment_id": error.context.payment_id,
            "user_id": error.context.user_id,
        });

        if error.category == ErrorCategory::Payment
            && error.message.to_lowercase().contains("verification")
        {
            self.logger.security(
                "payment_verification_failed",
                SecurityOutcome::Failure,
                RiskLevel::High,
                error.message.clone(),
                Some(data),
            );
        } else if error.category == ErrorCategory::Authentication {
            self.logger.security(
                "authentication_failed",
                SecurityOutcome::Failure,
                RiskLevel::Medium,
                error.message.clone(),
                Some(data),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use pay_core::PaymentError;

    fn handler() -> ErrorHandler {
        ErrorHandler::new(Arc::new(StructuredLogger::new(LoggerConfig::default())))
    }

    #[test]
    fn test_severity_cascade_order() {
        use ErrorCategory::*;

        assert_eq!(derive_severity(Payment, "Invalid signature"), ErrorSeverity::Critical);
        assert_eq!(derive_severity(Payment, "Amount mismatch: 10 vs 12"), ErrorSeverity::Critical);
        assert_eq!(derive_severity(Payment, "card declined"), ErrorSeverity::Medium);
        assert_eq!(derive_severity(Authentication, "signature"), ErrorSeverity::High);
        assert_eq!(derive_severity(Authorization, "nope"), ErrorSeverity::High);
        assert_eq!(derive_severity(Configuration, "missing key"), ErrorSeverity::High);
        assert_eq!(derive_severity(System, "panic"), ErrorSeverity::High);
        assert_eq!(derive_severity(Network, "timeout"), ErrorSeverity::Medium);
        assert_eq!(derive_severity(Validation, "bad input"), ErrorSeverity::Low);
        assert_eq!(derive_severity(User, "cancelled"), ErrorSeverity::Low);
    }

    #[test]
    fn test_user_messages() {
        use ErrorCategory::*;

        assert_eq!(
            user_message(Payment, "Signature verification failed"),
            PAYMENT_VERIFICATION_MESSAGE
        );
        assert!(user_message(Payment, "Card DECLINED by issuer").contains("declined"));
        assert!(user_message(Payment, "card expired").contains("expired"));
        assert!(user_message(Payment, "gateway timeout").contains("reach the payment service"));
        assert!(user_message(Network, "connection refused").contains("offline"));
        assert_eq!(user_message(System, "NullPointer at 0x0"), fallback_message(System));
    }

    #[test]
    fn test_retryability() {
        use ErrorCategory::*;

        assert!(is_retryable(Network, "socket hang up"));
        assert!(is_retryable(System, "out of memory"));
        assert!(!is_retryable(Network, "403 Forbidden"));
        assert!(!is_retryable(System, "invalid signature"));
        assert!(is_retryable(Payment, "Gateway error from provider"));
        assert!(!is_retryable(Payment, "bad amount"));
        assert!(!is_retryable(Payment, "Payment declined: insufficient funds"));
        assert!(!is_retryable(Validation, "timeout"));
    }

    #[test]
    fn test_suggested_delay_scales_by_category() {
        assert_eq!(suggested_retry_delay(ErrorCategory::Network), Duration::from_secs(2));
        assert_eq!(suggested_retry_delay(ErrorCategory::Payment), Duration::from_secs(3));
        assert_eq!(suggested_retry_delay(ErrorCategory::System), Duration::from_secs(5));
        assert_eq!(suggested_retry_delay(ErrorCategory::User), Duration::from_secs(1));
    }

    #[test]
    fn test_handle_error_builds_processed_error() {
        let handler = handler();
        let err = PaymentError::Timeout("create order".into());
        let processed = handler.handle_payment_error(&err, Some("order_1"), None);

        assert!(processed.id.starts_with("err_"));
        assert_eq!(processed.category, ErrorCategory::Payment);
        assert_eq!(processed.severity, ErrorSeverity::Medium);
        assert!(processed.retryable);
        assert_eq!(processed.retry_after, Some(Duration::from_secs(3)));
        assert!(!processed.requires_halt());
        assert_eq!(processed.context.order_id.as_deref(), Some("order_1"));

        let logged = handler.logger().entries_for_category("PAYMENT");
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].level, LogLevel::Warn);
        assert_eq!(logged[0].metadata.order_id.as_deref(), Some("order_1"));
    }

    #[test]
    fn test_non_retryable_has_no_delay() {
        let handler = handler();
        let processed = handler.handle_message(
            "Payment declined: do not honor",
            ErrorCategory::Payment,
            ErrorContext::new(),
        );
        assert!(!processed.retryable);
        assert_eq!(processed.retry_after, None);
    }

    #[test]
    fn test_verification_failure_raises_security_event() {
        let handler = handler();
        let err = PaymentError::VerificationFailed("signature mismatch".into());
        let processed = handler.handle_payment_error(&err, Some("order_9"), Some("pay_9"));

        assert_eq!(processed.severity, ErrorSeverity::Critical);
        assert!(processed.requires_halt());
        assert_eq!(processed.user_message, PAYMENT_VERIFICATION_MESSAGE);

        let security = handler.logger().security_entries();
        assert_eq!(security.len(), 1);
        assert_eq!(security[0].risk_level, RiskLevel::High);
        assert_eq!(security[0].action, "payment_verification_failed");
    }

    #[test]
    fn test_authentication_raises_medium_security_event() {
        let handler = handler();
        handler.handle_message("token rejected", ErrorCategory::Authentication, ErrorContext::new());

        let security = handler.logger().security_entries();
        assert_eq!(security.len(), 1);
        assert_eq!(security[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_spike_detected_after_threshold() {
        let handler = handler();
        for _ in 0..5 {
            handler.handle_message("upstream 502", ErrorCategory::Network, ErrorContext::new());
        }
        assert!(handler
            .logger()
            .entries()
            .iter()
            .all(|e| e.message != "Error spike detected"));

        handler.handle_message("upstream 502", ErrorCategory::Network, ErrorContext::new());
        let spikes: Vec<_> = handler
            .logger()
            .entries()
            .into_iter()
            .filter(|e| e.message == "Error spike detected")
            .collect();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].data.as_ref().unwrap()["count"], 6);

        let stats = handler.frequency_snapshot();
        assert_eq!(stats[0].key, "NETWORK:upstream 502");
        assert_eq!(stats[0].count, 6);

        handler.reset_frequency();
        assert!(handler.frequency_snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_keys_are_evicted_after_window() {
        let handler = handler().with_spike_detector(SpikeDetector {
            threshold: 5,
            window: Duration::from_secs(60),
        });

        for _ in 0..3 {
            handler.handle_message(
                "Amount mismatch: expected 10",
                ErrorCategory::Payment,
                ErrorContext::new(),
            );
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        handler.handle_message("upstream 502", ErrorCategory::Network, ErrorContext::new());
        assert_eq!(handler.frequency_snapshot().len(), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        handler.handle_message("upstream 502", ErrorCategory::Network, ErrorContext::new());

        let stats = handler.frequency_snapshot();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].key, "NETWORK:upstream 502");
        assert_eq!(stats[0].count, 2);
    }

    #[test]
    fn test_validation_errors_are_low_and_final() {
        let handler = handler();
        let err = PaymentError::InvalidRequest("quantity must be at least 1".into());
        let processed = handler.handle_validation_error(&err, "cart_form");

        assert_eq!(processed.category, ErrorCategory::Validation);
        assert_eq!(processed.severity, ErrorSeverity::Low);
        assert!(!processed.retryable);
        assert_eq!(processed.retry_after, None);
        assert_eq!(processed.context.component.as_deref(), Some("cart_form"));
        assert!(handler.logger().security_entries().is_empty());
    }

    #[test]
    fn test_stack_from_source_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("order call failed")]
        struct Wrapped(#[source] PaymentError);

        let handler = handler();
        let err = Wrapped(PaymentError::NetworkError("reset by peer".into()));
        let processed = handler.handle_network_error(&err, Some("https://api.example.com/orders"));

        assert_eq!(
            processed.stack.as_deref(),
            Some("caused by: Network error: reset by peer")
        );
        assert_eq!(
            processed.context.url.as_deref(),
            Some("https://api.example.com/orders")
        );
    }
}
