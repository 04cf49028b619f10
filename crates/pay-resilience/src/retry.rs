//! # Retry Engine
//!
//! Runs an async operation under a [`RetryConfig`]: exponential backoff with
//! optional ±10% jitter, a bounded attempt budget and a retry predicate.
//! [`RetryEngine::execute_with_circuit_breaker`] adds a named breaker on top.
//!
//! ```rust,ignore
//! let outcome = engine
//!     .execute_with_retry(|| gateway.create_order(&payload), &RetryConfig::payment(), ctx)
//!     .await;
//! match outcome.result {
//!     Ok(order) => { /* ... */ }
//!     Err(failure) => show(failure.processed.user_message),
//! }
//! ```
//!
//! The engine never panics or re-raises from `execute_with_retry`; the last
//! error is routed through the [`ErrorHandler`] and returned.

use crate::circuit::{CircuitBreakerState, CircuitRegistry, FailureOutcome};
use crate::error_handler::{is_final_failure, ErrorContext, ErrorHandler, ProcessedError};
use crate::logger::{LogExtras, LogLevel, LogMetadata};
use pay_core::{ErrorCategory, Failure};
use rand::Rng;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Maximum relative perturbation applied by jitter
pub const JITTER_FRACTION: f64 = 0.1;

const RETRYABLE_CODES: &[&str] = &[
    "NETWORK_ERROR",
    "TIMEOUT",
    "ECONNRESET",
    "ETIMEDOUT",
    "RATE_LIMITED",
];

const RETRYABLE_MESSAGES: &[&str] = &[
    "network error",
    "timeout",
    "connection failed",
    "server error",
    "gateway error",
    "service unavailable",
];

/// Payment failures that must never be retried
const FINAL_PAYMENT_MESSAGES: &[&str] = &[
    "declined",
    "insufficient",
    "signature",
    "authentication",
    "unauthorized",
    "invalid card",
    "expired",
    "duplicate",
];

pub type RetryPredicate = Arc<dyn Fn(&dyn Failure) -> bool + Send + Sync>;
pub type RetryCallback = Arc<dyn Fn(u32, &dyn Failure) + Send + Sync>;
pub type ExhaustedCallback = Arc<dyn Fn(&dyn Failure) + Send + Sync>;

/// Retry on network/timeout codes, 5xx statuses or transient-sounding messages,
/// unless the message is on the handler's never-retry list
pub fn default_retry_condition(error: &dyn Failure) -> bool {
    if is_final_failure(&error.to_string()) {
        return false;
    }
    if error.code().is_some_and(|code| RETRYABLE_CODES.contains(&code)) {
        return true;
    }
    if error.status().is_some_and(|status| status >= 500) {
        return true;
    }
    let message = error.to_string().to_lowercase();
    RETRYABLE_MESSAGES.iter().any(|p| message.contains(p))
}

/// Like [`default_retry_condition`] but declines, auth and signature failures are final
pub fn payment_retry_condition(error: &dyn Failure) -> bool {
    let message = error.to_string().to_lowercase();
    if FINAL_PAYMENT_MESSAGES.iter().any(|p| message.contains(p)) {
        return false;
    }
    default_retry_condition(error)
}

/// Perturb `delay` by `unit * 10%`, where `unit` is clamped to `[-1, 1]`
pub fn jitter_delay(delay: Duration, unit: f64) -> Duration {
    let unit = if unit.is_nan() { 0.0 } else { unit.clamp(-1.0, 1.0) };
    let secs = delay.as_secs_f64() * (1.0 + JITTER_FRACTION * unit);
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(delay)
}

#[derive(Clone)]
pub struct RetryConfig {
    /// Always at least 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    /// Falls back to [`default_retry_condition`] when unset
    pub retry_condition: Option<RetryPredicate>,
    pub on_retry: Option<RetryCallback>,
    pub on_max_attempts_reached: Option<ExhaustedCallback>,
}

impl RetryConfig {
    /// Preset for payment calls: few attempts, slower backoff, strict predicate
    pub fn payment() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
            retry_condition: Some(Arc::new(payment_retry_condition)),
            on_retry: None,
            on_max_attempts_reached: None,
        }
    }

    /// Preset for idempotent reads
    pub fn network() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
            backoff_multiplier: 1.5,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retry_condition<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&dyn Failure) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Some(Arc::new(predicate));
        self
    }

    pub fn on_retry<C>(mut self, callback: C) -> Self
    where
        C: Fn(u32, &dyn Failure) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    pub fn on_max_attempts_reached<C>(mut self, callback: C) -> Self
    where
        C: Fn(&dyn Failure) + Send + Sync + 'static,
    {
        self.on_max_attempts_reached = Some(Arc::new(callback));
        self
    }

    pub fn should_retry(&self, error: &dyn Failure) -> bool {
        match &self.retry_condition {
            Some(predicate) => predicate(error),
            None => default_retry_condition(error),
        }
    }

    /// Backoff before retrying after `attempt` (1-based) failed:
    /// `base * multiplier^(attempt-1)`, clamped to `max_delay`, then jittered
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let clamped = if raw.is_finite() {
            raw.clamp(0.0, self.max_delay.as_secs_f64())
        } else {
            self.max_delay.as_secs_f64()
        };
        let delay = Duration::try_from_secs_f64(clamped).unwrap_or(self.max_delay);

        if self.jitter {
            jitter_delay(delay, rand::thread_rng().gen_range(-1.0..=1.0))
        } else {
            delay
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
            retry_condition: None,
            on_retry: None,
            on_max_attempts_reached: None,
        }
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("custom_retry_condition", &self.retry_condition.is_some())
            .finish()
    }
}

/// Identity threaded through every log line of a retried operation
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub operation: String,
    /// Category used when the final error is classified
    pub category: ErrorCategory,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub user_id: Option<String>,
    pub url: Option<String>,
}

impl RetryContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            category: ErrorCategory::Network,
            order_id: None,
            payment_id: None,
            user_id: None,
            url: None,
        }
    }

    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
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

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    fn metadata(&self) -> LogMetadata {
        LogMetadata {
            order_id: self.order_id.clone(),
            payment_id: self.payment_id.clone(),
            user_id: self.user_id.clone(),
        }
    }

    fn error_context(&self) -> ErrorContext {
        ErrorContext {
            order_id: self.order_id.clone(),
            payment_id: self.payment_id.clone(),
            user_id: self.user_id.clone(),
            component: Some("retry".to_string()),
            action: Some(self.operation.clone()),
            url: self.url.clone(),
            ..ErrorContext::new()
        }
    }
}

/// The last error of a failed operation and its classification
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RetryFailure<E> {
    pub error: E,
    pub processed: ProcessedError,
}

#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, RetryFailure<E>>,
    pub attempts: u32,
    pub total_time: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, RetryFailure<E>> {
        self.result
    }
}

/// Rejection by an open breaker; the operation was not invoked
#[derive(Debug, Clone, Error)]
#[error("Circuit breaker is open for {operation}, retry in {}s", .retry_in.as_secs())]
pub struct CircuitOpenError {
    pub operation: String,
    pub retry_in: Duration,
    pub processed: ProcessedError,
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("{0}")]
    Failed(RetryFailure<E>),

    #[error(transparent)]
    CircuitOpen(CircuitOpenError),
}

impl<E> RetryError<E> {
    pub fn processed(&self) -> &ProcessedError {
        match self {
            RetryError::Failed(failure) => &failure.processed,
            RetryError::CircuitOpen(open) => &open.processed,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RetryError::CircuitOpen(_))
    }

    /// The operation's own error, if it ran
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Failed(failure) => Some(failure.error),
            RetryError::CircuitOpen(_) => None,
        }
    }
}

impl<E> From<RetryFailure<E>> for RetryError<E> {
    fn from(failure: RetryFailure<E>) -> Self {
        RetryError::Failed(failure)
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerOptions {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub retry_config: RetryConfig,
}

impl CircuitBreakerOptions {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            retry_config: RetryConfig::default(),
        }
    }
}

/// Owns the breaker map; construct once and share via `Arc`
pub struct RetryEngine {
    handler: Arc<ErrorHandler>,
    circuits: CircuitRegistry,
    payment_config: RetryConfig,
    network_config: RetryConfig,
}

impl RetryEngine {
    pub fn new(handler: Arc<ErrorHandler>) -> Self {
        Self {
            handler,
            circuits: CircuitRegistry::new(),
            payment_config: RetryConfig::payment(),
            network_config: RetryConfig::network(),
        }
    }

    /// Builder: override the policy used by `retry_payment_operation`
    pub fn with_payment_config(mut self, config: RetryConfig) -> Self {
        self.payment_config = config;
        self
    }

    /// Builder: override the policy used by `retry_network_operation`
    pub fn with_network_config(mut self, config: RetryConfig) -> Self {
        self.network_config = config;
        self
    }

    pub fn handler(&self) -> &Arc<ErrorHandler> {
        &self.handler
    }

    pub fn payment_config(&self) -> &RetryConfig {
        &self.payment_config
    }

    /// Run `operation` until it succeeds, the predicate refuses or the budget is spent
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        mut operation: F,
        config: &RetryConfig,
        context: RetryContext,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Failure,
    {
        let started = Instant::now();
        let max_attempts = config.max_attempts.max(1);
        let logger = self.handler.logger();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        logger.log(
                            LogLevel::Info,
                            context.category.as_str(),
                            format!("{} succeeded after {} attempts", context.operation, attempt),
                            LogExtras::new().with_metadata(context.metadata()),
                        );
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        total_time: started.elapsed(),
                    };
                }
                Err(error) => error,
            };

            if !config.should_retry(&error) || attempt >= max_attempts {
                return self.fail(error, attempt, started, config, &context);
            }

            let delay = config.compute_delay(attempt);
            logger.log(
                LogLevel::Warn,
                context.category.as_str(),
                format!("Retrying {} after failure", context.operation),
                LogExtras::new()
                    .with_data(json!({
                        "operation": context.operation,
                        "attempt": attempt,
                        "max_attempts": max_attempts,
                        "delay_ms": delay.as_millis() as u64,
                        "error": error.to_string(),
                    }))
                    .with_metadata(context.metadata()),
            );
            if let Some(on_retry) = &config.on_retry {
                on_retry(attempt, &error);
            }
            drop(error);

            tokio::time::sleep(delay).await;
        }
    }

    fn fail<T, E: Failure>(
        &self,
        error: E,
        attempts: u32,
        started: Instant,
        config: &RetryConfig,
        context: &RetryContext,
    ) -> RetryOutcome<T, E> {
        let category = error.category().unwrap_or(context.category);
        let processed = self
            .handler
            .handle_error(&error, category, context.error_context());

        if let Some(on_exhausted) = &config.on_max_attempts_reached {
            on_exhausted(&error);
        }

        RetryOutcome {
            result: Err(RetryFailure { error, processed }),
            attempts,
            total_time: started.elapsed(),
        }
    }

    /// Payment policy with order and payment ids on every log line
    pub async fn retry_payment_operation<T, E, F, Fut>(
        &self,
        operation: F,
        order_id: Option<&str>,
        payment_id: Option<&str>,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Failure,
    {
        let mut context = RetryContext::new("payment").with_category(ErrorCategory::Payment);
        context.order_id = order_id.map(String::from);
        context.payment_id = payment_id.map(String::from);
        self.execute_with_retry(operation, &self.payment_config, context)
            .await
    }

    /// Network policy for idempotent requests against `url`
    pub async fn retry_network_operation<T, E, F, Fut>(
        &self,
        operation: F,
        url: &str,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Failure,
    {
        let context = RetryContext::new("network").with_url(url);
        self.execute_with_retry(operation, &self.network_config, context)
            .await
    }

    /// Retry inside the breaker named `operation_name`
    pub async fn execute_with_circuit_breaker<T, E, F, Fut>(
        &self,
        operation: F,
        operation_name: &str,
        options: &CircuitBreakerOptions,
    ) -> Result<RetryOutcome<T, E>, CircuitOpenError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Failure,
    {
        self.execute_guarded(operation, options, RetryContext::new(operation_name))
            .await
    }

    /// Like [`Self::execute_with_circuit_breaker`], with the breaker named by
    /// `context.operation` and the caller's correlation ids kept
    pub async fn execute_guarded<T, E, F, Fut>(
        &self,
        operation: F,
        options: &CircuitBreakerOptions,
        context: RetryContext,
    ) -> Result<RetryOutcome<T, E>, CircuitOpenError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Failure,
    {
        let name = context.operation.clone();

        if let Err(retry_in) = self.circuits.check(&name, options.reset_timeout) {
            let processed = self.handler.handle_message(
                format!("Circuit breaker is open for {}", name),
                ErrorCategory::System,
                context.error_context(),
            );
            return Err(CircuitOpenError {
                operation: name,
                retry_in,
                processed,
            });
        }

        let outcome = self
            .execute_with_retry(operation, &options.retry_config, context.clone())
            .await;

        if outcome.is_success() {
            self.circuits.record_success(&name);
        } else if let FailureOutcome::Opened(failures) =
            self.circuits.record_failure(&name, options.failure_threshold)
        {
            self.handler.logger().log(
                LogLevel::Error,
                "CIRCUIT_BREAKER",
                format!("Circuit breaker opened for {}", name),
                LogExtras::new()
                    .with_data(json!({
                        "operation": name,
                        "failures": failures,
                        "reset_timeout_ms": options.reset_timeout.as_millis() as u64,
                        "severity": "high",
                    }))
                    .with_metadata(context.metadata()),
            );
        }

        Ok(outcome)
    }

    /// `execute_with_retry` as a plain `Result`
    pub async fn with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        config: &RetryConfig,
        operation_name: &str,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Failure,
    {
        self.execute_with_retry(operation, config, RetryContext::new(operation_name))
            .await
            .into_result()
            .map_err(RetryError::Failed)
    }

    /// Wrap `operation` so each call is retried and yields the operation's own error
    pub fn create_retry_wrapper<F>(
        self: &Arc<Self>,
        operation: F,
        config: RetryConfig,
        name: impl Into<String>,
    ) -> RetryWrapper<F> {
        RetryWrapper {
            engine: Arc::clone(self),
            operation,
            config,
            name: name.into(),
        }
    }

    pub fn circuit_state(&self, operation_name: &str) -> Option<CircuitBreakerState> {
        self.circuits.state(operation_name)
    }

    pub fn reset_circuit(&self, operation_name: &str) {
        self.circuits.reset(operation_name);
    }
}

/// Retrying adapter returned by [`RetryEngine::create_retry_wrapper`]
pub struct RetryWrapper<F> {
    engine: Arc<RetryEngine>,
    operation: F,
    config: RetryConfig,
    name: String,
}

impl<F> RetryWrapper<F> {
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        A: Clone,
        Fut: Future<Output = Result<T, E>>,
        E: Failure,
    {
        self.engine
            .execute_with_retry(
                || (self.operation)(args.clone()),
                &self.config,
                RetryContext::new(self.name.clone()),
            )
            .await
            .into_result()
            .map_err(|failure| failure.error)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::StructuredLogger;
    use pay_core::{PaymentError, RawFailure};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn engine() -> RetryEngine {
        let logger = Arc::new(StructuredLogger::default());
        RetryEngine::new(Arc::new(ErrorHandler::new(logger)))
    }

    fn no_jitter() -> RetryConfig {
        RetryConfig::default()
            .with_jitter(false)
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(10))
    }

    #[test]
    fn test_backoff_is_monotonic_until_max() {
        let config = no_jitter();
        let delays: Vec<_> = (1..=6).map(|a| config.compute_delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_network_preset_uses_multiplicative_factor() {
        let config = RetryConfig::network().with_jitter(false);
        assert_eq!(config.compute_delay(1), Duration::from_secs(1));
        assert_eq!(config.compute_delay(2), Duration::from_millis(1500));
        assert_eq!(config.compute_delay(3), Duration::from_millis(2250));
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let config = no_jitter().with_jitter(true);
        for attempt in 1..=5 {
            let base = no_jitter().compute_delay(attempt).as_secs_f64();
            for _ in 0..200 {
                let jittered = config.compute_delay(attempt).as_secs_f64();
                assert!(jittered >= base * 0.9 - 1e-6, "{} < {}", jittered, base * 0.9);
                assert!(jittered <= base * 1.1 + 1e-6, "{} > {}", jittered, base * 1.1);
            }
        }
    }

    fn assert_close(actual: Duration, expected: Duration) {
        let diff = actual.as_secs_f64() - expected.as_secs_f64();
        assert!(diff.abs() < 1e-6, "{:?} != {:?}", actual, expected);
    }

    #[test]
    fn test_jitter_delay_bounds() {
        let delay = Duration::from_secs(10);
        assert_close(jitter_delay(delay, 1.0), Duration::from_secs(11));
        assert_close(jitter_delay(delay, -1.0), Duration::from_secs(9));
        assert_close(jitter_delay(delay, 7.0), Duration::from_secs(11));
        assert_eq!(jitter_delay(Duration::ZERO, -1.0), Duration::ZERO);
    }

    #[test]
    fn test_default_condition() {
        assert!(default_retry_condition(&RawFailure::new("x").with_code("ETIMEDOUT")));
        assert!(default_retry_condition(&RawFailure::new("x").with_status(503)));
        assert!(default_retry_condition(&RawFailure::new("Service Unavailable")));
        assert!(default_retry_condition(&PaymentError::Timeout("orders".into())));
        assert!(!default_retry_condition(&RawFailure::new("bad request").with_status(400)));
        assert!(!default_retry_condition(
            &RawFailure::new("Invalid signature").with_status(502)
        ));
        assert!(!default_retry_condition(
            &RawFailure::new("forbidden").with_code("TIMEOUT")
        ));
    }

    #[test]
    fn test_payment_condition_excludes_final_failures() {
        let declined_5xx = RawFailure::new("card declined").with_status(502);
        assert!(default_retry_condition(&declined_5xx));
        assert!(!payment_retry_condition(&declined_5xx));
        assert!(!payment_retry_condition(&RawFailure::new("invalid signature").with_code("TIMEOUT")));
        assert!(payment_retry_condition(&RawFailure::new("gateway error")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let engine = engine();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = engine
            .execute_with_retry(
                move || {
                    let counter = counter.clone();
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 3 {
                            Err(PaymentError::NetworkError("connection reset".into()))
                        } else {
                            Ok(n)
                        }
                    }
                },
                &no_jitter(),
                RetryContext::new("fetch_products"),
            )
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result.unwrap(), 3);
        assert!(outcome.total_time >= Duration::from_secs(3));
        assert!(outcome.total_time < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_attempt_budget() {
        let engine = engine();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let config = no_jitter().with_max_attempts(4);

        let outcome: RetryOutcome<(), _> = engine
            .execute_with_retry(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(RawFailure::new("server error").with_status(500)) }
                },
                &config,
                RetryContext::new("always_fails"),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.attempts, 4);
        let failure = outcome.result.unwrap_err();
        assert_eq!(failure.processed.category, ErrorCategory::Network);
        assert_eq!(failure.error.status, Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_stops_after_one_attempt() {
        let engine = engine();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome: RetryOutcome<(), _> = engine
            .retry_payment_operation(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(RawFailure::new("invalid signature").with_status(502)) }
                },
                Some("order_77"),
                None,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts, 1);
        let failure = outcome.result.unwrap_err();
        assert_eq!(failure.processed.category, ErrorCategory::Payment);
        assert_eq!(failure.processed.context.order_id.as_deref(), Some("order_77"));
        assert!(!failure.processed.retryable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_retry_list_wins_over_server_status() {
        let engine = engine();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome: RetryOutcome<(), _> = engine
            .execute_with_retry(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(RawFailure::new("invalid signature").with_status(502)) }
                },
                &no_jitter(),
                RetryContext::new("verify_payment"),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.result.unwrap_err().processed.retryable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_operation_spends_five_attempts() {
        let engine = engine();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let url = "https://shop.example/api/v1/products";

        let outcome: RetryOutcome<Vec<String>, _> = engine
            .retry_network_operation(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(RawFailure::new("service unavailable").with_status(503)) }
                },
                url,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(outcome.attempts, 5);
        let failure = outcome.result.unwrap_err();
        assert_eq!(failure.processed.category, ErrorCategory::Network);
        assert_eq!(failure.processed.context.url.as_deref(), Some(url));
        assert!(failure.processed.retryable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callbacks_fire() {
        let engine = engine();
        let retries = Arc::new(Mutex::new(Vec::new()));
        let exhausted = Arc::new(AtomicU32::new(0));
        let (r, x) = (retries.clone(), exhausted.clone());

        let config = no_jitter()
            .with_max_attempts(3)
            .on_retry(move |attempt, _| r.lock().unwrap().push(attempt))
            .on_max_attempts_reached(move |_| {
                x.fetch_add(1, Ordering::SeqCst);
            });

        let outcome: RetryOutcome<(), _> = engine
            .execute_with_retry(
                || async { Err(RawFailure::new("timeout")) },
                &config,
                RetryContext::new("callbacks"),
            )
            .await;

        assert!(!outcome.is_success());
        assert_eq!(*retries.lock().unwrap(), vec![1, 2]);
        assert_eq!(exhausted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_logs_carry_payment_context() {
        let engine = engine().with_payment_config(RetryConfig::payment().with_jitter(false));

        let _: RetryOutcome<(), _> = engine
            .retry_payment_operation(
                || async { Err(PaymentError::Timeout("orders".into())) },
                Some("order_5"),
                Some("pay_5"),
            )
            .await;

        let logger = engine.handler().logger();
        let retry_lines: Vec<_> = logger
            .entries_for_category("PAYMENT")
            .into_iter()
            .filter(|e| e.message.starts_with("Retrying"))
            .collect();
        assert_eq!(retry_lines.len(), 2);
        assert!(retry_lines
            .iter()
            .all(|e| e.metadata.order_id.as_deref() == Some("order_5")
                && e.metadata.payment_id.as_deref() == Some("pay_5")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_trips_and_recovers() {
        let engine = engine();
        let calls = Arc::new(AtomicU32::new(0));
        let options = CircuitBreakerOptions::default()
            .with_failure_threshold(2)
            .with_reset_timeout(Duration::from_secs(60))
            .with_retry_config(no_jitter().with_max_attempts(1));

        let failing = |calls: Arc<AtomicU32>| {
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RawFailure::new("service unavailable")) }
            }
        };

        for _ in 0..2 {
            let outcome = engine
                .execute_with_circuit_breaker(failing(calls.clone()), "X", &options)
                .await
                .unwrap();
            assert!(!outcome.is_success());
        }
        assert!(engine.circuit_state("X").unwrap().is_open);

        let rejected = engine
            .execute_with_circuit_breaker(failing(calls.clone()), "X", &options)
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(rejected.operation, "X");
        assert!(rejected.processed.requires_halt());

        tokio::time::advance(Duration::from_secs(61)).await;
        let outcome = engine
            .execute_with_circuit_breaker(|| async { Ok::<_, RawFailure>(42) }, "X", &options)
            .await
            .unwrap();
        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(engine.circuit_state("X").unwrap().failures, 0);

        let opened = engine
            .handler()
            .logger()
            .entries_for_category("CIRCUIT_BREAKER");
        assert_eq!(opened.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_circuit_allows_calls() {
        let engine = engine();
        let options = CircuitBreakerOptions::default()
            .with_failure_threshold(1)
            .with_retry_config(no_jitter().with_max_attempts(1));

        let _ = engine
            .execute_with_circuit_breaker(
                || async { Err::<(), _>(RawFailure::new("timeout")) },
                "Y",
                &options,
            )
            .await;
        assert!(engine
            .execute_with_circuit_breaker(|| async { Ok::<_, RawFailure>(()) }, "Y", &options)
            .await
            .is_err());

        engine.reset_circuit("Y");
        assert!(engine.circuit_state("Y").is_none());
        assert!(engine
            .execute_with_circuit_breaker(|| async { Ok::<_, RawFailure>(()) }, "Y", &options)
            .await
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_wrapper_returns_value_or_inner_error() {
        let engine = Arc::new(engine());
        let wrapper = engine.create_retry_wrapper(
            |amount: i64| async move {
                if amount > 0 {
                    Ok(amount * 100)
                } else {
                    Err(PaymentError::InvalidRequest("amount must be positive".into()))
                }
            },
            no_jitter(),
            "to_minor_units",
        );

        assert_eq!(wrapper.call(12).await.unwrap(), 1200);
        let err = wrapper.call(-1).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
        assert_eq!(wrapper.name(), "to_minor_units");
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_maps_to_retry_error() {
        let engine = engine();
        let err = engine
            .with_retry(
                || async { Err::<(), _>(RawFailure::new("forbidden").with_status(403)) },
                &no_jitter(),
                "admin_call",
            )
            .await
            .unwrap_err();

        assert!(!err.is_circuit_open());
        assert_eq!(err.processed().message, "forbidden");
        assert_eq!(err.into_inner().unwrap().status, Some(403));
    }
}
