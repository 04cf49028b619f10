//! # Structured Logger
//!
//! Process-wide sink for diagnostic and security events.
//!
//! - Entries below the configured threshold are dropped.
//! - Every payload is redacted before it is stored (see [`crate::redact`]).
//! - Entries live in a bounded ring buffer; the oldest are evicted first.
//! - In development every entry is mirrored to `tracing`; elsewhere only
//!   warnings and above are.
//! - In production, `error` entries are shipped to the remote sink.
//!   Security events are always shipped.
//!
//! Logging never panics and never returns an error to the caller.

use crate::config::LoggerConfig;
use crate::redact::redact;
use chrono::{SecondsFormat, Utc};
use pay_core::PaymentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Client IP recorded for security events when the real one is unknowable
pub const UNKNOWN_CLIENT_IP: &str = "client-side";

/// Log severity (ordered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation fields attached to an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Error captured on an entry: its message plus the rendered source chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl LoggedError {
    pub fn from_error(err: &(dyn std::error::Error + '_)) -> Self {
        Self {
            message: err.to_string(),
            stack: source_chain(err),
        }
    }
}

/// Render the `source()` chain of an error, outermost cause first
pub fn source_chain(err: &(dyn std::error::Error + '_)) -> Option<String> {
    render_causes(err.source())
}

/// Render a cause chain starting at `first`
pub fn render_causes(first: Option<&(dyn std::error::Error + 'static)>) -> Option<String> {
    let mut causes = Vec::new();
    let mut current = first;
    while let Some(cause) = current {
        causes.push(format!("caused by: {}", cause));
        current = cause.source();
    }
    if causes.is_empty() {
        None
    } else {
        Some(causes.join("\n"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO-8601 timestamp
    pub timestamp: String,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<LoggedError>,
    pub session_id: String,
    #[serde(flatten)]
    pub metadata: LogMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityOutcome {
    Success,
    Failure,
    Suspicious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityLogEntry {
    #[serde(flatten)]
    pub entry: LogEntry,
    pub action: String,
    pub outcome: SecurityOutcome,
    pub risk_level: RiskLevel,
    pub ip_address: String,
    pub user_agent: String,
}

/// A stored entry of either kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogRecord {
    Security(SecurityLogEntry),
    Standard(LogEntry),
}

impl LogRecord {
    pub fn entry(&self) -> &LogEntry {
        match self {
            LogRecord::Security(s) => &s.entry,
            LogRecord::Standard(e) => e,
        }
    }
}

/// Optional parts of a log call
#[derive(Debug, Clone, Default)]
pub struct LogExtras {
    pub data: Option<Value>,
    pub error: Option<LoggedError>,
    pub metadata: LogMetadata,
}

impl LogExtras {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: attach a structured payload (redacted on store)
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Builder: attach an error
    pub fn with_error(mut self, err: &(dyn std::error::Error + '_)) -> Self {
        self.error = Some(LoggedError::from_error(err));
        self
    }

    /// Builder: attach an already captured error
    pub fn with_logged_error(mut self, err: LoggedError) -> Self {
        self.error = Some(err);
        self
    }

    pub fn with_metadata(mut self, metadata: LogMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.metadata.order_id = Some(order_id.into());
        self
    }

    pub fn with_payment_id(mut self, payment_id: impl Into<String>) -> Self {
        self.metadata.payment_id = Some(payment_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.metadata.user_id = Some(user_id.into());
        self
    }
}

/// Destination for shipped entries. Shipping is fire-and-forget.
pub trait LogSink: Send + Sync {
    fn ship(&self, payload: Value);
}

/// Ships entries as JSON `POST`s to a collection endpoint
pub struct HttpLogSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLogSink {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PaymentError::Configuration(format!("log shipping client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LogSink for HttpLogSink {
    fn ship(&self, payload: Value) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, remote log shipment skipped");
            return;
        };

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        handle.spawn(async move {
            match client.post(&endpoint).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    warn!(status = %response.status(), "Remote log endpoint rejected entry");
                }
                Err(e) => warn!(error = %e, "Failed to ship log entry"),
            }
        });
    }
}

/// Process-wide structured logger. Construct once and share via `Arc`.
pub struct StructuredLogger {
    config: LoggerConfig,
    min_level: AtomicU8,
    session_id: String,
    user_agent: String,
    buffer: Mutex<VecDeque<LogRecord>>,
    sink: Option<Arc<dyn LogSink>>,
}

impl StructuredLogger {
    /// Create a logger; an HTTP sink is installed when a remote endpoint is configured
    pub fn new(config: LoggerConfig) -> Self {
        let sink = config.remote_endpoint.as_ref().and_then(|endpoint| {
            match HttpLogSink::new(endpoint.clone()) {
                Ok(sink) => Some(Arc::new(sink) as Arc<dyn LogSink>),
                Err(e) => {
                    warn!(error = %e, "Remote log shipping disabled");
                    None
                }
            }
        });

        Self {
            min_level: AtomicU8::new(config.min_level as u8),
            session_id: format!("sess_{}", Uuid::new_v4().simple()),
            user_agent: concat!("shieldcart/", env!("CARGO_PKG_VERSION")).to_string(),
            buffer: Mutex::new(VecDeque::with_capacity(config.buffer_size.min(1024))),
            sink,
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, PaymentError> {
        Ok(Self::new(LoggerConfig::from_env()?))
    }

    /// Builder: replace the remote sink
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builder: set the user agent recorded on security events
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Stable for the lifetime of the logger
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    /// Override the threshold at runtime
    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    /// Record an entry if `level` passes the threshold
    pub fn log(&self, level: LogLevel, category: &str, message: impl Into<String>, extras: LogExtras) {
        if !self.is_enabled(level) {
            return;
        }

        let entry = self.build_entry(level, category, message.into(), extras);
        self.mirror(&entry);

        if self.config.is_production() && level >= LogLevel::Error {
            self.ship(&entry);
        }

        self.store(LogRecord::Standard(entry));
    }

    /// Record a security event. Always recorded and always shipped.
    pub fn security(
        &self,
        action: &str,
        outcome: SecurityOutcome,
        risk_level: RiskLevel,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        let level = if risk_level >= RiskLevel::High {
            LogLevel::Error
        } else {
            LogLevel::Warn
        };

        let extras = LogExtras {
            data,
            ..LogExtras::default()
        };
        let entry = SecurityLogEntry {
            entry: self.build_entry(level, "SECURITY", message.into(), extras),
            action: action.to_string(),
            outcome,
            risk_level,
            ip_address: UNKNOWN_CLIENT_IP.to_string(),
            user_agent: self.user_agent.clone(),
        };

        self.mirror(&entry.entry);
        self.ship(&entry);
        self.store(LogRecord::Security(entry));
    }

    pub fn debug(&self, category: &str, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Debug, category, message, Self::data_only(data));
    }

    pub fn info(&self, category: &str, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Info, category, message, Self::data_only(data));
    }

    pub fn warn(&self, category: &str, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Warn, category, message, Self::data_only(data));
    }

    pub fn error(&self, category: &str, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Error, category, message, Self::data_only(data));
    }

    /// Payment-category entry carrying order and payment correlation ids
    pub fn payment(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        order_id: Option<&str>,
        payment_id: Option<&str>,
        data: Option<Value>,
    ) {
        let extras = LogExtras {
            data,
            error: None,
            metadata: LogMetadata {
                order_id: order_id.map(String::from),
                payment_id: payment_id.map(String::from),
                user_id: None,
            },
        };
        self.log(level, "PAYMENT", message, extras);
    }

    /// Snapshot of all stored records, oldest first
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Snapshot of stored entries (security entries included), oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().map(|r| r.entry().clone()).collect()
    }

    /// The `n` most recent entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let buffer = self.lock();
        let skip = buffer.len().saturating_sub(n);
        buffer.iter().skip(skip).map(|r| r.entry().clone()).collect()
    }

    pub fn entries_for_category(&self, category: &str) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .map(LogRecord::entry)
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    pub fn security_entries(&self) -> Vec<SecurityLogEntry> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                LogRecord::Security(s) => Some(s.clone()),
                LogRecord::Standard(_) => None,
            })
            .collect()
    }

    /// Serialize the buffer as a JSON array
    pub fn export_json(&self) -> String {
        let records = self.records();
        serde_json::to_string_pretty(&records).unwrap_or_else(|e| {
            error!(error = %e, "Failed to export log buffer");
            "[]".to_string()
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn data_only(data: Option<Value>) -> LogExtras {
        LogExtras {
            data,
            ..LogExtras::default()
        }
    }

    fn build_entry(&self, level: LogLevel, category: &str, message: String, extras: LogExtras) -> LogEntry {
        LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            category: category.to_string(),
            message,
            data: extras.data.as_ref().map(redact),
            error: extras.error,
            session_id: self.session_id.clone(),
            metadata: extras.metadata,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogRecord>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, record: LogRecord) {
        let mut buffer = self.lock();
        buffer.push_back(record);
        while buffer.len() > self.config.buffer_size {
            buffer.pop_front();
        }
    }

    fn ship<T: Serialize>(&self, entry: &T) {
        let Some(sink) = &self.sink else {
            return;
        };
        match serde_json::to_value(entry) {
            Ok(payload) => sink.ship(payload),
            Err(e) => error!(error = %e, "Failed to serialize log entry for shipping"),
        }
    }

    fn mirror(&self, entry: &LogEntry) {
        if !self.config.is_development() && entry.level < LogLevel::Warn {
            return;
        }

        let category = entry.category.as_str();
        let order_id = entry.metadata.order_id.as_deref().unwrap_or("-");
        match entry.level {
            LogLevel::Debug => {
                debug!(category, order_id, data = ?entry.data, "{}", entry.message)
            }
            LogLevel::Info => {
                info!(category, order_id, data = ?entry.data, "{}", entry.message)
            }
            LogLevel::Warn => {
                warn!(category, order_id, data = ?entry.data, "{}", entry.message)
            }
            LogLevel::Error => error!(
                category,
                order_id,
                data = ?entry.data,
                error = ?entry.error.as_ref().map(|e| e.message.as_str()),
                "{}",
                entry.message
            ),
        }
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}
