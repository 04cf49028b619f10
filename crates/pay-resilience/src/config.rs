//! # Logger Configuration
//!
//! Environment-driven settings read once when the logger is built.

use crate::logger::LogLevel;
use pay_core::PaymentError;
use std::env;

/// Default capacity of the in-memory log ring buffer
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse an environment name; unknown names fall back to development
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    /// Threshold used when no override is configured
    pub fn default_level(&self) -> LogLevel {
        match self {
            Environment::Development => LogLevel::Debug,
            Environment::Staging => LogLevel::Info,
            Environment::Production => LogLevel::Warn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub environment: Environment,

    /// Minimum level recorded
    pub min_level: LogLevel,

    /// Remote collection endpoint (POST, JSON body)
    pub remote_endpoint: Option<String>,

    /// Ring buffer capacity
    pub buffer_size: usize,
}

impl LoggerConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `ENVIRONMENT` (development | staging | production)
    /// - `LOG_LEVEL` (debug | info | warn | error)
    /// - `LOG_ENDPOINT`
    /// - `LOG_BUFFER_SIZE`
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let environment = env::var("ENVIRONMENT")
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        let min_level = match env::var("LOG_LEVEL") {
            Ok(value) => value.parse().map_err(|_| {
                PaymentError::Configuration(format!("LOG_LEVEL has invalid value: {}", value))
            })?,
            Err(_) => environment.default_level(),
        };

        let buffer_size = match env::var("LOG_BUFFER_SIZE") {
            Ok(value) => value.parse::<usize>().map_err(|_| {
                PaymentError::Configuration(format!("LOG_BUFFER_SIZE must be a number: {}", value))
            })?,
            Err(_) => DEFAULT_BUFFER_SIZE,
        };

        Ok(Self {
            environment,
            min_level,
            remote_endpoint: env::var("LOG_ENDPOINT").ok().filter(|v| !v.is_empty()),
            buffer_size: buffer_size.max(1),
        })
    }

    /// Create config for an environment with its default threshold
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            min_level: environment.default_level(),
            remote_endpoint: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Builder: set remote endpoint
    pub fn with_remote_endpoint(mut self, url: impl Into<String>) -> Self {
        self.remote_endpoint = Some(url.into());
        self
    }

    /// Builder: set minimum level
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Builder: set ring buffer capacity
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new(Environment::Development)
    }
}
