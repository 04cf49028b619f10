//! # Gateway Configuration
//!
//! Settings for the provider orders endpoint.
//! Secrets are loaded from environment variables.

use pay_core::PaymentError;
use std::env;
use std::time::Duration;

pub const DEFAULT_PROVIDER: &str = "razorpay";

/// Per-request timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Payment gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Provider name recorded on created orders
    pub provider: String,

    /// Endpoint accepting order creation `POST`s
    pub orders_url: String,

    /// Bearer token for the orders endpoint
    pub api_token: String,

    /// Checkout widget public key, passed through to clients as-is
    pub public_key: Option<String>,

    pub timeout: Duration,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PAYMENT_ORDERS_URL`
    /// - `PAYMENT_API_TOKEN`
    ///
    /// Optional:
    /// - `PAYMENT_PUBLIC_KEY`
    /// - `PAYMENT_PROVIDER` (default `razorpay`)
    /// - `PAYMENT_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same rules as [`Self::from_env`] over any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PaymentError> {
        let orders_url = lookup("PAYMENT_ORDERS_URL").ok_or_else(|| {
            PaymentError::Configuration("PAYMENT_ORDERS_URL not set".to_string())
        })?;

        let api_token = lookup("PAYMENT_API_TOKEN").ok_or_else(|| {
            PaymentError::Configuration("PAYMENT_API_TOKEN not set".to_string())
        })?;

        if !orders_url.starts_with("http://") && !orders_url.starts_with("https://") {
            return Err(PaymentError::Configuration(
                "PAYMENT_ORDERS_URL must be an http(s) URL".to_string(),
            ));
        }

        let timeout = match lookup("PAYMENT_TIMEOUT_SECS") {
            Some(value) => value.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                PaymentError::Configuration(format!(
                    "PAYMENT_TIMEOUT_SECS must be a number: {}",
                    value
                ))
            })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            provider: lookup("PAYMENT_PROVIDER").unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            orders_url,
            api_token,
            public_key: lookup("PAYMENT_PUBLIC_KEY").filter(|k| !k.is_empty()),
            timeout,
        })
    }

    /// Create config with explicit values (for testing)
    pub fn new(orders_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            orders_url: orders_url.into(),
            api_token: api_token.into(),
            public_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Builder: set provider name
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Builder: set checkout widget public key
    pub fn with_public_key(mut self, key: impl Into<String>) -> Self {
        self.public_key = Some(key.into());
        self
    }

    /// Builder: set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_auth_header() {
        let config = GatewayConfig::new("https://pay.example.com/v1/orders", "tok_123")
            .with_public_key("rzp_test_abc")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert_eq!(config.auth_header(), "Bearer tok_123");
        assert_eq!(config.public_key.as_deref(), Some("rzp_test_abc"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_missing_url_is_configuration_error() {
        let result = GatewayConfig::from_lookup(lookup(&[("PAYMENT_API_TOKEN", "tok")]));
        assert!(matches!(result, Err(PaymentError::Configuration(_))));
    }

    #[test]
    fn test_lookup_applies_defaults_and_validates() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("PAYMENT_ORDERS_URL", "https://pay.example.com/v1/orders"),
            ("PAYMENT_API_TOKEN", "tok_123"),
            ("PAYMENT_PUBLIC_KEY", ""),
        ]))
        .unwrap();
        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.public_key.is_none());

        let bad_timeout = GatewayConfig::from_lookup(lookup(&[
            ("PAYMENT_ORDERS_URL", "https://pay.example.com/v1/orders"),
            ("PAYMENT_API_TOKEN", "tok_123"),
            ("PAYMENT_TIMEOUT_SECS", "soon"),
        ]));
        assert!(bad_timeout.is_err());

        let not_http = GatewayConfig::from_lookup(lookup(&[
            ("PAYMENT_ORDERS_URL", "ftp://pay.example.com"),
            ("PAYMENT_API_TOKEN", "tok_123"),
        ]));
        assert!(not_http.is_err());
    }
}
