//! # Application State
//!
//! Shared state for the Axum application.
//! Wires the trusted catalog, the resilience services and the payment gateway.

use pay_core::{BoxedPaymentGateway, PricingReconciler, ProductCatalog};
use pay_gateway::HttpPaymentGateway;
use pay_resilience::{CheckoutGuard, Environment, ErrorHandler, RetryEngine, StructuredLogger};
use std::net::SocketAddr;
use std::sync::Arc;

pub const DEFAULT_CATALOG_PATH: &str = "config/products.toml";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    pub environment: Environment,
    /// Product catalog TOML file
    pub catalog_path: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source, falling back to defaults for missing keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: lookup("ENVIRONMENT")
                .map(|v| Environment::parse(&v))
                .unwrap_or(Environment::Development),
            catalog_path: lookup("CATALOG_PATH")
                .unwrap_or_else(|| DEFAULT_CATALOG_PATH.to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Pricing, reconciliation and order creation
    pub checkout: Arc<CheckoutGuard<ProductCatalog>>,
    pub logger: Arc<StructuredLogger>,
}

impl AppState {
    /// Build state from environment variables and the catalog file
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let catalog = load_product_catalog(&config.catalog_path)?;

        let logger = Arc::new(
            StructuredLogger::from_env()
                .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?,
        );

        let gateway = HttpPaymentGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize payment gateway: {}", e))?;
        let public_key = gateway.config().public_key.clone();

        Ok(Self::from_parts(config, catalog, Arc::new(gateway), logger, public_key))
    }

    /// Assemble state from already constructed parts
    pub fn from_parts(
        config: AppConfig,
        catalog: ProductCatalog,
        gateway: BoxedPaymentGateway,
        logger: Arc<StructuredLogger>,
        public_key: Option<String>,
    ) -> Self {
        let handler = Arc::new(ErrorHandler::new(Arc::clone(&logger)));
        let engine = Arc::new(RetryEngine::new(handler));
        let mut checkout = CheckoutGuard::new(PricingReconciler::new(catalog), gateway, engine);
        if let Some(key) = public_key {
            checkout = checkout.with_public_key(key);
        }

        Self {
            config,
            checkout: Arc::new(checkout),
            logger,
        }
    }

    pub fn reconciler(&self) -> &PricingReconciler<ProductCatalog> {
        self.checkout.reconciler()
    }

    pub fn catalog(&self) -> &ProductCatalog {
        self.reconciler().catalog()
    }
}

/// Load product catalog from a TOML file
fn load_product_catalog(path: &str) -> anyhow::Result<ProductCatalog> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let catalog = ProductCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
            Ok(catalog)
        }
        Err(e) => {
            tracing::warn!("No product catalog at {} ({}), using empty catalog", path, e);
            Ok(ProductCatalog::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.catalog_path, DEFAULT_CATALOG_PATH);
    }

    #[test]
    fn test_app_config_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HOST", "0.0.0.0"),
            ("PORT", "not-a-port"),
            ("ENVIRONMENT", "production"),
            ("CATALOG_PATH", "/etc/shieldcart/products.toml"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(config.is_production());
        assert_eq!(config.catalog_path, "/etc/shieldcart/products.toml");
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: Environment::Staging,
            catalog_path: DEFAULT_CATALOG_PATH.to_string(),
        };

        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:3000");

        let bad = AppConfig {
            host: "not a host".to_string(),
            ..config
        };
        assert!(bad.socket_addr().is_err());
    }

    #[test]
    fn test_missing_catalog_is_empty() {
        let catalog = load_product_catalog("does/not/exist.toml").unwrap();
        assert!(catalog.products.is_empty());
    }
}
