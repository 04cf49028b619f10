//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
///   - GET  /health
///   - GET  /api/v1/products, /api/v1/products/{id}
///   - POST /api/v1/pricing/validate, /api/v1/pricing/verify, /api/v1/pricing/discount
///   - POST /api/v1/shipping/quote
///   - POST /api/v1/checkout
///   - POST /api/v1/logs - collection endpoint for client-side loggers
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let pricing_routes = Router::new()
        .route("/validate", post(handlers::validate_pricing))
        .route("/verify", post(handlers::verify_pricing))
        .route("/discount", post(handlers::apply_discount));

    let api_routes = Router::new()
        .route("/products", get(handlers::list_products))
        .route("/products/{product_id}", get(handlers::get_product))
        .nest("/pricing", pricing_routes)
        .route("/shipping/quote", post(handlers::shipping_quote))
        .route("/checkout", post(handlers::create_checkout))
        .route("/logs", post(handlers::collect_log));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AppConfig, DEFAULT_CATALOG_PATH};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use pay_core::{
        Currency, GatewayOrder, PaymentError, PaymentGateway, PaymentResult, Product,
        ProductCatalog, ProviderOrderPayload,
    };
    use pay_resilience::{Environment, LoggerConfig, StructuredLogger};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Accepts every order, or fails every call when `fail` is set
    struct StubGateway {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_order(&self, payload: &ProviderOrderPayload) -> PaymentResult<GatewayOrder> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(PaymentError::PaymentDeclined {
                    reason: "card declined".to_string(),
                });
            }
            Ok(GatewayOrder::from_payload(
                format!("order_test_{}", n),
                "stub",
                payload,
                Currency::INR,
            ))
        }

        fn provider_name(&self) -> &str {
            "stub"
        }
    }

    fn catalog() -> ProductCatalog {
        ProductCatalog::new()
            .with_product(
                Product::new("pashmina-shawl", "Pashmina Shawl", 3000.0)
                    .with_tax_rate(5.0)
                    .with_stock(20),
            )
            .with_product(Product::new("brass-diya", "Brass Diya", 499.0).with_stock(2))
            .with_product(Product::new("retired", "Retired Item", 10.0).inactive())
    }

    fn server_with(fail: bool) -> (TestServer, Arc<StubGateway>) {
        let gateway = Arc::new(StubGateway {
            calls: AtomicU32::new(0),
            fail,
        });
        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: Environment::Development,
            catalog_path: DEFAULT_CATALOG_PATH.to_string(),
        };
        let logger = Arc::new(StructuredLogger::new(LoggerConfig::new(Environment::Development)));
        let state = AppState::from_parts(
            config,
            catalog(),
            gateway.clone(),
            logger,
            Some("rzp_test_key".to_string()),
        );
        let server = TestServer::new(create_router(state)).unwrap();
        (server, gateway)
    }

    fn server() -> TestServer {
        server_with(false).0
    }

    #[tokio::test]
    async fn test_health() {
        let response = server().get("/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["circuits"]["payment.create_order"], "closed");
    }

    #[tokio::test]
    async fn test_products_list_hides_inactive() {
        let server = server();
        let body: Value = server.get("/api/v1/products").await.json();
        assert_eq!(body["count"], 2);

        server
            .get("/api/v1/products/brass-diya")
            .await
            .assert_status_ok();
        server
            .get("/api/v1/products/nope")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validate_pricing() {
        let response = server()
            .post("/api/v1/pricing/validate")
            .json(&json!({ "items": [{ "product_id": "pashmina-shawl", "quantity": 2 }] }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["is_valid"], true);
        assert_eq!(body["pricing"]["summary"]["total_amount"], 6300.0);
    }

    #[tokio::test]
    async fn test_verify_pricing_rejects_mismatch() {
        let response = server()
            .post("/api/v1/pricing/verify")
            .json(&json!({
                "items": [{ "product_id": "pashmina-shawl", "quantity": 2 }],
                "expected_amount": 6000.0
            }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["is_valid"], false);
        assert!(body.get("pricing").map_or(true, Value::is_null));
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_unprocessable() {
        server()
            .post("/api/v1/pricing/validate")
            .json(&json!({ "items": [{ "product_id": "brass-diya", "quantity": 3 }] }))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_discount_round_trip() {
        let server = server();
        let priced: Value = server
            .post("/api/v1/pricing/validate")
            .json(&json!({ "items": [{ "product_id": "pashmina-shawl", "quantity": 2 }] }))
            .await
            .json();

        let response = server
            .post("/api/v1/pricing/discount")
            .json(&json!({ "pricing": priced["pricing"], "code": "craft15" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["code"], "CRAFT15");
        assert_eq!(body["pricing"]["summary"]["total_amount"], 5355.0);

        server
            .post("/api/v1/pricing/discount")
            .json(&json!({ "pricing": priced["pricing"], "code": "BOGUS" }))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_shipping_quote() {
        let body: Value = server()
            .post("/api/v1/shipping/quote")
            .json(&json!({ "weight": 0.4, "destination_code": "110001" }))
            .await
            .json();
        assert_eq!(body["cost"], 50.0);
        assert_eq!(body["metro"], true);
    }

    #[tokio::test]
    async fn test_checkout_creates_order() {
        let (server, gateway) = server_with(false);
        let response = server
            .post("/api/v1/checkout")
            .json(&json!({
                "items": [{ "product_id": "pashmina-shawl", "quantity": 1 }],
                "expected_amount": 3150.0
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["order"]["id"], "order_test_1");
        assert_eq!(body["order"]["amount"], 315_000);
        assert_eq!(body["public_key"], "rzp_test_key");
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_checkout_amount_mismatch_never_calls_gateway() {
        let (server, gateway) = server_with(false);
        let response = server
            .post("/api/v1/checkout")
            .json(&json!({
                "items": [{ "product_id": "pashmina-shawl", "quantity": 1 }],
                "expected_amount": 100.0
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["retryable"], false);
        assert!(body["error_id"].as_str().unwrap().starts_with("err_"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_declined_payment_is_not_retried() {
        let (server, gateway) = server_with(true);
        let response = server
            .post("/api/v1/checkout")
            .json(&json!({
                "items": [{ "product_id": "pashmina-shawl", "quantity": 1 }],
                "expected_amount": 3150.0
            }))
            .await;
        response.assert_status(StatusCode::PAYMENT_REQUIRED);
        let body: Value = response.json();
        assert_eq!(
            body["error"],
            "Your payment was declined. Please try another payment method or contact your bank."
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_collect_log_entries() {
        let server = server();
        server
            .post("/api/v1/logs")
            .json(&json!({
                "timestamp": "2026-01-01T00:00:00.000Z",
                "level": "warn",
                "category": "PAYMENT",
                "message": "Retrying payment after failure",
                "session_id": "sess_abc"
            }))
            .await
            .assert_status(StatusCode::ACCEPTED);

        server
            .post("/api/v1/logs")
            .json(&json!({
                "timestamp": "2026-01-01T00:00:00.000Z",
                "level": "error",
                "category": "SECURITY",
                "message": "Payment verification failed",
                "session_id": "sess_abc",
                "action": "payment_verification_failed",
                "outcome": "failure",
                "risk_level": "high",
                "ip_address": "client-side",
                "user_agent": "shieldcart/0.1.0"
            }))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }
}
