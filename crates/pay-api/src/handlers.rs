//! # Request Handlers
//!
//! Axum request handlers for the payment API.
//! Every price the API reports is computed from the trusted catalog.

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use pay_core::{
    calculate_shipping_cost, CartItem, DiscountOutcome, PricingBreakdown, ShippingQuote,
    ValidationResult,
};
use pay_resilience::{
    CheckoutError, CheckoutRequest, CheckoutSession, CircuitStatus, LogLevel, LogRecord, ProcessedError,
    CREATE_ORDER_CIRCUIT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PriceCartRequest {
    pub items: Vec<CartItem>,
}

/// Cart plus the total the client is about to charge
#[derive(Debug, Deserialize)]
pub struct VerifyCartRequest {
    pub items: Vec<CartItem>,
    pub expected_amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct DiscountRequest {
    pub pricing: PricingBreakdown,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ShippingRequest {
    /// Parcel weight in kg
    pub weight: f64,
    pub destination_code: String,
    #[serde(default)]
    pub expedited: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: Vec::new(),
            error_id: None,
            retryable: None,
            retry_after_ms: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    /// Surface only the user-safe parts of a classified failure
    pub fn from_processed(processed: &ProcessedError, code: u16) -> Self {
        Self {
            error: processed.user_message.clone(),
            code,
            details: Vec::new(),
            error_id: Some(processed.id.clone()),
            retryable: Some(processed.retryable),
            retry_after_ms: processed.retry_after.map(|d| d.as_millis() as u64),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn checkout_error_to_response(err: CheckoutError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::from_processed(err.processed(), code);
    if let CheckoutError::Rejected { errors, .. } = &err {
        response = response.with_details(errors.clone());
    }
    (status(code), Json(response))
}

fn validation_response(result: ValidationResult) -> (StatusCode, Json<ValidationResult>) {
    let code = if result.is_valid {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (code, Json(result))
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let circuit = state
        .checkout
        .engine()
        .circuit_state(CREATE_ORDER_CIRCUIT)
        .map(|s| s.status())
        .unwrap_or(CircuitStatus::Closed);

    Json(serde_json::json!({
        "status": "healthy",
        "service": "shieldcart",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.as_str(),
        "circuits": { CREATE_ORDER_CIRCUIT: circuit },
    }))
}

/// Get products list
pub async fn list_products(State(state): State<AppState>) -> impl IntoResponse {
    let products: Vec<_> = state.catalog().active_products().collect();
    Json(serde_json::json!({
        "products": products,
        "count": products.len()
    }))
}

/// Get single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.catalog().get(&product_id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                format!("Product not found: {}", product_id),
                404,
            )),
        )
    })?;

    Ok(Json(product.clone()))
}

/// Price a cart against the catalog
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn validate_pricing(
    State(state): State<AppState>,
    Json(request): Json<PriceCartRequest>,
) -> impl IntoResponse {
    let result = state.reconciler().validate_cart_pricing(&request.items);
    debug!("Cart priced: valid={}", result.is_valid);
    validation_response(result)
}

/// Price a cart and require its total to match the client's
#[instrument(skip(state, request), fields(items = request.items.len(), expected = request.expected_amount))]
pub async fn verify_pricing(
    State(state): State<AppState>,
    Json(request): Json<VerifyCartRequest>,
) -> impl IntoResponse {
    let result = state
        .reconciler()
        .validate_before_payment(&request.items, request.expected_amount);
    if !result.is_valid {
        warn!("Cart failed pre-payment verification: {:?}", result.errors);
    }
    validation_response(result)
}

pub async fn apply_discount(
    State(state): State<AppState>,
    Json(request): Json<DiscountRequest>,
) -> Result<Json<DiscountOutcome>, ApiError> {
    state
        .reconciler()
        .apply_discount_code(&request.pricing, &request.code)
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse::new(e.to_string(), 422)),
            )
        })
}

pub async fn shipping_quote(Json(request): Json<ShippingRequest>) -> Json<ShippingQuote> {
    Json(calculate_shipping_cost(
        request.weight,
        &request.destination_code,
        request.expedited,
    ))
}

/// Validate, reconcile and open a provider order
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let session = state.checkout.checkout(&request).await.map_err(|e| {
        error!("Checkout failed: {}", e);
        checkout_error_to_response(e)
    })?;

    info!(
        "Checkout ready: order={}, total={}, attempts={}",
        session.order.id,
        session.pricing.summary.total_amount,
        session.attempts
    );

    Ok(Json(session))
}

/// Collect an entry shipped by a client-side logger
pub async fn collect_log(Json(record): Json<LogRecord>) -> StatusCode {
    let entry = record.entry();
    let security = matches!(record, LogRecord::Security(_));

    match entry.level {
        LogLevel::Error => error!(
            target: "client_log",
            session_id = %entry.session_id,
            category = %entry.category,
            security,
            "{}",
            entry.message
        ),
        LogLevel::Warn => warn!(
            target: "client_log",
            session_id = %entry.session_id,
            category = %entry.category,
            security,
            "{}",
            entry.message
        ),
        LogLevel::Info => info!(
            target: "client_log",
            session_id = %entry.session_id,
            category = %entry.category,
            security,
            "{}",
            entry.message
        ),
        LogLevel::Debug => debug!(
            target: "client_log",
            session_id = %entry.session_id,
            category = %entry.category,
            security,
            "{}",
            entry.message
        ),
    }

    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use pay_core::{ErrorCategory, PaymentError};
    use pay_resilience::{ErrorHandler, StructuredLogger};
    use std::sync::Arc;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400);
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
        assert!(err.details.is_empty());
    }

    #[test]
    fn test_checkout_error_hides_internal_message() {
        let handler = ErrorHandler::new(Arc::new(StructuredLogger::default()));
        let processed = handler.handle_error(
            &PaymentError::AmountMismatch {
                expected: 900.0,
                calculated: 998.0,
            },
            ErrorCategory::Payment,
            Default::default(),
        );
        let err = CheckoutError::Rejected {
            errors: vec!["Amount mismatch".to_string()],
            processed,
        };

        let (code, Json(body)) = checkout_error_to_response(err);
        assert_eq!(code, StatusCode::CONFLICT);
        assert!(!body.error.contains("998"));
        assert_eq!(body.details, vec!["Amount mismatch".to_string()]);
        assert_eq!(body.retryable, Some(false));
        assert!(body.error_id.is_some());
    }
}
