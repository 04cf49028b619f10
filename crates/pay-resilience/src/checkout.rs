//! # Checkout Guard
//!
//! Composes the pieces into one "charge a validated amount, resiliently" call:
//!
//! ```text
//! cart ──► validate_cart_pricing ──► apply_discount_code? ──► reconcile_amount
//!                                                                   │
//!          GatewayOrder ◄── create_order (retry + breaker) ◄── format_for_razorpay
//! ```
//!
//! Every rejection is classified by the [`ErrorHandler`] and carried on the
//! returned [`CheckoutError`].

use crate::error_handler::{ErrorContext, ProcessedError};
use crate::logger::LogLevel;
use crate::retry::{CircuitBreakerOptions, CircuitOpenError, RetryContext, RetryEngine, RetryFailure};
use pay_core::{
    format_for_razorpay, BoxedPaymentGateway, CartItem, Catalog, ErrorCategory, GatewayOrder,
    PaymentError, PricingBreakdown, PricingReconciler,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Breaker guarding provider order creation
pub const CREATE_ORDER_CIRCUIT: &str = "payment.create_order";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,

    /// Total the client believes it is about to charge
    pub expected_amount: f64,

    #[serde(default)]
    pub discount_code: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    /// Merchant-side order reference, copied into the provider notes
    #[serde(default)]
    pub order_ref: Option<String>,
}

impl CheckoutRequest {
    pub fn new(items: Vec<CartItem>, expected_amount: f64) -> Self {
        Self {
            items,
            expected_amount,
            discount_code: None,
            user_id: None,
            order_ref: None,
        }
    }

    pub fn with_discount_code(mut self, code: impl Into<String>) -> Self {
        self.discount_code = Some(code.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_order_ref(mut self, order_ref: impl Into<String>) -> Self {
        self.order_ref = Some(order_ref.into());
        self
    }
}

/// Everything the client needs to open the checkout widget
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub order: GatewayOrder,
    pub pricing: PricingBreakdown,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub attempts: u32,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Cart, discount or amount check failed before any money moved
    #[error("{}", .processed.message)]
    Rejected {
        errors: Vec<String>,
        processed: ProcessedError,
    },

    /// Provider order creation failed after retries
    #[error(transparent)]
    Gateway(RetryFailure<PaymentError>),

    #[error(transparent)]
    CircuitOpen(CircuitOpenError),
}

impl CheckoutError {
    pub fn processed(&self) -> &ProcessedError {
        match self {
            CheckoutError::Rejected { processed, .. } => processed,
            CheckoutError::Gateway(failure) => &failure.processed,
            CheckoutError::CircuitOpen(open) => &open.processed,
        }
    }

    /// Individual problems behind the failure
    pub fn errors(&self) -> Vec<String> {
        match self {
            CheckoutError::Rejected { errors, .. } => errors.clone(),
            other => vec![other.to_string()],
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::Rejected { processed, .. } => match processed.category {
                ErrorCategory::Payment => 409,
                _ => 422,
            },
            CheckoutError::Gateway(failure) => failure.error.status_code(),
            CheckoutError::CircuitOpen(_) => 503,
        }
    }
}

/// Validates and reconciles a cart, then opens the provider order
pub struct CheckoutGuard<C: Catalog> {
    reconciler: PricingReconciler<C>,
    gateway: BoxedPaymentGateway,
    engine: Arc<RetryEngine>,
    breaker: CircuitBreakerOptions,
    public_key: Option<String>,
}

impl<C: Catalog> CheckoutGuard<C> {
    pub fn new(
        reconciler: PricingReconciler<C>,
        gateway: BoxedPaymentGateway,
        engine: Arc<RetryEngine>,
    ) -> Self {
        let breaker = CircuitBreakerOptions {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            retry_config: engine.payment_config().clone(),
        };
        Self {
            reconciler,
            gateway,
            engine,
            breaker,
            public_key: None,
        }
    }

    /// Builder: override breaker settings for order creation
    pub fn with_breaker(mut self, breaker: CircuitBreakerOptions) -> Self {
        self.breaker = breaker;
        self
    }

    /// Builder: checkout widget public key handed back to clients
    pub fn with_public_key(mut self, key: impl Into<String>) -> Self {
        self.public_key = Some(key.into());
        self
    }

    pub fn reconciler(&self) -> &PricingReconciler<C> {
        &self.reconciler
    }

    pub fn engine(&self) -> &Arc<RetryEngine> {
        &self.engine
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, CheckoutError> {
        let validation = self.reconciler.validate_cart_pricing(&request.items);
        let warnings = validation.warnings.clone();
        let mut pricing = match validation.pricing {
            Some(pricing) if validation.is_valid => pricing,
            _ => return Err(self.reject(validation.errors, ErrorCategory::Validation, request)),
        };

        if let Some(code) = request.discount_code.as_deref().filter(|c| !c.trim().is_empty()) {
            match self.reconciler.apply_discount_code(&pricing, code) {
                Ok(outcome) => pricing = outcome.pricing,
                Err(e) => {
                    return Err(self.reject(vec![e.to_string()], ErrorCategory::Validation, request))
                }
            }
        }

        if let Err(e) = self.reconciler.reconcile_amount(&pricing, request.expected_amount) {
            return Err(self.reject(vec![e.to_string()], ErrorCategory::Payment, request));
        }

        let mut payload = format_for_razorpay(&pricing);
        if let Some(order_ref) = &request.order_ref {
            payload.notes.insert("order_ref".to_string(), order_ref.clone());
        }
        if let Some(user_id) = &request.user_id {
            payload.notes.insert("user_id".to_string(), user_id.clone());
        }

        let mut context = RetryContext::new(CREATE_ORDER_CIRCUIT)
            .with_category(ErrorCategory::Payment)
            .with_order_id(payload.receipt.clone());
        context.user_id = request.user_id.clone();

        let gateway = &self.gateway;
        let outcome = self
            .engine
            .execute_guarded(|| gateway.create_order(&payload), &self.breaker, context)
            .await
            .map_err(CheckoutError::CircuitOpen)?;

        let attempts = outcome.attempts;
        let order = outcome.into_result().map_err(CheckoutError::Gateway)?;

        self.engine.handler().logger().payment(
            LogLevel::Info,
            "Provider order created",
            Some(&order.id),
            None,
            Some(json!({
                "receipt": order.receipt,
                "amount": order.amount,
                "currency": order.currency,
                "attempts": attempts,
                "provider": self.gateway.provider_name(),
            })),
        );

        Ok(CheckoutSession {
            order,
            pricing,
            warnings,
            public_key: self.public_key.clone(),
            attempts,
        })
    }

    fn reject(
        &self,
        errors: Vec<String>,
        category: ErrorCategory,
        request: &CheckoutRequest,
    ) -> CheckoutError {
        let mut context = ErrorContext::new()
            .with_component("checkout")
            .with_action("validate_cart");
        context.user_id = request.user_id.clone();
        context.order_id = request.order_ref.clone();

        let processed = self
            .engine
            .handler()
            .handle_message(errors.join("; "), category, context);
        CheckoutError::Rejected { errors, processed }
    }
}
