//! # pay-core
//!
//! Core types and traits for the shieldcart payment engine.
//!
//! This crate provides:
//! - `PaymentError`, `ErrorCategory`, `ErrorSeverity` and the `Failure` trait
//! - `Product`, `ProductCatalog` and the `Catalog` trait for the trusted catalog
//! - `PricingReconciler` for validating carts before payment
//! - `DiscountTable` and shipping estimates
//! - `PaymentGateway` trait for opening provider orders
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{CartItem, PricingReconciler, ProductCatalog, format_for_razorpay};
//!
//! let reconciler = PricingReconciler::new(catalog);
//!
//! // Reject a cart whose total disagrees with what the UI shows
//! let result = reconciler.validate_before_payment(&[CartItem::new("brass-diya", 2)], 998.0);
//! if let Some(pricing) = result.pricing {
//!     let payload = format_for_razorpay(&pricing);
//!     let order = gateway.create_order(&payload).await?;
//! }
//! ```

pub mod discount;
pub mod error;
pub mod gateway;
pub mod order;
pub mod pricing;
pub mod product;
pub mod shipping;

// Re-exports for convenience
pub use discount::{DiscountCode, DiscountError, DiscountTable};
pub use error::{ErrorCategory, ErrorSeverity, Failure, PaymentError, PaymentResult, RawFailure};
pub use gateway::{BoxedPaymentGateway, PaymentGateway};
pub use order::{generate_receipt_id, GatewayOrder, OrderStatus, ProviderOrderPayload};
pub use pricing::{
    format_for_razorpay, CartItem, DiscountOutcome, PricedLineItem, PricingBreakdown,
    PricingMetadata, PricingReconciler, PricingRules, PricingSummary, ValidationResult,
};
pub use product::{
    calculate_price, round_amount, CalculatedPrice, Catalog, Currency, Product, ProductCatalog,
    ProductMetadata, ProductPricing, MAX_QUANTITY_PER_ITEM,
};
pub use shipping::{calculate_shipping_cost, ShippingQuote};
