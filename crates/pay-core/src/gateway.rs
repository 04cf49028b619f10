//! # Payment Gateway Trait
//!
//! Seam between checkout orchestration and whichever provider opens the
//! order the checkout widget will charge.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   PaymentGateway (trait)                    │
//! │  ├── create_order()                                         │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!          ┌─────────────────┴─────────────────┐
//!          │                                   │
//!  ┌───────┴──────────┐              ┌─────────┴─────────┐
//!  │HttpPaymentGateway│              │ other providers   │
//!  │  (pay-gateway)   │              │    (future)       │
//!  └──────────────────┘              └───────────────────┘
//! ```

use crate::error::PaymentResult;
use crate::order::{GatewayOrder, ProviderOrderPayload};
use async_trait::async_trait;
use std::sync::Arc;

/// Opens orders at a payment provider.
///
/// Implementations perform a single attempt; retry and circuit breaking
/// are layered on by the caller.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open an order for the given payload.
    async fn create_order(&self, payload: &ProviderOrderPayload) -> PaymentResult<GatewayOrder>;

    /// Get the provider name (for logging and routing).
    fn provider_name(&self) -> &str;
}

/// Type alias for a boxed payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;
