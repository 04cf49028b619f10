//! # Order Types
//!
//! Payloads exchanged with the payment provider when an order is opened.

use crate::product::Currency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Order creation request in the shape the checkout provider expects:
/// amount in minor units, ISO currency code, receipt id, flat string notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOrderPayload {
    /// Amount in smallest currency unit (paise for INR)
    pub amount: i64,
    pub currency: String,
    /// Merchant-side receipt identifier
    pub receipt: String,
    /// Business metadata kept at the provider for audit
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
}

/// Generate a fresh receipt identifier (at most 40 chars)
pub fn generate_receipt_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("rcpt_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Status of a provider order, as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order opened, awaiting payment
    Created,
    /// A payment attempt was made
    Attempted,
    /// Payment captured
    Paid,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Created
    }
}

/// An order opened at the payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Provider's order ID
    pub id: String,

    /// Provider name (e.g., "razorpay")
    #[serde(default)]
    pub provider: String,

    /// Amount in smallest currency unit
    pub amount: i64,

    pub currency: Currency,

    pub receipt: String,

    #[serde(default)]
    pub status: OrderStatus,

    /// Created timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl GatewayOrder {
    /// Create an order record mirroring a payload
    pub fn from_payload(
        id: impl Into<String>,
        provider: impl Into<String>,
        payload: &ProviderOrderPayload,
        currency: Currency,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            amount: payload.amount,
            currency,
            receipt: payload.receipt.clone(),
            status: OrderStatus::Created,
            created_at: Utc::now(),
        }
    }
}
