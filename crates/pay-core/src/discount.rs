//! # Discount Codes
//!
//! Static promotion table consulted by pricing reconciliation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A promotion code and its constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountCode {
    pub code: String,
    /// Percentage off the subtotal
    pub percentage: f64,
    /// Subtotal required before the code applies
    pub min_order_amount: f64,
    /// Upper bound on the discount amount
    pub max_discount: f64,
    pub description: String,
}

impl DiscountCode {
    pub fn new(
        code: impl Into<String>,
        percentage: f64,
        min_order_amount: f64,
        max_discount: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into().to_uppercase(),
            percentage,
            min_order_amount,
            max_discount,
            description: description.into(),
        }
    }

    /// Discount for a given subtotal, capped at `max_discount`
    pub fn discount_for(&self, subtotal: f64) -> f64 {
        (subtotal * self.percentage / 100.0).min(self.max_discount)
    }
}

/// Why a discount code could not be applied
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiscountError {
    #[error("Invalid discount code: {0}")]
    UnknownCode(String),

    #[error("Minimum order amount of {minimum:.2} required for {code}")]
    BelowMinimum { code: String, minimum: f64 },

    #[error("Discount code {code} has already been applied")]
    AlreadyApplied { code: String },
}

/// Lookup table of known discount codes (keys are upper-case)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountTable {
    codes: HashMap<String, DiscountCode>,
}

impl DiscountTable {
    /// Create an empty table
    pub fn empty() -> Self {
        Self {
            codes: HashMap::new(),
        }
    }

    /// Add or replace a code
    pub fn insert(&mut self, code: DiscountCode) {
        self.codes.insert(code.code.clone(), code);
    }

    /// Builder: add a code
    pub fn with_code(mut self, code: DiscountCode) -> Self {
        self.insert(code);
        self
    }

    /// Case-insensitive lookup
    pub fn get(&self, code: &str) -> Option<&DiscountCode> {
        self.codes.get(&code.trim().to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for DiscountTable {
    fn default() -> Self {
        Self::empty()
            .with_code(DiscountCode::new(
                "WELCOME10",
                10.0,
                5000.0,
                1000.0,
                "10% off your first order",
            ))
            .with_code(DiscountCode::new(
                "CRAFT15",
                15.0,
                3000.0,
                2000.0,
                "15% off handcrafted collections",
            ))
            .with_code(DiscountCode::new(
                "FESTIVE20",
                20.0,
                10000.0,
                5000.0,
                "Festive season 20% off",
            ))
    }
}
