//! # Shipping Estimates
//!
//! Tiered weight-based shipping cost with metro/non-metro and expedited
//! adjustments.

use crate::product::round_amount;
use serde::{Deserialize, Serialize};

/// Upper weight bound (kg) and base cost of each tier
const WEIGHT_TIERS: &[(f64, f64)] = &[(0.5, 50.0), (1.0, 80.0), (5.0, 150.0), (10.0, 250.0)];

/// Cost per started kilogram above the last tier
const PER_KG_ABOVE_TIERS: f64 = 20.0;

const NON_METRO_SURCHARGE: f64 = 50.0;
const METRO_DAYS: u32 = 3;
const NON_METRO_DAYS: u32 = 6;

/// Postal code prefixes of metropolitan delivery zones
const METRO_PREFIXES: &[&str] = &["110", "400", "560", "600", "700", "500"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub cost: f64,
    pub estimated_days: u32,
    pub metro: bool,
    pub expedited: bool,
}

/// True when the destination postal code falls in a metro zone
pub fn is_metro(destination_code: &str) -> bool {
    let code = destination_code.trim();
    METRO_PREFIXES.iter().any(|prefix| code.starts_with(prefix))
}

fn base_cost(weight: f64) -> f64 {
    for &(limit, cost) in WEIGHT_TIERS {
        if weight <= limit {
            return cost;
        }
    }
    let (last_limit, last_cost) = WEIGHT_TIERS[WEIGHT_TIERS.len() - 1];
    last_cost + (weight - last_limit).ceil() * PER_KG_ABOVE_TIERS
}

/// Quote shipping for a parcel of `weight` kg to `destination_code`
pub fn calculate_shipping_cost(weight: f64, destination_code: &str, expedited: bool) -> ShippingQuote {
    let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
    let metro = is_metro(destination_code);

    let mut cost = base_cost(weight);
    let mut days = METRO_DAYS;
    if !metro {
        cost += NON_METRO_SURCHARGE;
        days = NON_METRO_DAYS;
    }

    if expedited {
        cost *= 2.0;
        days = days.div_ceil(2);
    }

    ShippingQuote {
        cost: round_amount(cost),
        estimated_days: days.max(1),
        metro,
        expedited,
    }
}
