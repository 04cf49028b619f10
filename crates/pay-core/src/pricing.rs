//! # Pricing Reconciliation
//!
//! Computes the authoritative price of a cart against the trusted catalog
//! and cross-checks it before any money moves.
//!
//! A [`ValidationResult`] only carries a [`PricingBreakdown`] when it is
//! valid, so a partially computed total can never be charged.

use crate::discount::{DiscountError, DiscountTable};
use crate::error::PaymentError;
use crate::order::{generate_receipt_id, ProviderOrderPayload};
use crate::product::{round_amount, Catalog, Currency};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// Business thresholds applied during reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRules {
    /// Smallest total the provider will process
    pub min_order_amount: f64,
    /// Largest total accepted in one order
    pub max_order_amount: f64,
    /// Stock count at or below which a low-stock warning is raised
    pub low_stock_threshold: u32,
    /// Unit weight (kg) above which an item is flagged as heavy
    pub heavy_item_weight: f64,
    /// Cart weight (kg) above which special handling is flagged
    pub special_handling_weight: f64,
    /// Allowed difference between computed and client-asserted totals
    pub amount_tolerance: f64,
    /// Currency used when the cart is empty
    pub default_currency: Currency,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            min_order_amount: 1.0,
            max_order_amount: 500_000.0,
            low_stock_threshold: 5,
            heavy_item_weight: 30.0,
            special_handling_weight: 50.0,
            amount_tolerance: 1.0,
            default_currency: Currency::INR,
        }
    }
}

/// One line of a client cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            variant: None,
        }
    }

    /// Builder: set variant
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }
}

/// A priced cart line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLineItem {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    pub tax_rate: f64,
    /// Pre-discount subtotal
    pub subtotal: f64,
    /// Share of an order discount allocated to this line
    #[serde(default)]
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSummary {
    pub subtotal: f64,
    #[serde(default)]
    pub discount_amount: f64,
    pub total_tax: f64,
    pub total_amount: f64,
    /// `round(total_amount * 100)`
    pub total_amount_minor: i64,
    pub currency: Currency,
    pub item_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
}

impl PricingSummary {
    /// Sum line items into a summary
    pub fn from_items(
        items: &[PricedLineItem],
        currency: Currency,
        discount_code: Option<String>,
    ) -> Self {
        let subtotal = round_amount(items.iter().map(|i| i.subtotal).sum());
        let discount_amount = round_amount(items.iter().map(|i| i.discount).sum());
        let total_tax = round_amount(items.iter().map(|i| i.tax).sum());
        let total_amount = round_amount(items.iter().map(|i| i.total).sum());

        Self {
            subtotal,
            discount_amount,
            total_tax,
            total_amount,
            total_amount_minor: currency.to_smallest_unit(total_amount),
            currency,
            item_count: items.iter().map(|i| i.quantity).sum(),
            discount_code,
        }
    }
}

/// Aggregated business metadata of a cart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingMetadata {
    pub hsn_codes: Vec<String>,
    pub categories: Vec<String>,
    pub craftsmen: Vec<String>,
    /// Cumulative shipping weight in kg
    pub total_weight: f64,
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub items: Vec<PricedLineItem>,
    pub summary: PricingSummary,
    pub metadata: PricingMetadata,
}

/// Outcome of cart validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Present only when `is_valid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingBreakdown>,
}

impl ValidationResult {
    fn invalid(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            warnings,
            pricing: None,
        }
    }

    fn invalidate(&mut self, message: String) {
        self.is_valid = false;
        self.errors.push(message);
        self.pricing = None;
    }
}

/// A discounted breakdown plus what was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountOutcome {
    pub pricing: PricingBreakdown,
    pub code: String,
    pub discount_amount: f64,
    pub description: String,
}

/// Reconciles client carts against a trusted catalog
pub struct PricingReconciler<C: Catalog> {
    catalog: C,
    rules: PricingRules,
    discounts: DiscountTable,
}

impl<C: Catalog> PricingReconciler<C> {
    /// Create a reconciler with default rules and discount table
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            rules: PricingRules::default(),
            discounts: DiscountTable::default(),
        }
    }

    /// Builder: override rules
    pub fn with_rules(mut self, rules: PricingRules) -> Self {
        self.rules = rules;
        self
    }

    /// Builder: override discount table
    pub fn with_discounts(mut self, discounts: DiscountTable) -> Self {
        self.discounts = discounts;
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn rules(&self) -> &PricingRules {
        &self.rules
    }

    /// Price every cart line against the catalog.
    ///
    /// All lines are processed even after failures so the caller sees every
    /// problem at once. Totals cover successfully priced lines only.
    pub fn validate_cart_pricing(&self, items: &[CartItem]) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if items.is_empty() {
            return ValidationResult::invalid(vec!["Cart is empty".to_string()], warnings);
        }

        let mut lines = Vec::with_capacity(items.len());
        let mut metadata = PricingMetadata::default();
        let mut currency: Option<Currency> = None;

        for item in items {
            let Some(product) = self.catalog.product_by_id(&item.product_id) else {
                errors.push(format!("Product not found: {}", item.product_id));
                continue;
            };

            let price = match self.catalog.validate_pricing(product, item.quantity) {
                Ok(price) => price,
                Err(problems) => {
                    errors.extend(problems.into_iter().map(|p| format!("{}: {}", product.name, p)));
                    continue;
                }
            };

            let line_currency = product.pricing.currency;
            match currency {
                Some(c) if c != line_currency => {
                    errors.push(format!(
                        "{}: priced in {} but cart is in {}",
                        product.name, line_currency, c
                    ));
                    continue;
                }
                None => currency = Some(line_currency),
                _ => {}
            }

            let meta = &product.metadata;
            if let Some(hsn) = &meta.hsn_code {
                push_distinct(&mut metadata.hsn_codes, hsn);
            }
            push_distinct(&mut metadata.categories, &meta.category);
            if let Some(craftsman) = &meta.craftsman {
                push_distinct(&mut metadata.craftsmen, craftsman);
            }
            metadata.total_weight += meta.shipping_weight * item.quantity as f64;

            if product.pricing.stock <= self.rules.low_stock_threshold {
                warnings.push(format!(
                    "Only {} items left in stock for {}",
                    product.pricing.stock, product.name
                ));
            }
            if meta.shipping_weight > self.rules.heavy_item_weight {
                warnings.push(format!(
                    "{} is a heavy item ({}kg) and may ship separately",
                    product.name, meta.shipping_weight
                ));
            }

            lines.push(PricedLineItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                sku: meta.sku.clone(),
                variant: item.variant.clone(),
                quantity: price.quantity,
                unit_price: price.unit_price,
                tax_rate: price.tax_rate,
                subtotal: price.subtotal,
                discount: 0.0,
                tax: price.tax,
                total: price.total,
            });
        }

        metadata.total_weight = round_amount(metadata.total_weight);
        let currency = currency.unwrap_or(self.rules.default_currency);
        let summary = PricingSummary::from_items(&lines, currency, None);

        if !lines.is_empty() {
            if summary.total_amount < self.rules.min_order_amount {
                errors.push("Order total is too small to process".to_string());
            }
            if summary.total_amount > self.rules.max_order_amount {
                errors.push(format!(
                    "Order total exceeds maximum order size of {}",
                    currency.format(self.rules.max_order_amount)
                ));
            }
            if metadata.total_weight > self.rules.special_handling_weight {
                warnings.push(format!(
                    "Order weight of {}kg may require special handling",
                    metadata.total_weight
                ));
            }
        }

        if !errors.is_empty() {
            warn!(errors = errors.len(), "Cart pricing validation failed");
            return ValidationResult::invalid(errors, warnings);
        }

        debug!(
            lines = lines.len(),
            total = summary.total_amount,
            "Cart pricing validated"
        );

        ValidationResult {
            is_valid: true,
            errors,
            warnings,
            pricing: Some(PricingBreakdown {
                items: lines,
                summary,
                metadata,
            }),
        }
    }

    /// Compare a computed total with the amount the client is about to charge
    pub fn reconcile_amount(
        &self,
        pricing: &PricingBreakdown,
        expected_amount: f64,
    ) -> Result<(), PaymentError> {
        let calculated = pricing.summary.total_amount;
        if (calculated - expected_amount).abs() > self.rules.amount_tolerance {
            error!(
                expected = expected_amount,
                calculated,
                "Payment amount mismatch detected"
            );
            return Err(PaymentError::AmountMismatch {
                expected: expected_amount,
                calculated,
            });
        }
        Ok(())
    }

    /// Validate a cart and check its total against `expected_amount`.
    /// A discrepancy beyond tolerance invalidates the whole result.
    pub fn validate_before_payment(&self, items: &[CartItem], expected_amount: f64) -> ValidationResult {
        let mut result = self.validate_cart_pricing(items);
        if !result.is_valid {
            return result;
        }

        let mismatch = result
            .pricing
            .as_ref()
            .and_then(|pricing| self.reconcile_amount(pricing, expected_amount).err());
        if let Some(err) = mismatch {
            result.invalidate(err.to_string());
        }
        result
    }

    /// Apply a discount code, returning a new breakdown.
    ///
    /// The discount is spread across lines in proportion to their subtotal
    /// and tax is recomputed on the discounted amounts.
    pub fn apply_discount_code(
        &self,
        pricing: &PricingBreakdown,
        code: &str,
    ) -> Result<DiscountOutcome, DiscountError> {
        if let Some(applied) = &pricing.summary.discount_code {
            return Err(DiscountError::AlreadyApplied {
                code: applied.clone(),
            });
        }

        let discount = self
            .discounts
            .get(code)
            .ok_or_else(|| DiscountError::UnknownCode(code.trim().to_string()))?;

        let subtotal = pricing.summary.subtotal;
        if subtotal <= 0.0 || subtotal < discount.min_order_amount {
            return Err(DiscountError::BelowMinimum {
                code: discount.code.clone(),
                minimum: discount.min_order_amount,
            });
        }

        let discount_amount = round_amount(discount.discount_for(subtotal));
        let mut items = pricing.items.clone();
        let mut allocated = 0.0;
        let last = items.len().saturating_sub(1);

        for (i, line) in items.iter_mut().enumerate() {
            let share = if i == last {
                round_amount(discount_amount - allocated)
            } else {
                round_amount(discount_amount * line.subtotal / subtotal)
            };
            allocated += share;

            let taxable = line.subtotal - share;
            line.discount = share;
            line.tax = round_amount(taxable * line.tax_rate / 100.0);
            line.total = round_amount(taxable + line.tax);
        }

        let summary = PricingSummary::from_items(
            &items,
            pricing.summary.currency,
            Some(discount.code.clone()),
        );

        debug!(
            code = %discount.code,
            discount_amount,
            total = summary.total_amount,
            "Discount applied"
        );

        Ok(DiscountOutcome {
            pricing: PricingBreakdown {
                items,
                summary,
                metadata: pricing.metadata.clone(),
            },
            code: discount.code.clone(),
            discount_amount,
            description: discount.description.clone(),
        })
    }
}

fn join(values: &[String]) -> String {
    values.join(",")
}

/// Project a breakdown into the provider's order payload
pub fn format_for_razorpay(pricing: &PricingBreakdown) -> ProviderOrderPayload {
    let summary = &pricing.summary;
    let mut notes = BTreeMap::new();

    notes.insert("item_count".to_string(), summary.item_count.to_string());
    notes.insert("subtotal".to_string(), format!("{:.2}", summary.subtotal));
    notes.insert("total_tax".to_string(), format!("{:.2}", summary.total_tax));
    notes.insert(
        "discount_amount".to_string(),
        format!("{:.2}", summary.discount_amount),
    );
    if let Some(code) = &summary.discount_code {
        notes.insert("discount_code".to_string(), code.clone());
    }
    notes.insert("hsn_codes".to_string(), join(&pricing.metadata.hsn_codes));
    notes.insert("categories".to_string(), join(&pricing.metadata.categories));
    notes.insert("craftsmen".to_string(), join(&pricing.metadata.craftsmen));
    notes.insert(
        "total_weight".to_string(),
        pricing.metadata.total_weight.to_string(),
    );
    let product_ids: Vec<String> = pricing.items.iter().map(|i| i.product_id.clone()).collect();
    notes.insert("product_ids".to_string(), join(&product_ids));

    ProviderOrderPayload {
        amount: summary.currency.to_smallest_unit(summary.total_amount),
        currency: summary.currency.as_str().to_string(),
        receipt: generate_receipt_id(),
        notes,
    }
}
