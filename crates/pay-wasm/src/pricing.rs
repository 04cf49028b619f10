//! Client-side pricing helpers.
//!
//! These mirror the server's reconciliation so the checkout page can reject
//! a bad cart before opening the payment widget. The server still re-prices
//! every order; nothing computed here is trusted for charging.

use pay_core::{
    calculate_shipping_cost, format_for_razorpay, CartItem, Currency, DiscountOutcome,
    PricingBreakdown, PricingReconciler, Product, ProductCatalog, ProviderOrderPayload,
    ShippingQuote, ValidationResult,
};

fn reconciler(products: Vec<Product>) -> PricingReconciler<ProductCatalog> {
    PricingReconciler::new(ProductCatalog { products })
}

pub fn price_cart(products: Vec<Product>, items: &[CartItem]) -> ValidationResult {
    reconciler(products).validate_cart_pricing(items)
}

/// Price the cart and require its total to match what the page displays
pub fn verify_cart(products: Vec<Product>, items: &[CartItem], expected_amount: f64) -> ValidationResult {
    reconciler(products).validate_before_payment(items, expected_amount)
}

pub fn apply_discount(pricing: &PricingBreakdown, code: &str) -> Result<DiscountOutcome, String> {
    reconciler(Vec::new())
        .apply_discount_code(pricing, code)
        .map_err(|e| e.to_string())
}

pub fn order_payload(pricing: &PricingBreakdown) -> ProviderOrderPayload {
    format_for_razorpay(pricing)
}

pub fn shipping_quote(weight: f64, destination_code: &str, expedited: bool) -> ShippingQuote {
    calculate_shipping_cost(weight, destination_code, expedited)
}

/// Format an amount for display, e.g. `format_amount(1234.5, "INR")` gives `₹1234.50`
pub fn format_amount(amount: f64, currency: &str) -> Result<String, String> {
    let currency: Currency = serde_json::from_value(serde_json::Value::String(
        currency.trim().to_uppercase(),
    ))
    .map_err(|_| format!("Unsupported currency: {}", currency))?;
    Ok(currency.format(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn products() -> Vec<Product> {
        vec![
            Product::new("brass-diya", "Brass Diya", 499.0).with_stock(10),
            Product::new("clay-lamp", "Clay Lamp", 150.0).with_stock(0),
        ]
    }

    #[test]
    fn test_price_cart() {
        let result = price_cart(products(), &[CartItem::new("brass-diya", 2)]);
        assert!(result.is_valid);
        let pricing = result.pricing.unwrap();
        assert_eq!(pricing.summary.total_amount, 998.0);
        assert_eq!(pricing.summary.total_amount_minor, 99_800);
    }

    #[test]
    fn test_out_of_stock_item_is_rejected() {
        let result = price_cart(products(), &[CartItem::new("clay-lamp", 1)]);
        assert!(!result.is_valid);
        assert!(result.pricing.is_none());
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn test_verify_cart_catches_displayed_total_drift() {
        let items = [CartItem::new("brass-diya", 2)];
        assert!(verify_cart(products(), &items, 998.0).is_valid);

        let drifted = verify_cart(products(), &items, 899.0);
        assert!(!drifted.is_valid);
        assert!(drifted.pricing.is_none());
    }

    #[test]
    fn test_unknown_discount_code() {
        let pricing = price_cart(products(), &[CartItem::new("brass-diya", 2)])
            .pricing
            .unwrap();
        assert!(apply_discount(&pricing, "NOT-A-CODE").is_err());
    }

    #[test]
    fn test_order_payload_uses_minor_units() {
        let pricing = price_cart(products(), &[CartItem::new("brass-diya", 1)])
            .pricing
            .unwrap();
        let payload = order_payload(&pricing);
        assert_eq!(payload.amount, 49_900);
        assert_eq!(payload.currency, "INR");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1234.5, "INR").unwrap(), "₹1234.50");
        assert_eq!(format_amount(1500.0, "jpy").unwrap(), "¥1500");
        assert!(format_amount(10.0, "XYZ").is_err());
    }
}
