//! # pay-wasm
//!
//! WebAssembly bindings for the shieldcart checkout page.
//!
//! This crate provides:
//! - Single-flight loading of the provider checkout script
//! - Cart pricing and total verification before the widget opens
//! - Shipping quotes and amount formatting
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { loadCheckoutScript, verifyCart } from 'shieldcart-wasm';
//!
//! await init();
//! preloadCheckoutScript();
//!
//! const result = verifyCart(products, [{ product_id: 'brass-diya', quantity: 2 }], 998);
//! if (result.is_valid) {
//!   await loadCheckoutScript();
//!   new Razorpay(options).open();
//! }
//! ```
//!
//! ## Building
//!
//! ```bash
//! wasm-pack build --target web
//! ```

pub mod browser;
pub mod pricing;
pub mod script_loader;

pub use browser::BrowserScriptHost;
pub use script_loader::{CheckoutScriptLoader, ScriptHost, ScriptLoadError};

use pay_core::{CartItem, PricingBreakdown, Product};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

thread_local! {
    static LOADER: CheckoutScriptLoader<BrowserScriptHost> =
        CheckoutScriptLoader::new(BrowserScriptHost);
}

fn from_js<T: DeserializeOwned>(value: JsValue, what: &str) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

// === Checkout Script ===

/// Resolves once `window.Razorpay` is usable; rejects with the load error
#[wasm_bindgen(js_name = loadCheckoutScript)]
pub fn load_checkout_script(force_reload: Option<bool>) -> js_sys::Promise {
    let load = LOADER.with(|loader| loader.load(force_reload.unwrap_or(false)));
    wasm_bindgen_futures::future_to_promise(async move {
        load.await
            .map(|()| JsValue::TRUE)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    })
}

/// Start loading in the background; failures are logged to the console
#[wasm_bindgen(js_name = preloadCheckoutScript)]
pub fn preload_checkout_script() {
    let preload = LOADER.with(|loader| loader.preload());
    wasm_bindgen_futures::spawn_local(preload);
}

#[wasm_bindgen(js_name = isCheckoutScriptLoaded)]
pub fn is_checkout_script_loaded() -> bool {
    LOADER.with(|loader| loader.is_loaded())
}

// === Pricing ===

/// Price `items` against `products`; returns a `ValidationResult`
#[wasm_bindgen(js_name = priceCart)]
pub fn price_cart(products: JsValue, items: JsValue) -> Result<JsValue, JsValue> {
    let products: Vec<Product> = from_js(products, "products")?;
    let items: Vec<CartItem> = from_js(items, "cart items")?;
    to_js(&pricing::price_cart(products, &items))
}

#[wasm_bindgen(js_name = verifyCart)]
pub fn verify_cart(products: JsValue, items: JsValue, expected_amount: f64) -> Result<JsValue, JsValue> {
    let products: Vec<Product> = from_js(products, "products")?;
    let items: Vec<CartItem> = from_js(items, "cart items")?;
    to_js(&pricing::verify_cart(products, &items, expected_amount))
}

#[wasm_bindgen(js_name = applyDiscount)]
pub fn apply_discount(pricing: JsValue, code: &str) -> Result<JsValue, JsValue> {
    let pricing: PricingBreakdown = from_js(pricing, "pricing")?;
    let outcome = pricing::apply_discount(&pricing, code).map_err(|e| JsValue::from_str(&e))?;
    to_js(&outcome)
}

/// Provider order payload for a priced cart
#[wasm_bindgen(js_name = orderPayload)]
pub fn order_payload(pricing: JsValue) -> Result<JsValue, JsValue> {
    let pricing: PricingBreakdown = from_js(pricing, "pricing")?;
    to_js(&pricing::order_payload(&pricing))
}

#[wasm_bindgen(js_name = shippingQuote)]
pub fn shipping_quote(weight: f64, destination_code: &str, expedited: bool) -> Result<JsValue, JsValue> {
    to_js(&pricing::shipping_quote(weight, destination_code, expedited))
}

#[wasm_bindgen(js_name = formatAmount)]
pub fn format_amount(amount: f64, currency: &str) -> Result<String, JsValue> {
    pricing::format_amount(amount, currency).map_err(|e| JsValue::from_str(&e))
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
