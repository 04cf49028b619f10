//! # Product Types
//!
//! Trusted product catalog for shieldcart.
//! Products are loaded from `config/products.toml`; this catalog is the
//! authority pricing reconciliation checks client carts against.

use serde::{Deserialize, Serialize};

/// Maximum units of a single product allowed in one cart line
pub const MAX_QUANTITY_PER_ITEM: u32 = 10;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    INR,
    USD,
    EUR,
    GBP,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }

    /// Every supported currency has 100 minor units per major unit
    pub const MINOR_UNITS: f64 = 100.0;

    /// Convert a decimal amount to the smallest currency unit (paise, cents, pence)
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        (amount * Self::MINOR_UNITS).round() as i64
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        amount as f64 / Self::MINOR_UNITS
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::INR => "₹",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
        }
    }

    /// Format a decimal amount for display (e.g., "₹1000.00")
    pub fn format(&self, amount: f64) -> String {
        format!("{}{:.2}", self.symbol(), amount)
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::INR
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round a monetary amount to two decimal places
pub fn round_amount(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Pricing sub-record of a catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPricing {
    /// Unit price in major currency units
    pub base_price: f64,

    /// Tax rate in percent (e.g. 12.0 for 12% GST)
    #[serde(default)]
    pub tax_rate: f64,

    /// Units currently in stock
    pub stock: u32,

    #[serde(default)]
    pub currency: Currency,
}

/// Business metadata of a catalog product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub sku: String,

    #[serde(default)]
    pub category: String,

    /// Craftsman / vendor who makes the product
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub craftsman: Option<String>,

    /// HSN tax classification code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsn_code: Option<String>,

    /// Shipping weight of one unit in kilograms
    #[serde(default)]
    pub shipping_weight: f64,
}

/// A product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier (e.g., "brass-diya-large")
    pub id: String,

    /// Display name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    pub pricing: ProductPricing,

    #[serde(default)]
    pub metadata: ProductMetadata,

    /// Whether this product is active and available for purchase
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Create a new product with a base price, no tax and zero stock
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_price: f64) -> Self {
        let id = id.into();
        Self {
            metadata: ProductMetadata {
                sku: id.to_uppercase(),
                ..ProductMetadata::default()
            },
            id,
            name: name.into(),
            description: String::new(),
            pricing: ProductPricing {
                base_price,
                tax_rate: 0.0,
                stock: 0,
                currency: Currency::INR,
            },
            active: true,
        }
    }

    /// Builder: set tax rate in percent
    pub fn with_tax_rate(mut self, rate: f64) -> Self {
        self.pricing.tax_rate = rate;
        self
    }

    /// Builder: set stock count
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.pricing.stock = stock;
        self
    }

    /// Builder: set currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.pricing.currency = currency;
        self
    }

    /// Builder: set SKU
    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.metadata.sku = sku.into();
        self
    }

    /// Builder: set category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.metadata.category = category.into();
        self
    }

    /// Builder: set craftsman
    pub fn with_craftsman(mut self, craftsman: impl Into<String>) -> Self {
        self.metadata.craftsman = Some(craftsman.into());
        self
    }

    /// Builder: set HSN code
    pub fn with_hsn_code(mut self, code: impl Into<String>) -> Self {
        self.metadata.hsn_code = Some(code.into());
        self
    }

    /// Builder: set unit shipping weight (kg)
    pub fn with_shipping_weight(mut self, kg: f64) -> Self {
        self.metadata.shipping_weight = kg;
        self
    }

    /// Builder: mark inactive
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Price of one cart line as computed by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedPrice {
    pub unit_price: f64,
    pub quantity: u32,
    pub tax_rate: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

/// Compute the price of `quantity` units of `product`, collecting every
/// validation failure instead of stopping at the first.
pub fn calculate_price(product: &Product, quantity: u32) -> Result<CalculatedPrice, Vec<String>> {
    let mut errors = Vec::new();
    let pricing = &product.pricing;

    if !product.active {
        errors.push("Product is not available for purchase".to_string());
    }
    if quantity == 0 {
        errors.push("Quantity must be at least 1".to_string());
    }
    if quantity > MAX_QUANTITY_PER_ITEM {
        errors.push(format!(
            "Quantity exceeds the maximum of {} per item",
            MAX_QUANTITY_PER_ITEM
        ));
    }
    if !pricing.base_price.is_finite() || pricing.base_price <= 0.0 {
        errors.push("Invalid base price".to_string());
    }
    if !(0.0..=100.0).contains(&pricing.tax_rate) {
        errors.push("Invalid tax rate".to_string());
    }
    if quantity > pricing.stock {
        errors.push(format!(
            "Insufficient stock: only {} available",
            pricing.stock
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let subtotal = round_amount(pricing.base_price * quantity as f64);
    let tax = round_amount(subtotal * pricing.tax_rate / 100.0);

    Ok(CalculatedPrice {
        unit_price: pricing.base_price,
        quantity,
        tax_rate: pricing.tax_rate,
        subtotal,
        tax,
        total: round_amount(subtotal + tax),
    })
}

/// Read access to a trusted catalog plus its pricing function
pub trait Catalog: Send + Sync {
    /// Look up a product by ID
    fn product_by_id(&self, id: &str) -> Option<&Product>;

    /// Price a quantity of a product, or list why it cannot be sold
    fn validate_pricing(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<CalculatedPrice, Vec<String>> {
        calculate_price(product, quantity)
    }
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    pub products: Vec<Product>,
}

impl ProductCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Add a product to the catalog
    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Builder: add a product
    pub fn with_product(mut self, product: Product) -> Self {
        self.add(product);
        self
    }

    /// Find a product by ID
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Get all active products
    pub fn active_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.active)
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

impl Catalog for ProductCatalog {
    fn product_by_id(&self, id: &str) -> Option<&Product> {
        self.get(id)
    }
}
