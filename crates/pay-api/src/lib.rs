//! # pay-api
//!
//! HTTP API layer for shieldcart.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Catalog, pricing, discount and shipping endpoints backed by the trusted catalog
//! - Guarded checkout that reconciles the amount before opening a provider order
//! - A collection endpoint for remotely shipped client log entries
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check and breaker status |
//! | GET | `/api/v1/products` | List products |
//! | GET | `/api/v1/products/{id}` | Get product |
//! | POST | `/api/v1/pricing/validate` | Price a cart |
//! | POST | `/api/v1/pricing/verify` | Price a cart and check the expected total |
//! | POST | `/api/v1/pricing/discount` | Apply a discount code to a breakdown |
//! | POST | `/api/v1/shipping/quote` | Shipping estimate |
//! | POST | `/api/v1/checkout` | Reconcile and create a provider order |
//! | POST | `/api/v1/logs` | Collect a client log entry |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
