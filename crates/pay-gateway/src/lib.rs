//! # pay-gateway
//!
//! Opens provider orders over HTTP for shieldcart-rs.
//!
//! [`HttpPaymentGateway`] POSTs the provider-shaped order payload produced by
//! `pay_core::format_for_razorpay` to a configured orders endpoint and maps
//! the response into a `GatewayOrder`. Each call is a single attempt; retry
//! and circuit breaking live in `pay-resilience`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_gateway::HttpPaymentGateway;
//! use pay_core::{format_for_razorpay, PaymentGateway};
//!
//! let gateway = HttpPaymentGateway::from_env()?;
//! let order = gateway.create_order(&format_for_razorpay(&pricing)).await?;
//! ```

pub mod client;
pub mod config;

pub use client::HttpPaymentGateway;
pub use config::GatewayConfig;
