//! # shieldcart
//!
//! Payment API with amount reconciliation, retries and circuit breaking.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export PAYMENT_ORDERS_URL=https://api.razorpay.com/v1/orders
//! export PAYMENT_API_TOKEN=...
//! export PAYMENT_PUBLIC_KEY=rzp_test_...
//! export ENVIRONMENT=staging
//!
//! # Run the server
//! shieldcart
//! ```

use pay_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Products loaded: {}", state.catalog().products.len());
    info!("Client log session: {}", state.logger.session_id());

    let app = routes::create_router(state);

    info!("shieldcart starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Checkout: POST http://{}/api/v1/checkout", addr);
        info!("Log collection: POST http://{}/api/v1/logs", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to one JSON object per line
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

fn print_banner() {
    println!(
        r#"
  shieldcart
  ━━━━━━━━━━━━━━━━━━━━━━━
  Reconciled, resilient payments
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
