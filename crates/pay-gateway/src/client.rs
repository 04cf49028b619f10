//! # HTTP Payment Gateway
//!
//! Single-attempt order creation against the provider orders endpoint.

use crate::config::GatewayConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pay_core::{
    Currency, GatewayOrder, OrderStatus, PaymentError, PaymentGateway, PaymentResult,
    ProviderOrderPayload,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

/// Opens orders at the configured provider endpoint
pub struct HttpPaymentGateway {
    config: GatewayConfig,
    client: Client,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn provider(&self) -> String {
        self.config.provider.clone()
    }

    fn map_send_error(&self, e: reqwest::Error) -> PaymentError {
        if e.is_timeout() {
            PaymentError::Timeout(format!("{} orders endpoint: {}", self.config.provider, e))
        } else {
            PaymentError::NetworkError(e.to_string())
        }
    }

    fn map_status(
        &self,
        status: StatusCode,
        retry_after: Option<u64>,
        body: &str,
        payload: &ProviderOrderPayload,
    ) -> PaymentError {
        let message = serde_json::from_str::<ProviderErrorResponse>(body)
            .map(|r| r.error.description)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PaymentError::Unauthorized(message),
            StatusCode::CONFLICT => PaymentError::DuplicatePayment {
                order_id: payload.receipt.clone(),
            },
            StatusCode::TOO_MANY_REQUESTS => PaymentError::RateLimited {
                provider: self.provider(),
                retry_after_secs: retry_after.unwrap_or(1),
            },
            _ => PaymentError::ProviderError {
                provider: self.provider(),
                status: Some(status.as_u16()),
                message,
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, payload), fields(receipt = %payload.receipt, amount = payload.amount))]
    async fn create_order(&self, payload: &ProviderOrderPayload) -> PaymentResult<GatewayOrder> {
        if payload.amount <= 0 {
            return Err(PaymentError::InvalidRequest(
                "Order amount must be positive".to_string(),
            ));
        }

        let currency: Currency =
            serde_json::from_value(serde_json::Value::String(payload.currency.clone())).map_err(
                |_| PaymentError::UnsupportedCurrency {
                    currency: payload.currency.clone(),
                },
            )?;

        debug!("Creating provider order: {} {}", payload.amount, payload.currency);

        let response = self
            .client
            .post(&self.config.orders_url)
            .header("Authorization", self.config.auth_header())
            .header("Idempotency-Key", &payload.receipt)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            error!("Provider order API error: status={}, body={}", status, body);
            return Err(self.map_status(status, retry_after, &body, payload));
        }

        let order: ProviderOrderResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse provider order: {}", e))
        })?;

        if let Some(amount) = order.amount.filter(|a| *a != payload.amount) {
            return Err(PaymentError::AmountMismatch {
                expected: currency.from_smallest_unit(payload.amount),
                calculated: currency.from_smallest_unit(amount),
            });
        }

        info!("Created provider order: id={}", order.id);

        Ok(GatewayOrder {
            id: order.id,
            provider: self.provider(),
            amount: payload.amount,
            currency,
            receipt: order.receipt.unwrap_or_else(|| payload.receipt.clone()),
            status: order.status.unwrap_or_default(),
            created_at: order
                .created_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .unwrap_or_else(Utc::now),
        })
    }

    fn provider_name(&self) -> &str {
        &self.config.provider
    }
}

// =============================================================================
// Provider API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ProviderOrderResponse {
    id: String,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    receipt: Option<String>,
    #[serde(default)]
    status: Option<OrderStatus>,
    #[serde(default)]
    created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorResponse {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(alias = "message")]
    description: String,
}
