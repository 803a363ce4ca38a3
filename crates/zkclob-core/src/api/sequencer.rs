//! Sequencer (order backend) HTTP client.
//!
//! The sequencer accepts a proven order's public parameters together with
//! the circuit's order hash and returns the numeric id it assigned.

use crate::types::{CircuitOutputs, OrderParams};
use crate::{Error, Result};
use alloy_primitives::B256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

/// Body of `POST /v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    pub pair_id: u64,
    pub side: u8,
    pub price_tick: u64,
    pub amount: u64,
    pub time_bucket: u32,
    pub nonce: u64,
    /// Decimal order hash as emitted by the circuit.
    pub order_hash: String,
    pub pk_hash: B256,
}

impl SubmitOrderRequest {
    /// Build the wire body from prepared params and the proof's public outputs.
    ///
    /// `pk_hash` carries the pair id hash.
    pub fn new(pair_id: u64, params: &OrderParams, outputs: &CircuitOutputs) -> Result<Self> {
        params.check_ranges()?;
        Ok(Self {
            pair_id,
            side: params.side,
            price_tick: params.price_tick.to::<u64>(),
            amount: params.amount.to::<u64>(),
            time_bucket: params.time_bucket.to::<u32>(),
            nonce: params.nonce.to::<u64>(),
            order_hash: outputs.order_hash.clone(),
            pk_hash: params.pair_id_hash,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitOrderResponse {
    pub order_id: u64,
}

impl SubmitOrderResponse {
    pub fn tx_hash(&self) -> String {
        tx_hash_from_order_id(self.order_id)
    }
}

/// Display transaction hash: `0x` followed by the order id in hex,
/// left-padded to 64 digits.
pub fn tx_hash_from_order_id(order_id: u64) -> String {
    format!("0x{:064x}", order_id)
}

/// Anything that accepts proven orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderBackend: Send + Sync {
    async fn submit_order(&self, order: &SubmitOrderRequest) -> Result<SubmitOrderResponse>;
}

/// HTTP client for the sequencer.
pub struct SequencerClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl SequencerClient {
    /// Default sequencer base URL.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8080";

    pub fn new(base_url: Option<String>, timeout_secs: u64) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(timeout_secs))
            .connect_timeout(StdDuration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            base_url: base_url
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http_client,
        }
    }

    pub fn from_config(config: &crate::config::BackendConfig) -> Self {
        Self::new(Some(config.url.clone()), config.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.base_url)
    }
}

#[async_trait]
impl OrderBackend for SequencerClient {
    async fn submit_order(&self, order: &SubmitOrderRequest) -> Result<SubmitOrderResponse> {
        let url = self.orders_url();
        let body = serde_json::to_string(order)?;

        debug!(url = %url, nonce = order.nonce, "Submitting order to sequencer");

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Submission {
                message: format!("sequencer unreachable: {}", e),
                status: None,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            warn!(status = status, body = %text, "Sequencer rejected order");
            return Err(Error::Submission {
                message: format!("Failed to submit order: {} - {}", status, text),
                status: Some(status),
            });
        }

        let result: SubmitOrderResponse = response.json().await?;
        info!(order_id = result.order_id, "Order accepted by sequencer");
        Ok(result)
    }
}
