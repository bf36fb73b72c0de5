//! HTTP order submission.

use crate::error::{BrokerError, BrokerResult};
use crate::order::OrderRequest;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tgate_catalog::InstrumentCatalog;
use tgate_trade::OrderIntent;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default timeout for order requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts live-trade orders to the broker endpoint.
pub struct BrokerSink {
    client: Client,
    order_url: String,
    catalog: Arc<InstrumentCatalog>,
}

impl BrokerSink {
    pub fn new(order_url: impl Into<String>, catalog: Arc<InstrumentCatalog>) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            order_url: order_url.into(),
            catalog,
        })
    }

    /// Submit one intent. Crypto and uncatalogued symbols are skipped;
    /// broker failure is logged and the trade state is not rolled back.
    pub async fn submit(&self, intent: &OrderIntent) {
        let Some(request) = OrderRequest::from_intent(intent, &self.catalog) else {
            debug!(symbol = %intent.symbol, "No outbound order for symbol");
            return;
        };

        match self.post(&request).await {
            Ok(()) => info!(
                symbol = %request.symbol,
                side = %request.transaction_type,
                quantity = request.quantity,
                "Order submitted"
            ),
            Err(e) => warn!(
                symbol = %request.symbol,
                error = %e,
                "Order submission failed (no retry)"
            ),
        }
    }

    async fn post(&self, request: &OrderRequest) -> BrokerResult<()> {
        let response = self
            .client
            .post(&self.order_url)
            .json(request)
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Drain the order intent channel until it closes. In-flight
    /// requests complete; their result is logged and discarded.
    pub async fn run(self, mut rx: mpsc::Receiver<OrderIntent>) {
        while let Some(intent) = rx.recv().await {
            self.submit(&intent).await;
        }
        debug!("Order channel closed, broker sink stopping");
    }
}
