use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use stockflow_core::{IntentToken, ProductId, TransactionType};
use stockflow_products::{Product, StockDelta};

use super::{ProductClient, ProductClientError};

#[derive(Debug, Serialize)]
struct StockUpdateBody {
    quantity: i64,
    #[serde(rename = "type")]
    kind: TransactionType,
    intent_token: IntentToken,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Product client speaking the Product service's JSON-over-HTTP API.
#[derive(Debug, Clone)]
pub struct HttpProductClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProductClient {
    /// `timeout` bounds every single request; retries are the caller's business.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProductClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProductClientError::InvalidResponse(format!("http client setup: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn product_url(&self, product_id: ProductId) -> String {
        format!("{}/products/{}", self.base_url, product_id)
    }
}

fn transport_error(err: reqwest::Error) -> ProductClientError {
    // Connect failures and timeouts leave the outcome unknown: retry.
    ProductClientError::Unreachable(err.to_string())
}

async fn error_from_response(resp: reqwest::Response) -> ProductClientError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .message
        .or(body.error)
        .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });

    match status {
        StatusCode::NOT_FOUND => ProductClientError::NotFound,
        StatusCode::BAD_REQUEST => ProductClientError::InsufficientStock(message),
        s if s.is_server_error() => {
            ProductClientError::Unreachable(format!("{}: {message}", s.as_u16()))
        }
        s => ProductClientError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

#[async_trait::async_trait]
impl ProductClient for HttpProductClient {
    async fn fetch(&self, product_id: ProductId) -> Result<Product, ProductClientError> {
        let resp = self
            .client
            .get(self.product_url(product_id))
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            // A 400 on a read is not a stock problem.
            return Err(match error_from_response(resp).await {
                ProductClientError::InsufficientStock(message) => ProductClientError::Rejected {
                    status: 400,
                    message,
                },
                other => other,
            });
        }

        resp.json::<Product>()
            .await
            .map_err(|e| ProductClientError::InvalidResponse(e.to_string()))
    }

    async fn apply_delta(&self, delta: &StockDelta) -> Result<(), ProductClientError> {
        let body = StockUpdateBody {
            quantity: delta.quantity,
            kind: delta.kind,
            intent_token: delta.intent_token,
        };

        let resp = self
            .client
            .patch(format!("{}/stock", self.product_url(delta.product_id)))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if resp.status().is_success() {
            tracing::debug!(
                product_id = %delta.product_id,
                intent_token = %delta.intent_token,
                status = resp.status().as_u16(),
                "remote stock update accepted"
            );
            return Ok(());
        }

        Err(error_from_response(resp).await)
    }
}
