// src/infrastructure/exchange/mod.rs
// Brokerage order gateway over HTTP

use async_trait::async_trait;

use crate::application::dto::{GatewayResponse, TradeRequestDto};
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::models::{OrderRequest, OrderResponse};
use crate::domain::repository::OrderGateway;
use crate::infrastructure::http::HttpClient;

pub struct HttpOrderGateway {
    http: HttpClient,
    url: String,
    api_key: String,
}

impl HttpOrderGateway {
    pub fn new(http: HttpClient, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    async fn submit(&self, order: &OrderRequest) -> ExchangeResult<OrderResponse> {
        let payload = TradeRequestDto::from(order);

        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&payload)?
            .send()
            .await
            .map_err(|e| match e {
                ExchangeError::Timeout(_) => e,
                other => ExchangeError::Connection(format!("Cannot connect to API: {}", other)),
            })?;

        if !response.is_success() {
            return Err(ExchangeError::Api(format!(
                "API request failed with status code: {}",
                response.status.as_u16()
            )));
        }

        let body: GatewayResponse = response.json()?;
        if !body.status {
            return Err(ExchangeError::Order(
                body.message.unwrap_or_else(|| "API error".to_string()),
            ));
        }

        let order_id = body.order_id().unwrap_or_else(|| {
            log::warn!(
                "Order for {} on {} accepted without an order id",
                order.pseudo_account,
                order.symbol
            );
            String::new()
        });

        log::info!(
            "Order placed: {} {} {} x{} @ {} (id {})",
            order.pseudo_account,
            order.side,
            order.symbol,
            order.quantity,
            order.price,
            order_id
        );

        Ok(OrderResponse {
            order_id,
            average_price: None,
        })
    }
}
