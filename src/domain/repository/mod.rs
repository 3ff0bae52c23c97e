// src/domain/repository/mod.rs
// Repository interfaces for the remote collaborators

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::errors::ExchangeResult;
use crate::domain::models::{Account, OrderRequest, OrderResponse};

/// Submits orders to the brokerage venue.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit(&self, order: &OrderRequest) -> ExchangeResult<OrderResponse>;
}

/// Directory of trading accounts eligible for fan-out.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn active_accounts(&self) -> ExchangeResult<Vec<Account>>;

    /// Latest available margin, `None` when the directory has no figure.
    async fn available_margin(&self, account: &Account) -> ExchangeResult<Option<Decimal>>;
}

/// Instrument lookup and last-traded price on the market venue.
#[async_trait]
pub trait MarketRepository: Send + Sync {
    async fn search_token(&self, symbol: &str) -> ExchangeResult<Option<String>>;
    async fn last_price(&self, symbol: &str, token: &str) -> ExchangeResult<Decimal>;
}

/// Establishes or renews the market venue session.
#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    async fn refresh(&self) -> ExchangeResult<()>;
}
