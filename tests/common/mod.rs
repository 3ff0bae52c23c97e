// tests/common/mod.rs
// In-memory collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use signal_fanout::domain::errors::{ExchangeError, ExchangeResult};
use signal_fanout::domain::models::{
    Account, InstrumentClass, OrderRequest, OrderResponse, OrderSide, StopLossKind,
    StopLossPolicy, TradingSignal,
};
use signal_fanout::domain::repository::{AccountDirectory, MarketRepository, OrderGateway};

/// Records every order; rejects orders for listed pseudo accounts.
#[derive(Default)]
pub struct FakeGateway {
    orders: Mutex<Vec<OrderRequest>>,
    rejected: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    down: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject(&self, pseudo_account: &str) {
        self.rejected.lock().unwrap().insert(pseudo_account.to_string());
    }

    /// Hold submissions for `pseudo_account` before answering.
    pub fn delay(&self, pseudo_account: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(pseudo_account.to_string(), delay);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderGateway for FakeGateway {
    async fn submit(&self, order: &OrderRequest) -> ExchangeResult<OrderResponse> {
        let delay = self.delays.lock().unwrap().get(&order.pseudo_account).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.down.load(Ordering::SeqCst) {
            return Err(ExchangeError::Connection("Cannot connect to API: refused".into()));
        }
        if self.rejected.lock().unwrap().contains(&order.pseudo_account) {
            return Err(ExchangeError::Order("insufficient margin".into()));
        }

        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        Ok(OrderResponse {
            order_id: format!("ord-{}", orders.len()),
            average_price: None,
        })
    }
}

pub struct FakeDirectory {
    accounts: Vec<Account>,
    margins: HashMap<String, Decimal>,
    margin_down: bool,
}

impl FakeDirectory {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            margins: HashMap::new(),
            margin_down: false,
        }
    }

    pub fn with_margin(mut self, account_id: &str, margin: Decimal) -> Self {
        self.margins.insert(account_id.to_string(), margin);
        self
    }

    pub fn with_margin_down(mut self) -> Self {
        self.margin_down = true;
        self
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }
}

#[async_trait]
impl AccountDirectory for FakeDirectory {
    async fn active_accounts(&self) -> ExchangeResult<Vec<Account>> {
        Ok(self.accounts.clone())
    }

    async fn available_margin(&self, account: &Account) -> ExchangeResult<Option<Decimal>> {
        if self.margin_down {
            return Err(ExchangeError::Timeout("margin".into()));
        }
        Ok(self.margins.get(&account.account_id).copied())
    }
}

/// Every symbol resolves to `tok-<symbol>`; prices are set per symbol.
#[derive(Default)]
pub struct FakeMarket {
    prices: Mutex<HashMap<String, Decimal>>,
    pub searches: AtomicUsize,
}

impl FakeMarket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl MarketRepository for FakeMarket {
    async fn search_token(&self, symbol: &str) -> ExchangeResult<Option<String>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!("tok-{}", symbol)))
    }

    async fn last_price(&self, symbol: &str, _token: &str) -> ExchangeResult<Decimal> {
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::Api(format!("no quote for {}", symbol)))
    }
}

pub fn account(name: &str, funds: Decimal, kind: &str, value: Decimal) -> Account {
    Account {
        pseudo_account: name.to_string(),
        account_id: format!("id-{}", name),
        funds,
        stop_loss: StopLossPolicy {
            kind: StopLossKind::from(kind),
            value,
        },
    }
}

pub fn signal(
    symbol: &str,
    action: OrderSide,
    price: Decimal,
    class: InstrumentClass,
) -> TradingSignal {
    TradingSignal {
        symbol: symbol.to_string(),
        action,
        price,
        class,
        strategy: "test".to_string(),
    }
}
