// src/domain/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Core Trading Components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    #[serde(alias = "buy", alias = "Buy")]
    Buy,
    #[serde(alias = "sell", alias = "Sell")]
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    /// The side that closes a position opened on `self`.
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "MARKET")]
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "INTRADAY")]
    Intraday,
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProductType::Intraday => write!(f, "INTRADAY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentClass {
    Equity,
    Option,
}

/// An instruction to open a position. Never mutated after it is received.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSignal {
    pub symbol: String,
    pub action: OrderSide,
    pub price: Decimal,
    pub class: InstrumentClass,
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopLossKind {
    /// Fixed currency amount the position may lose.
    Amount,
    /// Share of the account balance the position may lose.
    Percentage,
    Unrecognized(String),
}

impl From<&str> for StopLossKind {
    fn from(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "amount" | "absolute" | "fixed" | "value" => StopLossKind::Amount,
            "percentage" | "percent" | "%" => StopLossKind::Percentage,
            _ => StopLossKind::Unrecognized(raw.to_string()),
        }
    }
}

impl fmt::Display for StopLossKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StopLossKind::Amount => write!(f, "amount"),
            StopLossKind::Percentage => write!(f, "percentage"),
            StopLossKind::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopLossPolicy {
    pub kind: StopLossKind,
    pub value: Decimal,
}

/// A trading account as supplied by the account directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub pseudo_account: String,
    pub account_id: String,
    pub funds: Decimal,
    pub stop_loss: StopLossPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub pseudo_account: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub product_type: ProductType,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Zero means no trigger price.
    pub trigger_price: Decimal,
}

/// Normalized acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResponse {
    pub order_id: String,
    pub average_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub order_id: String,
    pub pseudo_account: String,
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub balance: Decimal,
    pub stop_loss: StopLossPolicy,
}

/// Outcome of one per-account submission in a fan-out batch.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderResult {
    Placed(OrderFill),
    Rejected {
        pseudo_account: String,
        account_id: String,
        message: String,
    },
}

impl OrderResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OrderResult::Placed(_))
    }
}

/// A monitored open position, as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub pseudo_account: String,
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub balance: Decimal,
    pub stop_loss_price: Option<Decimal>,
    pub order_id: String,
    #[serde(default)]
    pub strategy: String,
    pub opened_at: DateTime<Utc>,
}

impl OpenPosition {
    /// Check if the position must be closed at `current_price`.
    ///
    /// A position without a trigger price never fires.
    pub fn should_trigger(&self, current_price: Decimal) -> bool {
        match (self.side, self.stop_loss_price) {
            (_, None) => false,
            (OrderSide::Buy, Some(stop_loss)) => current_price <= stop_loss,
            (OrderSide::Sell, Some(stop_loss)) => current_price >= stop_loss,
        }
    }

    /// Build the market order that closes this position at `current_price`.
    pub fn counter_order(&self, current_price: Decimal) -> OrderRequest {
        OrderRequest {
            pseudo_account: self.pseudo_account.clone(),
            symbol: self.symbol.clone(),
            side: self.side.opposite(),
            order_type: OrderType::Market,
            product_type: ProductType::Intraday,
            quantity: self.quantity,
            price: current_price,
            trigger_price: Decimal::ZERO,
        }
    }
}

/// Durable record of open positions, keyed by symbol.
///
/// A symbol is present only while it has at least one position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<String, Vec<OpenPosition>>,
}

impl<'de> Deserialize<'de> for Ledger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut entries = BTreeMap::<String, Vec<OpenPosition>>::deserialize(deserializer)?;
        entries.retain(|_, positions| !positions.is_empty());
        Ok(Ledger { entries })
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn positions(&self, symbol: &str) -> &[OpenPosition] {
        self.entries.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn position_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<OpenPosition>)> {
        self.entries.iter()
    }

    pub fn append(&mut self, symbol: &str, positions: Vec<OpenPosition>) {
        if positions.is_empty() {
            return;
        }
        self.entries
            .entry(symbol.to_string())
            .or_default()
            .extend(positions);
    }

    /// Drop every position of `account_id` under `symbol`.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, symbol: &str, account_id: &str) -> bool {
        let Some(list) = self.entries.get_mut(symbol) else {
            return false;
        };
        let before = list.len();
        list.retain(|p| p.account_id != account_id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.entries.remove(symbol);
        }
        removed
    }

    /// Drop the first entry under `symbol` equal to `position`, leaving any
    /// other position of the same account in place.
    pub fn remove_position(&mut self, symbol: &str, position: &OpenPosition) -> bool {
        let Some(list) = self.entries.get_mut(symbol) else {
            return false;
        };
        let Some(index) = list.iter().position(|p| p == position) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            self.entries.remove(symbol);
        }
        true
    }
}

/// Per-account outcome reported back to the caller of a fan-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradeOutcome {
    Placed {
        order_id: String,
        quantity: Decimal,
        price: Decimal,
        stop_loss_price: Option<Decimal>,
    },
    Rejected {
        message: String,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeSummary {
    pub pseudo_account: String,
    pub account_id: String,
    #[serde(flatten)]
    pub outcome: TradeOutcome,
}

impl TradeSummary {
    pub fn is_placed(&self) -> bool {
        matches!(self.outcome, TradeOutcome::Placed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanOutReport {
    pub overall_success: bool,
    pub trades: Vec<TradeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FanOutReport {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            overall_success: false,
            trades: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn placed_count(&self) -> usize {
        self.trades.iter().filter(|t| t.is_placed()).count()
    }
}
