// src/application/dto/parser.rs
// Conversions between DTOs and domain models

use rust_decimal::Decimal;

use super::{AccountDto, GatewayResponse, SignalRequest, SignalResponse, TradeRequestDto};
use crate::domain::errors::{TradingError, TradingResult};
use crate::domain::models::{
    Account, FanOutReport, OrderRequest, StopLossKind, StopLossPolicy, TradingSignal,
};

/// Index families the desk trades; signals on anything else are refused.
pub const RECOGNIZED_INDICES: [&str; 5] =
    ["banknifty", "finnifty", "midcpnifty", "nifty", "sensex"];

/// Parse one JSON signal.
pub fn parse_signal(message: &str) -> TradingResult<SignalRequest> {
    serde_json::from_str(message)
        .map_err(|e| TradingError::InvalidSignal(format!("malformed signal: {}", e)))
}

impl SignalRequest {
    /// Validate and convert into a domain signal.
    pub fn into_signal(self) -> TradingResult<TradingSignal> {
        let symbol = self.symbolname.trim().to_string();
        let lowered = symbol.to_lowercase();

        if !RECOGNIZED_INDICES.iter().any(|index| lowered.contains(index)) {
            return Err(TradingError::InvalidSignal(format!(
                "unrecognized symbol: {}",
                symbol
            )));
        }
        if self.price <= Decimal::ZERO {
            return Err(TradingError::InvalidSignal(format!(
                "price must be positive, got {}",
                self.price
            )));
        }

        Ok(TradingSignal {
            symbol,
            action: self.signal,
            price: self.price,
            class: self.class,
            strategy: self.strategyname,
        })
    }
}

impl From<AccountDto> for Account {
    fn from(dto: AccountDto) -> Self {
        Account {
            pseudo_account: dto.pseudo_account_name,
            account_id: dto.account_id,
            funds: dto.fund,
            stop_loss: StopLossPolicy {
                kind: StopLossKind::from(dto.stop_loss_type.as_str()),
                value: dto.stop_loss,
            },
        }
    }
}

impl From<&OrderRequest> for TradeRequestDto {
    fn from(order: &OrderRequest) -> Self {
        TradeRequestDto {
            pseudo_account: order.pseudo_account.clone(),
            symbol: order.symbol.clone(),
            trade_type: order.side,
            order_type: order.order_type,
            product_type: order.product_type,
            quantity: order.quantity,
            price: order.price,
            trigger_price: order.trigger_price,
        }
    }
}

impl GatewayResponse {
    /// Venue order id, wherever the gateway chose to put it.
    pub fn order_id(&self) -> Option<String> {
        use serde_json::Value;

        match &self.result {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            Value::Object(fields) => ["orderId", "order_id", "id", "platformId"]
                .iter()
                .find_map(|key| match fields.get(*key) {
                    Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
                    Some(Value::Number(id)) => Some(id.to_string()),
                    _ => None,
                }),
            _ => None,
        }
    }
}

impl SignalResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        SignalResponse {
            status: false,
            data: serde_json::Value::String(message.into()),
        }
    }
}

impl From<FanOutReport> for SignalResponse {
    fn from(report: FanOutReport) -> Self {
        if !report.overall_success {
            return SignalResponse::failure(
                report
                    .message
                    .unwrap_or_else(|| "Trade signal was not executed".to_string()),
            );
        }

        let data = serde_json::to_value(&report.trades).unwrap_or_else(|e| {
            log::error!("Failed to encode trade summaries: {}", e);
            serde_json::Value::Array(Vec::new())
        });
        SignalResponse { status: true, data }
    }
}
