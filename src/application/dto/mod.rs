// src/application/dto/mod.rs
// Wire formats exchanged with callers and remote services

pub mod parser;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::models::{InstrumentClass, OrderSide, OrderType, ProductType};

/// Inbound trade signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRequest {
    pub symbolname: String,
    pub signal: OrderSide,
    pub price: Decimal,
    #[serde(rename = "type")]
    pub class: InstrumentClass,
    #[serde(default)]
    pub strategyname: String,
}

/// Response returned for every signal request.
///
/// `data` carries the per-account trades on success and a message otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct SignalResponse {
    pub status: bool,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub pseudo_account_name: String,
    pub account_id: String,
    pub fund: Decimal,
    #[serde(rename = "stoplosstype", default)]
    pub stop_loss_type: String,
    #[serde(rename = "stoploss", default)]
    pub stop_loss: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountListResponse {
    #[serde(rename = "accountslist", default)]
    pub accounts: Vec<AccountDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginResponse {
    #[serde(alias = "availablecash", alias = "fund")]
    pub available_cash: Option<Decimal>,
}

/// Order payload for the brokerage gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequestDto {
    pub pseudo_account: String,
    pub symbol: String,
    pub trade_type: OrderSide,
    pub order_type: OrderType,
    pub product_type: ProductType,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub trigger_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub result: serde_json::Value,
    pub message: Option<String>,
}

/// Envelope used by every market venue endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueEnvelope<T> {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "errorcode", default)]
    pub error_code: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub clientcode: &'a str,
    pub password: &'a str,
    pub totp: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub jwt_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchScripRequest<'a> {
    pub exchange: &'a str,
    pub searchscrip: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScripMatch {
    pub tradingsymbol: String,
    pub symboltoken: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LtpRequest<'a> {
    pub exchange: &'a str,
    pub tradingsymbol: &'a str,
    pub symboltoken: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LtpData {
    pub ltp: Decimal,
}
