// src/domain/mod.rs
pub mod errors;
pub mod models;
pub mod repository;
pub mod service;

// Re-export common types for convenience
pub use errors::{
    AppError, AppResult, ExchangeError, ExchangeResult, PersistenceError, PersistenceResult,
    TradingError, TradingResult,
};
pub use models::{
    Account, FanOutReport, InstrumentClass, Ledger, OpenPosition, OrderFill, OrderRequest,
    OrderResponse, OrderResult, OrderSide, OrderType, ProductType, StopLossKind, StopLossPolicy,
    TradeOutcome, TradeSummary, TradingSignal,
};
