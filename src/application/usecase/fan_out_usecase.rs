// src/application/usecase/fan_out_usecase.rs
// Fan a trade signal out to every active account

use chrono::Utc;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::application::usecase::stop_loss_usecase::MonitorSupervisor;
use crate::domain::errors::AppResult;
use crate::domain::models::{
    Account, FanOutReport, InstrumentClass, OpenPosition, OrderFill, OrderRequest, OrderResult,
    OrderType, ProductType, StopLossKind, TradeOutcome, TradeSummary, TradingSignal,
};
use crate::domain::repository::{AccountDirectory, OrderGateway};
use crate::domain::service::{size_equity, size_option, trigger_price};
use crate::infrastructure::persistence::OpenTradeLedger;

pub const NO_ACTIVE_ACCOUNTS: &str = "No active accounts found";

/// Default funds an account needs before it may trade options.
pub const DEFAULT_OPTION_MIN_FUNDS: Decimal = dec!(100000);

/// What happened to one account before and during submission.
enum Dispatch {
    Skipped { account: Account, reason: String },
    Submitted(OrderResult),
}

pub struct TradeFanOut {
    gateway: Arc<dyn OrderGateway>,
    directory: Arc<dyn AccountDirectory>,
    ledger: Arc<OpenTradeLedger>,
    monitor: Option<Arc<MonitorSupervisor>>,
    option_min_funds: Decimal,
}

impl TradeFanOut {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        directory: Arc<dyn AccountDirectory>,
        ledger: Arc<OpenTradeLedger>,
    ) -> Self {
        Self {
            gateway,
            directory,
            ledger,
            monitor: None,
            option_min_funds: DEFAULT_OPTION_MIN_FUNDS,
        }
    }

    /// Start this monitor whenever a batch opens new positions.
    pub fn with_monitor(mut self, monitor: Arc<MonitorSupervisor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_option_min_funds(mut self, min_funds: Decimal) -> Self {
        self.option_min_funds = min_funds;
        self
    }

    /// Place `signal` on every account concurrently and record the fills.
    ///
    /// Per-account failures are reported in the summary; only a ledger write
    /// failure makes the whole call fail.
    pub async fn execute(
        &self,
        signal: &TradingSignal,
        accounts: &[Account],
    ) -> AppResult<FanOutReport> {
        if accounts.is_empty() {
            log::warn!("Signal for {} dropped: no active accounts", signal.symbol);
            return Ok(FanOutReport::failed(NO_ACTIVE_ACCOUNTS));
        }

        log::info!(
            "Fanning out {} {} @ {} ({:?}, strategy '{}') to {} account(s)",
            signal.action,
            signal.symbol,
            signal.price,
            signal.class,
            signal.strategy,
            accounts.len()
        );

        let dispatches =
            join_all(accounts.iter().map(|account| self.dispatch(signal, account))).await;

        let symbol = ledger_symbol(signal);
        let mut trades = Vec::with_capacity(dispatches.len());
        let mut positions = Vec::new();

        for dispatch in dispatches {
            match dispatch {
                Dispatch::Skipped { account, reason } => {
                    log::info!("Skipping {}: {}", account.pseudo_account, reason);
                    trades.push(TradeSummary {
                        pseudo_account: account.pseudo_account,
                        account_id: account.account_id,
                        outcome: TradeOutcome::Skipped { reason },
                    });
                }
                Dispatch::Submitted(OrderResult::Rejected {
                    pseudo_account,
                    account_id,
                    message,
                }) => {
                    log::error!("Order for {} failed: {}", pseudo_account, message);
                    trades.push(TradeSummary {
                        pseudo_account,
                        account_id,
                        outcome: TradeOutcome::Rejected { message },
                    });
                }
                Dispatch::Submitted(OrderResult::Placed(fill)) => {
                    let position = open_position(&fill, &signal.strategy);
                    trades.push(TradeSummary {
                        pseudo_account: fill.pseudo_account.clone(),
                        account_id: fill.account_id.clone(),
                        outcome: TradeOutcome::Placed {
                            order_id: fill.order_id.clone(),
                            quantity: fill.quantity,
                            price: fill.price,
                            stop_loss_price: position.stop_loss_price,
                        },
                    });
                    positions.push(position);
                }
            }
        }

        let opened = positions.len();
        if opened > 0 {
            self.ledger.append(&symbol, positions).await?;
            if let Some(monitor) = &self.monitor {
                monitor.ensure_running().await;
            }
        }

        log::info!(
            "Signal {} {}: {}/{} order(s) placed",
            signal.action,
            signal.symbol,
            opened,
            accounts.len()
        );

        Ok(FanOutReport {
            overall_success: true,
            trades,
            message: None,
        })
    }

    async fn dispatch(&self, signal: &TradingSignal, account: &Account) -> Dispatch {
        let mut account = account.clone();
        account.funds = self.refresh_funds(&account).await;

        if signal.class == InstrumentClass::Option && account.funds < self.option_min_funds {
            let reason = format!(
                "funds {} below option minimum {}",
                account.funds, self.option_min_funds
            );
            return Dispatch::Skipped { account, reason };
        }

        let quantity = match signal.class {
            InstrumentClass::Equity => size_equity(&account, signal),
            InstrumentClass::Option => size_option(&account, signal),
        };
        if quantity <= Decimal::ZERO {
            let reason = format!("computed quantity {} is not tradable", quantity);
            return Dispatch::Skipped { account, reason };
        }

        let request = build_order_request(&account, signal, quantity);
        let result = match self.gateway.submit(&request).await {
            Ok(response) => OrderResult::Placed(OrderFill {
                order_id: response.order_id,
                pseudo_account: account.pseudo_account,
                account_id: account.account_id,
                symbol: request.symbol,
                side: request.side,
                quantity: request.quantity,
                price: response.average_price.unwrap_or(request.price),
                balance: account.funds,
                stop_loss: account.stop_loss,
            }),
            Err(e) => OrderResult::Rejected {
                pseudo_account: account.pseudo_account,
                account_id: account.account_id,
                message: e.to_string(),
            },
        };
        Dispatch::Submitted(result)
    }

    /// Latest margin for `account`, or the directory figure when unavailable.
    async fn refresh_funds(&self, account: &Account) -> Decimal {
        match self.directory.available_margin(account).await {
            Ok(Some(funds)) => funds,
            Ok(None) => account.funds,
            Err(e) => {
                log::warn!(
                    "Margin refresh for {} failed, using directory funds {}: {}",
                    account.pseudo_account,
                    account.funds,
                    e
                );
                account.funds
            }
        }
    }
}

fn ledger_symbol(signal: &TradingSignal) -> String {
    signal.symbol.to_lowercase()
}

fn build_order_request(
    account: &Account,
    signal: &TradingSignal,
    quantity: Decimal,
) -> OrderRequest {
    OrderRequest {
        pseudo_account: account.pseudo_account.clone(),
        symbol: ledger_symbol(signal),
        side: signal.action,
        order_type: OrderType::Market,
        product_type: ProductType::Intraday,
        quantity,
        price: signal.price,
        trigger_price: Decimal::ZERO,
    }
}

fn open_position(fill: &OrderFill, strategy: &str) -> OpenPosition {
    let stop_loss_price = trigger_price(
        fill.side,
        fill.price,
        fill.quantity,
        fill.balance,
        &fill.stop_loss,
    );
    if let StopLossKind::Unrecognized(kind) = &fill.stop_loss.kind {
        log::warn!(
            "Account {} has unknown stop-loss type '{}'; {} will not be auto-closed",
            fill.pseudo_account,
            kind,
            fill.symbol
        );
    }

    OpenPosition {
        pseudo_account: fill.pseudo_account.clone(),
        account_id: fill.account_id.clone(),
        symbol: fill.symbol.clone(),
        side: fill.side,
        quantity: fill.quantity,
        entry_price: fill.price,
        balance: fill.balance,
        stop_loss_price,
        order_id: fill.order_id.clone(),
        strategy: strategy.to_string(),
        opened_at: Utc::now(),
    }
}
