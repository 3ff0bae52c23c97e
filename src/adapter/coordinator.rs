// src/adapter/coordinator.rs
// Request entry point tying the signal path and the stop-loss monitor together

use std::sync::Arc;

use crate::application::dto::{SignalRequest, SignalResponse};
use crate::application::usecase::{MonitorSupervisor, TradeFanOut};
use crate::domain::errors::{AppError, AppResult};
use crate::domain::repository::AccountDirectory;
use crate::infrastructure::persistence::OpenTradeLedger;

pub const LEDGER_FAILURE: &str = "Orders were sent but the open-trade ledger could not be updated";
pub const INTERNAL_FAILURE: &str = "Internal error while processing signal";

pub struct TradingCoordinator {
    directory: Arc<dyn AccountDirectory>,
    fan_out: Arc<TradeFanOut>,
    monitor: Arc<MonitorSupervisor>,
    ledger: Arc<OpenTradeLedger>,
}

impl TradingCoordinator {
    pub fn new(
        directory: Arc<dyn AccountDirectory>,
        fan_out: Arc<TradeFanOut>,
        monitor: Arc<MonitorSupervisor>,
        ledger: Arc<OpenTradeLedger>,
    ) -> Self {
        Self {
            directory,
            fan_out,
            monitor,
            ledger,
        }
    }

    /// Handle one inbound signal. Never fails; every fault becomes a
    /// non-success response.
    pub async fn handle_signal(&self, request: SignalRequest) -> SignalResponse {
        let signal = match request.into_signal() {
            Ok(signal) => signal,
            Err(e) => {
                log::warn!("Rejected signal: {}", e);
                return SignalResponse::failure(e.to_string());
            }
        };

        let accounts = match self.directory.active_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                log::error!("Could not list accounts for {}: {}", signal.symbol, e);
                return SignalResponse::failure(format!("Failed to fetch accounts: {}", e));
            }
        };

        match self.fan_out.execute(&signal, &accounts).await {
            Ok(report) => report.into(),
            Err(AppError::Persistence(e)) => {
                log::error!("Ledger update for {} failed: {}", signal.symbol, e);
                SignalResponse::failure(format!("{}: {}", LEDGER_FAILURE, e))
            }
            Err(e) => {
                log::error!("Signal for {} failed: {}", signal.symbol, e);
                SignalResponse::failure(INTERNAL_FAILURE)
            }
        }
    }

    /// Restart monitoring for positions left open by a previous run.
    pub async fn resume(&self) -> AppResult<usize> {
        let ledger = self.ledger.load().await?;
        let open = ledger.position_count();
        if open > 0 {
            log::info!(
                "Resuming stop-loss monitoring for {} open position(s) on {} symbol(s)",
                open,
                ledger.symbols().len()
            );
            self.monitor.ensure_running().await;
        }
        Ok(open)
    }

    pub async fn shutdown(&self) {
        self.monitor.stop().await;
        log::info!("Trading coordinator stopped");
    }
}
