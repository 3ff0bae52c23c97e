// src/application/usecase/mod.rs
pub mod fan_out_usecase;
pub mod stop_loss_usecase;

pub use fan_out_usecase::{TradeFanOut, DEFAULT_OPTION_MIN_FUNDS, NO_ACTIVE_ACCOUNTS};
pub use stop_loss_usecase::{
    CycleOutcome, CycleReport, MonitorSupervisor, StopLossMonitor, DEFAULT_POLL_INTERVAL,
};
