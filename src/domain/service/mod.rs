// src/domain/service/mod.rs
// Pure risk and sizing rules

pub mod sizing;
pub mod stop_loss;

pub use sizing::{size_equity, size_option, OPTION_FALLBACK_CAPITAL};
pub use stop_loss::trigger_price;
