// src/domain/service/stop_loss.rs
// Stop-loss trigger price computation

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::models::{OrderSide, StopLossKind, StopLossPolicy};

/// Price at which a freshly opened position has lost what its policy allows.
///
/// `None` for unrecognized policies or a zero quantity; such positions are
/// never closed automatically. The result is not clamped and may be negative.
pub fn trigger_price(
    side: OrderSide,
    entry_price: Decimal,
    quantity: Decimal,
    balance: Decimal,
    policy: &StopLossPolicy,
) -> Option<Decimal> {
    let allowed_loss = match policy.kind {
        StopLossKind::Amount => policy.value,
        StopLossKind::Percentage => balance * policy.value / dec!(100),
        StopLossKind::Unrecognized(_) => return None,
    };
    let per_unit = allowed_loss.checked_div(quantity)?;

    Some(match side {
        OrderSide::Buy => entry_price - per_unit,
        OrderSide::Sell => entry_price + per_unit,
    })
}
