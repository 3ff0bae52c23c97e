// src/domain/service/sizing.rs
// Lot sizing from account funds

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::models::{Account, TradingSignal};

/// Capital per lot for option underlyings missing from [`OPTION_LOTS`].
pub const OPTION_FALLBACK_CAPITAL: Decimal = dec!(25000);

/// Underlying name fragment -> (units per lot, capital per lot).
///
/// Checked in order, so "banknifty" and "finnifty" must precede "nifty".
const OPTION_LOTS: [(&str, Decimal, Decimal); 3] = [
    ("banknifty", dec!(15), dec!(25000)),
    ("finnifty", dec!(40), dec!(33000)),
    ("nifty", dec!(50), dec!(33000)),
];

/// Equity quantity: funds over price, rounded to one decimal place.
pub fn size_equity(account: &Account, signal: &TradingSignal) -> Decimal {
    account
        .funds
        .checked_div(signal.price)
        .map(|qty| qty.round_dp(1))
        .unwrap_or(Decimal::ZERO)
}

/// Option quantity from the lot table, falling back to one lot per 25k of funds.
pub fn size_option(account: &Account, signal: &TradingSignal) -> Decimal {
    let symbol = signal.symbol.to_lowercase();

    for (key, lot_units, per_lot) in OPTION_LOTS.iter() {
        if symbol.contains(key) {
            let lots = account.funds.checked_div(*per_lot).unwrap_or(Decimal::ZERO);
            return (lots * *lot_units).ceil();
        }
    }

    account
        .funds
        .checked_div(OPTION_FALLBACK_CAPITAL)
        .unwrap_or(Decimal::ZERO)
        .ceil()
}
