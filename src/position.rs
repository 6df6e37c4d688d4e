// 4.0: position accounting on top of the debt ledger. size = net base, open notional = net quote.
// 4.1 classifies a fill against the current position, 4.2 splits it into realized / carried pnl.

use crate::types::{round_down, Price, Quote, SignedSize};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionChange {
    Open,
    Increase,
    Reduce,
    Close,
    Reverse,
}

impl PositionChange {
    /// Trades that add risk. these go through the price-impact cap and the margin check.
    pub fn adds_exposure(&self) -> bool {
        matches!(
            self,
            PositionChange::Open | PositionChange::Increase | PositionChange::Reverse
        )
    }
}

// 4.1: exchanged_base is signed from the trader's side: + bought, - sold
pub fn classify(size_before: SignedSize, exchanged_base: Decimal) -> PositionChange {
    let delta = SignedSize::new(exchanged_base);
    match (size_before.side(), delta.side()) {
        (None, _) => PositionChange::Open,
        (Some(held), Some(traded)) if held == traded => PositionChange::Increase,
        (Some(_), _) => {
            if delta.abs() < size_before.abs() {
                PositionChange::Reduce
            } else if delta.abs() == size_before.abs() {
                PositionChange::Close
            } else {
                PositionChange::Reverse
            }
        }
    }
}

/// Position state after one fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeSettlement {
    pub change: PositionChange,
    pub realized_pnl: Quote,
    pub size_after: SignedSize,
    pub open_notional_after: Decimal,
}

// 4.2: realized pnl for a fill.
// the closed share of the existing open notional is netted against the quote the fill moved.
// on reversal the old position closes first and the remainder opens at the fill's rate.
pub fn settle_trade(
    size_before: SignedSize,
    open_notional_before: Decimal,
    exchanged_base: Decimal,
    exchanged_quote: Decimal,
) -> TradeSettlement {
    let change = classify(size_before, exchanged_base);
    let size_after = size_before.add(exchanged_base);

    let realized = match change {
        PositionChange::Open | PositionChange::Increase => Decimal::ZERO,
        PositionChange::Close => exchanged_quote + open_notional_before,
        PositionChange::Reduce => {
            let closed_notional = open_notional_before * exchanged_base.abs() / size_before.abs();
            exchanged_quote + round_down(closed_notional)
        }
        PositionChange::Reverse => {
            let closing_quote = exchanged_quote * size_before.abs() / exchanged_base.abs();
            open_notional_before + round_down(closing_quote)
        }
    };

    TradeSettlement {
        change,
        realized_pnl: Quote::new(realized),
        size_after,
        open_notional_after: open_notional_before + exchanged_quote - realized,
    }
}

/// Unrealized value of a position at `index`. open notional carries the entry cost with its sign.
/// None when the mark does not fit in a decimal.
pub fn position_value(size: SignedSize, open_notional: Decimal, index: Price) -> Option<Quote> {
    size.value()
        .checked_mul(index.value())?
        .checked_add(open_notional)
        .map(Quote::new)
}
