// 11.0: every committed state change produces an event. used for audit trails and
// downstream settlement. the EventPayload enum lists all event types.

use crate::position::PositionChange;
use crate::types::{AccountId, BlockNumber, Direction, MarketId, Quote, SignedSize, Tick, Timestamp, TokenSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub block: BlockNumber,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, block: BlockNumber, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            block,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Ledger events
    Minted(MintedEvent),
    Burned(BurnedEvent),

    // Trade events
    Swapped(SwappedEvent),
    PositionClosed(PositionClosedEvent),

    // Risk events
    PositionLiquidated(PositionLiquidatedEvent),
    BadDebt(BadDebtEvent),

    // Settlement
    RealizedPnlSettled(RealizedPnlSettledEvent),

    // Admin / environment
    ParameterUpdated(ParameterUpdatedEvent),
    MarketAdded(MarketAddedEvent),
    BlockAdvanced(BlockAdvancedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub token: TokenSide,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub token: TokenSide,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwappedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub direction: Direction,
    pub exchanged_position_size: Decimal,
    pub exchanged_notional: Decimal,
    pub fee: Quote,
    pub realized_pnl: Quote,
    pub change: PositionChange,
    pub tick_after: Tick,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub closed_size: Decimal,
    pub remaining_size: SignedSize,
    pub realized_pnl: Quote,
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub liquidator: AccountId,
    pub liquidated_size: Decimal,
    pub liquidation_notional: Quote,
    pub penalty: Quote,
    pub liquidator_reward: Quote,
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadDebtEvent {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub debt_amount: Quote,
    pub covered_by_insurance: Quote,
    pub uncovered: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealizedPnlSettledEvent {
    pub account_id: AccountId,
    pub amount: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterUpdatedEvent {
    pub name: String,
    pub market_id: Option<MarketId>,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAddedEvent {
    pub market_id: MarketId,
    pub name: String,
    pub fee_ratio: Decimal,
    pub max_tick_crossed_within_block: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAdvancedEvent {
    pub from: BlockNumber,
    pub to: BlockNumber,
}
