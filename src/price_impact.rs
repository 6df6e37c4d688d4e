//! Per-block price-impact guard.
//!
//! Each market remembers the pool tick it stood at before the first trade of
//! the current block. Once the pool already sits `max_tick_crossed_within_block`
//! or more ticks away from that reference, trades that add exposure (opens,
//! increases, reversals) are rejected. The first trade of a block is measured
//! against its own pre-trade tick and so always passes. Forced full closes
//! (close position, liquidation) are judged on where the pool would end up and
//! are shrunk to a partial close instead of being rejected. Plain reductions
//! always go through.

use crate::position::PositionChange;
use crate::types::{BlockNumber, Tick};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GuardState {
    /// No trade has touched the market in the current block.
    #[default]
    Unarmed,
    Armed { block: BlockNumber, start_tick: Tick },
}

/// Distances from the block's start tick for one quoted swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactReading {
    /// Ticks already crossed this block before the trade.
    pub pre_trade: u32,
    /// Furthest the pool sits from the start tick, before or after the trade.
    pub post_trade: u32,
    /// Zero disables the guard.
    pub max: u32,
}

impl ImpactReading {
    pub fn already_over(&self) -> bool {
        self.max != 0 && self.pre_trade >= self.max
    }

    pub fn would_cross(&self) -> bool {
        self.max != 0 && self.post_trade >= self.max
    }
}

/// What the executor should do with a request given the reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Reject { tick_delta: u32, max: u32 },
    /// Replace the full close with a partial one.
    Downgrade { tick_delta: u32, max: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceImpactGuard {
    state: GuardState,
}

impl PriceImpactGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Block boundary signal. An armed guard from an older block resets.
    pub fn observe_block(&mut self, block: BlockNumber) {
        if let GuardState::Armed { block: armed, .. } = self.state {
            if armed < block {
                self.state = GuardState::Unarmed;
            }
        }
    }

    /// Reference tick for `block`: the recorded start tick, or the live tick when unarmed.
    pub fn start_tick(&self, block: BlockNumber, current: Tick) -> Tick {
        match self.state {
            GuardState::Armed {
                block: armed,
                start_tick,
            } if armed == block => start_tick,
            _ => current,
        }
    }

    /// Measure a swap that moves the pool from `tick_before` to `tick_after` in `block`.
    pub fn check(&self, block: BlockNumber, tick_before: Tick, tick_after: Tick, max_tick: u32) -> ImpactReading {
        let start = self.start_tick(block, tick_before);
        let pre_trade = start.distance(tick_before);
        ImpactReading {
            pre_trade,
            post_trade: pre_trade.max(start.distance(tick_after)),
            max: max_tick,
        }
    }

    /// Record the start tick on the block's first committed trade. Later calls in the same block are no-ops.
    pub fn arm(&mut self, block: BlockNumber, tick_before: Tick) {
        let start_tick = self.start_tick(block, tick_before);
        self.state = GuardState::Armed { block, start_tick };
    }
}

/// Map a reading onto a request. `forced_close` marks full closes issued by
/// close position or liquidation; those are downgraded on the post-trade
/// distance. Anything adding exposure, reversals included, is rejected on the
/// pre-trade distance.
pub fn decide(reading: ImpactReading, change: PositionChange, forced_close: bool) -> GuardDecision {
    let max = reading.max;
    if forced_close {
        if reading.would_cross() {
            return GuardDecision::Downgrade {
                tick_delta: reading.post_trade,
                max,
            };
        }
        return GuardDecision::Proceed;
    }
    if change.adds_exposure() && reading.already_over() {
        return GuardDecision::Reject {
            tick_delta: reading.pre_trade,
            max,
        };
    }
    GuardDecision::Proceed
}
