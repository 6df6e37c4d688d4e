// 9.3 pool.rs: the virtual liquidity each market trades against.
// the clearing house only needs a tick reading, a dry-run quote and the real swap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::types::{round_up, Direction, Price, Tick};

// A swap as the pool sees it. amounts are what the pool takes in or pays out, fees excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub direction: Direction,
    pub is_exact_input: bool,
    pub amount: Decimal,
    // None = no limit. liquidations always pass None.
    pub price_limit: Option<Price>,
}

// Unsigned amounts that moved through the pool, plus the tick on either side of the swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub base: Decimal,
    pub quote: Decimal,
    pub tick_before: Tick,
    pub tick_after: Tick,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Decimal, available: Decimal },

    #[error("Slippage exceeded: price {price} crosses limit {limit}")]
    SlippageExceeded { price: Decimal, limit: Decimal },

    #[error("Swap of {amount} does not fit the pool's reserves")]
    AmountTooLarge { amount: Decimal },
}

// Every market owns one pool. implementations must return the same outcome from
// simulate_swap and swap when nothing touched the pool in between.
pub trait Pool: Debug + Send {
    fn current_tick(&self) -> Tick;

    fn simulate_swap(&self, request: &SwapRequest) -> Result<SwapOutcome, PoolError>;

    fn swap(&mut self, request: &SwapRequest) -> Result<SwapOutcome, PoolError>;
}

// x * y = k over virtual reserves. amounts paid out round down, amounts paid in round up,
// so rounding dust always stays with the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantProductPool {
    base_reserve: Decimal,
    quote_reserve: Decimal,
}

impl ConstantProductPool {
    pub fn new(base_reserve: Decimal, quote_reserve: Decimal) -> Self {
        Self {
            base_reserve,
            quote_reserve,
        }
    }

    pub fn reserves(&self) -> (Decimal, Decimal) {
        (self.base_reserve, self.quote_reserve)
    }

    // quote per base. None while either side is empty
    pub fn price(&self) -> Option<Price> {
        spot_price(self.base_reserve, self.quote_reserve)
    }

    fn quote(&self, request: &SwapRequest) -> Result<(SwapOutcome, Decimal, Decimal), PoolError> {
        let (x, y) = (self.base_reserve, self.quote_reserve);
        if x <= Decimal::ZERO || y <= Decimal::ZERO {
            return Err(PoolError::InsufficientLiquidity {
                requested: request.amount,
                available: Decimal::ZERO,
            });
        }
        let amount = request.amount;
        let too_large = PoolError::AmountTooLarge { amount };
        let k = x.checked_mul(y).ok_or_else(|| too_large.clone())?;
        // k over the moved reserve, rounded in the pool's favour
        let solve = |reserve: Decimal| {
            k.checked_div(reserve)
                .map(round_up)
                .ok_or_else(|| too_large.clone())
        };

        // new reserves after the swap
        let (x_after, y_after) = match (request.direction, request.is_exact_input) {
            (Direction::QuoteToBase, true) => {
                let y_after = y.checked_add(amount).ok_or_else(|| too_large.clone())?;
                (solve(y_after)?, y_after)
            }
            (Direction::QuoteToBase, false) => {
                if amount >= x {
                    return Err(PoolError::InsufficientLiquidity {
                        requested: amount,
                        available: x,
                    });
                }
                let x_after = x - amount;
                (x_after, solve(x_after)?)
            }
            (Direction::BaseToQuote, true) => {
                let x_after = x.checked_add(amount).ok_or_else(|| too_large.clone())?;
                (x_after, solve(x_after)?)
            }
            (Direction::BaseToQuote, false) => {
                if amount >= y {
                    return Err(PoolError::InsufficientLiquidity {
                        requested: amount,
                        available: y,
                    });
                }
                let y_after = y - amount;
                (solve(y_after)?, y_after)
            }
        };

        let outcome = SwapOutcome {
            base: (x_after - x).abs(),
            quote: (y_after - y).abs(),
            tick_before: tick_of(x, y),
            tick_after: tick_of(x_after, y_after),
        };

        if let (Some(limit), Some(after)) = (request.price_limit, spot_price(x_after, y_after)) {
            let crossed = match request.direction {
                Direction::QuoteToBase => after > limit,
                Direction::BaseToQuote => after < limit,
            };
            if crossed {
                return Err(PoolError::SlippageExceeded {
                    price: after.value(),
                    limit: limit.value(),
                });
            }
        }

        Ok((outcome, x_after, y_after))
    }
}

fn spot_price(base: Decimal, quote: Decimal) -> Option<Price> {
    quote.checked_div(base).and_then(Price::new)
}

fn tick_of(base: Decimal, quote: Decimal) -> Tick {
    spot_price(base, quote)
        .map(Tick::from_price)
        .unwrap_or(Tick(i32::MIN))
}

impl Pool for ConstantProductPool {
    fn current_tick(&self) -> Tick {
        tick_of(self.base_reserve, self.quote_reserve)
    }

    fn simulate_swap(&self, request: &SwapRequest) -> Result<SwapOutcome, PoolError> {
        self.quote(request).map(|(outcome, _, _)| outcome)
    }

    fn swap(&mut self, request: &SwapRequest) -> Result<SwapOutcome, PoolError> {
        let (outcome, x_after, y_after) = self.quote(request)?;
        self.base_reserve = x_after;
        self.quote_reserve = y_after;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pool() -> ConstantProductPool {
        ConstantProductPool::new(dec!(100), dec!(1000))
    }

    fn request(direction: Direction, is_exact_input: bool, amount: Decimal) -> SwapRequest {
        SwapRequest {
            direction,
            is_exact_input,
            amount,
            price_limit: None,
        }
    }

    #[test]
    fn sell_base_exact_input() {
        let mut pool = pool();
        let out = pool
            .swap(&request(Direction::BaseToQuote, true, dec!(25)))
            .unwrap();
        assert_eq!(out.base, dec!(25));
        assert_eq!(out.quote, dec!(200));
        assert!(out.tick_after < out.tick_before);
        assert_eq!(pool.reserves(), (dec!(125), dec!(800)));
        assert_eq!(pool.price().map(|p| p.value()), Some(dec!(6.4)));
    }

    #[test]
    fn buy_base_exact_output() {
        let mut pool = ConstantProductPool::new(dec!(125), dec!(800));
        let out = pool
            .swap(&request(Direction::QuoteToBase, false, dec!(25)))
            .unwrap();
        assert_eq!(out.base, dec!(25));
        assert_eq!(out.quote, dec!(200));
        assert_eq!(pool.reserves(), (dec!(100), dec!(1000)));
    }

    #[test]
    fn simulate_matches_swap_and_does_not_mutate() {
        let mut pool = pool();
        let req = request(Direction::QuoteToBase, true, dec!(37.5));
        let simulated = pool.simulate_swap(&req).unwrap();
        assert_eq!(pool.reserves(), (dec!(100), dec!(1000)));
        let executed = pool.swap(&req).unwrap();
        assert_eq!(simulated, executed);
    }

    #[test]
    fn draining_a_reserve_fails() {
        let pool = pool();
        let result = pool.simulate_swap(&request(Direction::QuoteToBase, false, dec!(100)));
        assert!(matches!(result, Err(PoolError::InsufficientLiquidity { .. })));

        let empty = ConstantProductPool::new(dec!(0), dec!(0));
        assert!(empty
            .simulate_swap(&request(Direction::BaseToQuote, true, dec!(1)))
            .is_err());
    }

    #[test]
    fn oversized_amounts_error_instead_of_overflowing() {
        let pool = pool();
        let err = pool
            .simulate_swap(&request(Direction::BaseToQuote, true, Decimal::MAX))
            .unwrap_err();
        assert_eq!(err, PoolError::AmountTooLarge { amount: Decimal::MAX });

        let huge = ConstantProductPool::new(Decimal::MAX, Decimal::MAX);
        assert!(matches!(
            huge.simulate_swap(&request(Direction::QuoteToBase, true, dec!(1))),
            Err(PoolError::AmountTooLarge { .. })
        ));
        assert_eq!(pool.reserves(), (dec!(100), dec!(1000)));
    }

    #[test]
    fn price_limit_rejects() {
        let pool = pool();
        let mut req = request(Direction::BaseToQuote, true, dec!(25));
        req.price_limit = Some(Price::new_unchecked(dec!(7)));
        assert!(matches!(
            pool.simulate_swap(&req),
            Err(PoolError::SlippageExceeded { .. })
        ));

        req.price_limit = Some(Price::new_unchecked(dec!(6)));
        assert!(pool.simulate_swap(&req).is_ok());
    }
}
