//! Property-based tests for the debt ledger under random trade sequences.
//!
//! These tests verify ledger invariants hold whatever order trades arrive in.

use clearing_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

type House = ClearingHouse<IndexPriceFeed, InMemoryVault>;

const OWNER: AccountId = AccountId(0);
const TRADER: AccountId = AccountId(1);
const ETH: MarketId = MarketId(1);

fn house(max_tick: u32) -> House {
    let mut oracle = IndexPriceFeed::new();
    oracle.set_price(ETH, Price::new_unchecked(dec!(10)));
    let mut vault = InMemoryVault::new();
    vault.deposit(TRADER, dec!(1_000_000)).unwrap();

    let mut house = ClearingHouse::new(
        ClearingHouseConfig::with_owner(OWNER),
        EngineConfig::default(),
        oracle,
        vault,
    )
    .unwrap();
    let mut market = MarketConfig::eth_perp();
    market.max_tick_crossed_within_block = max_tick;
    house
        .add_market(OWNER, market, Box::new(ConstantProductPool::new(dec!(100), dec!(1000))))
        .unwrap();
    house.advance_block(BlockNumber(1));
    house
}

// Strategies for generating trades
fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::BaseToQuote), Just(Direction::QuoteToBase)]
}

fn trade_strategy() -> impl Strategy<Value = OpenPositionParams> {
    (direction_strategy(), any::<bool>(), 1i64..2_000i64).prop_map(|(direction, exact_input, raw)| {
        // base legs 0.01..20, quote legs 0.1..200
        let amount = match (direction, exact_input) {
            (Direction::BaseToQuote, true) | (Direction::QuoteToBase, false) => Decimal::new(raw, 2),
            _ => Decimal::new(raw, 1),
        };
        if exact_input {
            OpenPositionParams::exact_input(ETH, direction, amount)
        } else {
            OpenPositionParams::exact_output(ETH, direction, amount)
        }
    })
}

fn size_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=40i64).prop_map(Decimal::from)
}

fn assert_settled(house: &House) -> Result<(), TestCaseError> {
    for token in [TokenSide::Base, TokenSide::Quote] {
        let balance = house.get_token_info(TRADER, ETH, token);
        prop_assert!(balance.available >= Decimal::ZERO);
        prop_assert!(balance.debt >= Decimal::ZERO);
        // matched pairs are always burned
        prop_assert!(balance.available.is_zero() || balance.debt.is_zero());
    }
    Ok(())
}

proptest! {
    /// Counters never go negative and failed trades leave the account untouched
    #[test]
    fn ledger_stays_non_negative(trades in proptest::collection::vec(trade_strategy(), 1..20)) {
        let mut house = house(0);

        for params in trades {
            let before = house.account(TRADER).cloned();
            if house.open_position(TRADER, params).is_err() {
                prop_assert_eq!(house.account(TRADER).cloned(), before);
            }
            assert_settled(&house)?;
        }
    }

    /// Net base moves by exactly the exchanged size
    #[test]
    fn net_position_conserved(trades in proptest::collection::vec(trade_strategy(), 1..20)) {
        let mut house = house(0);

        for params in trades {
            let size_before = house.get_position_size(TRADER, ETH).value();
            if let Ok(result) = house.open_position(TRADER, params) {
                let size_after = house.get_position_size(TRADER, ETH).value();
                prop_assert_eq!(size_after, size_before + result.exchanged_position_size);
                prop_assert_eq!(result.position_size.value(), size_after);
            }
        }
    }

    /// Debt minted on the consumed token is exactly the shortfall
    #[test]
    fn minting_is_minimal(trades in proptest::collection::vec(trade_strategy(), 1..20)) {
        let mut house = house(0);

        for params in trades {
            let consumed = params.direction.consumed();
            let available_before = house.get_token_info(TRADER, ETH, consumed).available;

            if let Ok(result) = house.open_position(TRADER, params) {
                let (required, minted) = match consumed {
                    TokenSide::Base => (-result.exchanged_position_size, result.minted_base),
                    TokenSide::Quote => (-result.exchanged_notional, result.minted_quote),
                };
                prop_assert_eq!(minted, (required - available_before).max(Decimal::ZERO));
                // nothing is ever minted on the received side
                let other = match consumed {
                    TokenSide::Base => result.minted_quote,
                    TokenSide::Quote => result.minted_base,
                };
                prop_assert!(other.is_zero());
            }
        }
    }

    /// Closing the exact position leaves nothing behind on either token
    #[test]
    fn full_close_zeroes_both_sides(
        trades in proptest::collection::vec(trade_strategy(), 1..10),
    ) {
        let mut house = house(0);
        for params in trades {
            let _ = house.open_position(TRADER, params);
        }
        prop_assume!(!house.get_position_size(TRADER, ETH).is_zero());

        let result = house.close_position(TRADER, ETH, None).unwrap();
        prop_assert!(!result.partial);
        for token in [TokenSide::Base, TokenSide::Quote] {
            prop_assert_eq!(house.get_token_info(TRADER, ETH, token), TokenBalance::default());
        }
        prop_assert!(house.open_markets(TRADER).is_empty());
    }

    /// A blocked full close leaves exactly S * (1 - ratio)
    #[test]
    fn downgraded_close_keeps_remainder(
        size in size_strategy(),
        is_short in any::<bool>(),
        ratio_steps in 1i64..20i64,
    ) {
        // any full close of a whole unit moves this pool by far more than one tick
        let mut house = house(1);
        let ratio = Decimal::new(ratio_steps * 5, 2);
        house.set_partial_close_ratio(OWNER, ratio).unwrap();

        let open = if is_short {
            OpenPositionParams::exact_input(ETH, Direction::BaseToQuote, size)
        } else {
            OpenPositionParams::exact_output(ETH, Direction::QuoteToBase, size)
        };
        house.open_position(TRADER, open).unwrap();
        let position = house.get_position_size(TRADER, ETH).value();
        house.advance_block(BlockNumber(2));

        let result = house.close_position(TRADER, ETH, None).unwrap();
        prop_assert!(result.partial);
        prop_assert_eq!(
            house.get_position_size(TRADER, ETH).value(),
            position * (Decimal::ONE - ratio)
        );
    }

    /// Zero amount never mutates anything
    #[test]
    fn zero_amount_is_a_no_op(direction in direction_strategy(), exact_input in any::<bool>()) {
        let mut house = house(100);
        let events_before = house.events().len();
        let params = OpenPositionParams {
            market: ETH,
            direction,
            is_exact_input: exact_input,
            amount: Decimal::ZERO,
            price_limit: None,
        };

        prop_assert_eq!(house.open_position(TRADER, params), Err(EngineError::ZeroAmount));
        prop_assert!(house.account(TRADER).is_none());
        prop_assert_eq!(house.events().len(), events_before);
    }
}
