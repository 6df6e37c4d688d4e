//! Clearing engine simulation.
//!
//! Walks a single virtual ETH market through the clearing lifecycle: opening and
//! closing against the pool, the per-block price-impact cap forcing partial
//! closes, partial liquidations, and realized PnL settling into the vault.
//! Set `RUST_LOG=clearing_core=debug` to see every emitted event.

use clearing_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

type House = ClearingHouse<IndexPriceFeed, InMemoryVault>;

const OWNER: AccountId = AccountId(0);
const ALICE: AccountId = AccountId(1);
const BOB: AccountId = AccountId(2);
const KEEPER: AccountId = AccountId(3);
const ETH: MarketId = MarketId(1);

fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Perpetual Clearing Engine Simulation");
    println!("Virtual pool 100 vETH / 1000 vUSD, 1% fee\n");

    scenario_1_open_and_close()?;
    scenario_2_price_impact_partial_close()?;
    scenario_3_partial_liquidation()?;
    scenario_4_settlement_and_limits()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

/// Fresh house with one market and the index at 10. A `max_tick` of 0 turns the cap off.
fn setup(collateral: &[(AccountId, Decimal)], max_tick: u32) -> Result<House, EngineError> {
    let mut oracle = IndexPriceFeed::new();
    oracle.set_price(ETH, Price::new_unchecked(dec!(10)));

    let mut vault = InMemoryVault::new();
    for &(account, amount) in collateral {
        vault.deposit(account, amount)?;
    }

    let mut house = ClearingHouse::new(
        ClearingHouseConfig::with_owner(OWNER),
        EngineConfig::default(),
        oracle,
        vault,
    )?;
    let mut market = MarketConfig::eth_perp();
    market.max_tick_crossed_within_block = max_tick;
    house.add_market(OWNER, market, Box::new(ConstantProductPool::new(dec!(100), dec!(1000))))?;
    house.set_time(Timestamp::now());
    house.advance_block(BlockNumber(1));
    Ok(house)
}

fn short(amount: Decimal) -> OpenPositionParams {
    OpenPositionParams::exact_input(ETH, Direction::BaseToQuote, amount)
}

fn print_ledger(house: &House, account: AccountId) {
    let base = house.get_token_info(account, ETH, TokenSide::Base);
    let quote = house.get_token_info(account, ETH, TokenSide::Quote);
    println!(
        "  {account}: base {}/{} quote {}/{} (available/debt), owed pnl {}",
        base.available,
        base.debt,
        quote.available,
        quote.debt,
        house.get_owed_realized_pnl(account)
    );
}

/// Short, then buy it all back in the same block.
fn scenario_1_open_and_close() -> Result<(), EngineError> {
    println!("Scenario 1: Open and Close\n");

    let mut house = setup(&[(ALICE, dec!(1000))], 0)?;

    let open = house.open_position(ALICE, short(dec!(25)))?;
    println!(
        "  Alice sells 25 vETH: received {} vUSD, fee {}, minted {} vETH debt",
        open.exchanged_notional, open.fee, open.minted_base
    );
    print_ledger(&house, ALICE);
    println!("  Account value at index 10: {}", house.get_account_value(ALICE)?);

    let close = house.close_position(ALICE, ETH, None)?;
    println!(
        "  Alice buys back {} vETH for {} vUSD, realized {}",
        close.exchanged_position_size, -close.exchanged_notional, close.realized_pnl
    );
    print_ledger(&house, ALICE);
    println!("  Fees collected: {}\n", house.collected_fees(ETH)?);
    Ok(())
}

/// A full close that would move the pool past the tick cap closes a quarter instead.
fn scenario_2_price_impact_partial_close() -> Result<(), EngineError> {
    println!("Scenario 2: Price-Impact Partial Close\n");

    let mut house = setup(&[(ALICE, dec!(1000))], 100)?;
    house.open_position(ALICE, short(dec!(25)))?;
    println!("  Alice short 25 as the first trade of block 1, tick cap 100");
    house.advance_block(house.block().next());

    let close = house.close_position(ALICE, ETH, None)?;
    println!(
        "  Close request: partial = {}, closed {}, remaining {}",
        close.partial, close.exchanged_position_size, close.position_size
    );

    match house.open_position(ALICE, short(dec!(1))) {
        Err(err) => println!("  Adding to the short in the same block: {err}"),
        Ok(result) => println!("  Unexpected fill: {}", result.exchanged_position_size),
    }
    println!();
    Ok(())
}

/// Index spike makes a short liquidatable; each block only a partial can go through.
fn scenario_3_partial_liquidation() -> Result<(), EngineError> {
    println!("Scenario 3: Partial Liquidation\n");

    let mut house = setup(&[(BOB, dec!(1000))], 100)?;
    house.open_position(BOB, short(dec!(25)))?;

    house.oracle_mut().set_price(ETH, Price::new_unchecked(dec!(10000000)));
    let margin = house.get_account_margin(BOB)?;
    println!(
        "  Index -> 10,000,000. Bob value {}, maintenance {}",
        margin.account_value, margin.maintenance_requirement
    );

    for _ in 0..2 {
        house.advance_block(house.block().next());
        let result = house.liquidate(KEEPER, BOB, ETH)?;
        println!(
            "  Block {block}: liquidated {}, remaining {}, penalty {} (keeper {}, insurance {}), {:?}",
            result.liquidated_size,
            result.remaining_size,
            result.penalty,
            result.liquidator_reward,
            result.insurance_contribution,
            result.outcome,
            block = house.block()
        );
    }

    match house.liquidate(BOB, BOB, ETH) {
        Err(err) => println!("  Self liquidation attempt: {err}"),
        Ok(_) => println!("  Unexpected self liquidation"),
    }
    println!(
        "  Keeper owed {}, insurance fund {}\n",
        house.get_owed_realized_pnl(KEEPER),
        house.insurance_fund_balance()
    );
    Ok(())
}

/// Realized pnl flows into the vault; the per-account market cap blocks a second market.
fn scenario_4_settlement_and_limits() -> Result<(), EngineError> {
    println!("Scenario 4: Settlement and Market Limits\n");

    let mut house = setup(&[(ALICE, dec!(1000))], 0)?;
    house.set_max_markets_per_account(OWNER, 1)?;

    let mut btc = MarketConfig::eth_perp();
    btc.id = MarketId(2);
    btc.name = "BTC-PERP".to_string();
    btc.base_symbol = "vBTC".to_string();
    house.add_market(OWNER, btc, Box::new(ConstantProductPool::new(dec!(10), dec!(500000))))?;
    house.oracle_mut().set_price(MarketId(2), Price::new_unchecked(dec!(50000)));

    house.open_position(ALICE, short(dec!(10)))?;
    let second = OpenPositionParams::exact_input(MarketId(2), Direction::BaseToQuote, dec!(0.1));
    match house.open_position(ALICE, second) {
        Err(err) => println!("  Second market refused: {err}"),
        Ok(_) => println!("  Unexpected second market"),
    }

    house.close_position(ALICE, ETH, None)?;
    let settled = house.settle_owed_realized_pnl(ALICE)?;
    println!(
        "  Settled {} into the vault, collateral now {}",
        settled,
        house.vault().balance(ALICE)
    );
    if let Some(last) = house.events().last() {
        println!(
            "  Events recorded: {}, last at {} ms",
            house.events().len(),
            last.timestamp.as_millis()
        );
    }
    Ok(())
}
