// Index price oracle
//
// Margin is always valued at the index price, never at the pool's spot price,
// so one block of pool manipulation cannot manufacture account value. The
// engine only sees the `Oracle` trait; `IndexPriceFeed` is an in-memory source
// that keeps a short timestamped history per market and serves a TWAP.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::types::{MarketId, Price};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("No index price for {0}")]
    NoPrice(MarketId),
}

/// Source of index prices.
pub trait Oracle: Send {
    /// Time-weighted index price over the trailing `twap_window_secs`.
    fn index_price(&self, market: MarketId, twap_window_secs: u64) -> Result<Price, OracleError>;
}

/// A single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: u64,
    pub price: Price,
}

/// In-memory index feed with its own clock.
#[derive(Debug, Clone)]
pub struct IndexPriceFeed {
    samples: HashMap<MarketId, VecDeque<PriceSample>>,
    now: u64,
    /// Max samples to keep per market
    max_samples: usize,
}

impl Default for IndexPriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexPriceFeed {
    pub fn new() -> Self {
        Self {
            samples: HashMap::new(),
            now: 0,
            max_samples: 1000,
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Move the feed clock forward. Going backwards is ignored.
    pub fn advance_to(&mut self, timestamp: u64) {
        self.now = self.now.max(timestamp);
    }

    /// Record `price` for `market` at the current feed time.
    /// A second update at the same timestamp replaces the first.
    pub fn set_price(&mut self, market: MarketId, price: Price) {
        let now = self.now;
        let history = self.samples.entry(market).or_default();

        match history.back_mut() {
            Some(last) if last.timestamp == now => last.price = price,
            _ => history.push_back(PriceSample {
                timestamp: now,
                price,
            }),
        }

        while history.len() > self.max_samples {
            history.pop_front();
        }
    }

    pub fn latest(&self, market: MarketId) -> Option<Price> {
        self.samples
            .get(&market)
            .and_then(|h| h.back())
            .map(|s| s.price)
    }

    pub fn sample_count(&self, market: MarketId) -> usize {
        self.samples.get(&market).map_or(0, |h| h.len())
    }

    fn twap(&self, history: &VecDeque<PriceSample>, window: u64) -> Option<Price> {
        let latest = history.back()?.price;
        if window == 0 || history.len() == 1 {
            return Some(latest);
        }

        let start = self.now.saturating_sub(window);
        let mut weighted_sum = Decimal::ZERO;
        let mut total_time = Decimal::ZERO;

        // each sample holds until the next one, the last one holds until now
        for (i, sample) in history.iter().enumerate() {
            let until = history
                .get(i + 1)
                .map_or(self.now, |next| next.timestamp)
                .min(self.now);
            let from = sample.timestamp.max(start);
            if until > from {
                let duration = Decimal::from(until - from);
                weighted_sum += sample.price.value() * duration;
                total_time += duration;
            }
        }

        if total_time > Decimal::ZERO {
            Price::new(weighted_sum / total_time)
        } else {
            Some(latest)
        }
    }
}

impl Oracle for IndexPriceFeed {
    fn index_price(&self, market: MarketId, twap_window_secs: u64) -> Result<Price, OracleError> {
        self.samples
            .get(&market)
            .and_then(|history| self.twap(history, twap_window_secs))
            .ok_or(OracleError::NoPrice(market))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    #[test]
    fn missing_market_errors() {
        let feed = IndexPriceFeed::new();
        assert_eq!(
            feed.index_price(MarketId(1), 900),
            Err(OracleError::NoPrice(MarketId(1)))
        );
    }

    #[test]
    fn single_sample_is_spot() {
        let mut feed = IndexPriceFeed::new();
        feed.set_price(MarketId(1), price(dec!(100)));
        feed.advance_to(5000);
        assert_eq!(feed.index_price(MarketId(1), 900).unwrap().value(), dec!(100));
    }

    #[test]
    fn same_timestamp_replaces() {
        let mut feed = IndexPriceFeed::new();
        feed.set_price(MarketId(1), price(dec!(10)));
        feed.set_price(MarketId(1), price(dec!(10000000)));
        assert_eq!(feed.sample_count(MarketId(1)), 1);
        assert_eq!(
            feed.index_price(MarketId(1), 900).unwrap().value(),
            dec!(10000000)
        );
    }

    #[test]
    fn twap_weights_by_time() {
        let mut feed = IndexPriceFeed::new();
        feed.set_price(MarketId(1), price(dec!(100)));
        feed.advance_to(300);
        feed.set_price(MarketId(1), price(dec!(200)));
        feed.advance_to(400);

        // 300s at 100, 100s at 200
        assert_eq!(feed.index_price(MarketId(1), 900).unwrap().value(), dec!(125));
        // only the last 100s
        assert_eq!(feed.index_price(MarketId(1), 100).unwrap().value(), dec!(200));
        // zero window is the latest price
        assert_eq!(feed.index_price(MarketId(1), 0).unwrap().value(), dec!(200));
    }

    #[test]
    fn clock_never_goes_back() {
        let mut feed = IndexPriceFeed::new();
        feed.advance_to(50);
        feed.advance_to(10);
        assert_eq!(feed.now(), 50);
    }
}
