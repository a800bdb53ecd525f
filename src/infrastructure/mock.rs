use crate::domain::errors::CandleSourceError;
use crate::domain::market::{Candle, Quote, Timeframe};
use crate::domain::ports::CandleProvider;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Deterministic candle generator backing mock mode and tests.
///
/// Every series is a pure function of (symbol, timeframe): an internal LCG is
/// seeded from them, so repeated fetches return identical shapes and the
/// analysis pipeline stays deterministic. Timestamps are aligned to the
/// timeframe's period grid ending at the current period.
pub struct MockCandleProvider;

impl MockCandleProvider {
    pub fn new() -> Self {
        Self
    }

    fn series(&self, symbol: &str, timeframe: Timeframe, lookback: usize) -> Vec<Candle> {
        let mut rng = Lcg::new(seed_for(symbol, timeframe));
        let interval = timeframe.to_seconds();
        let end = timeframe.period_start(Utc::now().timestamp());
        let start = end - interval * lookback.saturating_sub(1) as i64;

        let mut close = base_price(symbol);
        let mut candles = Vec::with_capacity(lookback);

        for i in 0..lookback {
            let open = close;

            // Drift in [-0.4%, +0.4%], with an occasional impulse bar so the
            // walk forms real swings and breaks.
            let mut move_bps = rng.range_i64(-40, 40);
            if rng.range_i64(0, 30) == 0 {
                move_bps += if rng.range_i64(0, 2) == 0 { 150 } else { -150 };
            }
            close = open * (dec!(1) + Decimal::from(move_bps) / dec!(10000));

            let wick_bps = rng.range_i64(0, 15);
            let wick = Decimal::from(wick_bps) / dec!(10000);
            let body_high = open.max(close);
            let body_low = open.min(close);

            candles.push(Candle {
                symbol: symbol.to_string(),
                open,
                high: body_high * (dec!(1) + wick),
                low: body_low * (dec!(1) - wick),
                close,
                volume: Decimal::from(1000 + rng.range_i64(0, 4000)),
                timestamp: start + interval * i as i64,
            });
        }

        candles
    }
}

impl Default for MockCandleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandleProvider for MockCandleProvider {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Candle>, CandleSourceError> {
        Ok(self.series(symbol, timeframe, lookback))
    }

    async fn latest_quote(&self, symbol: &str) -> Result<Quote, CandleSourceError> {
        // Quote derives from the 5m series so price and candles agree.
        let candles = self.series(symbol, Timeframe::FiveMin, 80);
        let last = candles
            .last()
            .ok_or_else(|| CandleSourceError::InvalidResponse {
                symbol: symbol.to_string(),
                reason: "empty generated series".to_string(),
            })?;
        let first = &candles[0];

        let change_pct = if first.close > Decimal::ZERO {
            (last.close - first.close) / first.close * dec!(100)
        } else {
            Decimal::ZERO
        };

        Ok(Quote {
            symbol: symbol.to_string(),
            price: last.close,
            change_pct,
            timestamp: last.timestamp,
        })
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Small multiplicative congruential generator; good enough for shaping mock
/// series, and fully deterministic for a given seed.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform-ish value in [low, high).
    fn range_i64(&mut self, low: i64, high: i64) -> i64 {
        let span = (high - low).max(1) as u64;
        low + (self.next() % span) as i64
    }
}

fn seed_for(symbol: &str, timeframe: Timeframe) -> u64 {
    let mut seed: u64 = 0xcbf29ce484222325;
    for byte in symbol.bytes().chain(timeframe.token().bytes()) {
        seed ^= byte as u64;
        seed = seed.wrapping_mul(0x100000001b3);
    }
    seed
}

fn base_price(symbol: &str) -> Decimal {
    let seed = seed_for(symbol, Timeframe::FiveMin);
    Decimal::from(500 + (seed % 4500))
}
