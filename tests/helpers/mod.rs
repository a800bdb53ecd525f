#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use smcscan::domain::market::Candle;

pub const BAR_SECONDS: i64 = 300;

pub fn candle(symbol: &str, open: f64, high: f64, low: f64, close: f64, index: usize) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        open: Decimal::from_f64(open).unwrap(),
        high: Decimal::from_f64(high).unwrap(),
        low: Decimal::from_f64(low).unwrap(),
        close: Decimal::from_f64(close).unwrap(),
        volume: dec!(1000),
        timestamp: index as i64 * BAR_SECONDS,
    }
}

/// A quiet band around 99.2 whose true range keeps the adaptive swing
/// lookback at its halved setting (10 bars for the default base of 20).
pub fn quiet_candle(symbol: &str, index: usize) -> Candle {
    candle(symbol, 99.2, 99.5, 98.9, 99.2, index)
}

/// 25 quiet candles with a swing high of 100.00 at index 10 and a break
/// candle at index 22 closing at `break_close`.
pub fn breakout_series(symbol: &str, break_close: f64) -> Vec<Candle> {
    let mut candles: Vec<Candle> = (0..25).map(|i| quiet_candle(symbol, i)).collect();
    candles[10] = candle(symbol, 99.2, 100.0, 98.9, 99.8, 10);
    candles[22] = candle(
        symbol,
        99.2,
        break_close.max(99.5) + 0.1,
        98.9,
        break_close,
        22,
    );
    candles
}
