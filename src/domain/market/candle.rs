use crate::domain::errors::InvalidCandleError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV bar for one (symbol, timeframe) series.
///
/// Invariant: `low <= min(open, close) <= max(open, close) <= high`;
/// timestamps are epoch seconds and strictly increasing within a series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

impl Candle {
    /// Checks the OHLC ordering invariant and non-negative volume.
    pub fn validate(&self) -> Result<(), InvalidCandleError> {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);

        if self.low > body_low || body_high > self.high {
            return Err(InvalidCandleError {
                symbol: self.symbol.clone(),
                timestamp: self.timestamp,
                reason: format!(
                    "inverted OHLC: open={} high={} low={} close={}",
                    self.open, self.high, self.low, self.close
                ),
            });
        }

        if self.volume < Decimal::ZERO {
            return Err(InvalidCandleError {
                symbol: self.symbol.clone(),
                timestamp: self.timestamp,
                reason: format!("negative volume: {}", self.volume),
            });
        }

        Ok(())
    }

    /// Typical price `(high + low + close) / 3`, used by the swing detector.
    pub fn hlc3(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }

    /// Absolute body size `|close - open|`.
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// A lightweight last-trade quote for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub change_pct: Decimal,
    pub timestamp: i64,
}
