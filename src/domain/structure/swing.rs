use crate::domain::market::Candle;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const ATR_PERIOD: usize = 14;
const MEAN_PRICE_PERIOD: usize = 20;
const MIN_LOOKBACK: usize = 5;
const MAX_LOOKBACK: usize = 30;
/// A swing extreme must clear every neighbour by this fraction.
const DOMINANCE_MARGIN: Decimal = dec!(0.001);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

/// A confirmed local extreme within the adaptive lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: Decimal,
    pub kind: SwingKind,
    pub timestamp: i64,
}

/// Detects swing highs/lows over a candle window.
///
/// The lookback widens in volatile regimes and narrows in quiet ones so the
/// same detector works across instruments without retuning. Deterministic for
/// a given slice and idempotent across re-runs.
#[derive(Debug, Clone)]
pub struct SwingDetector {
    base_lookback: usize,
}

impl Default for SwingDetector {
    fn default() -> Self {
        Self { base_lookback: 20 }
    }
}

impl SwingDetector {
    pub fn new(base_lookback: usize) -> Self {
        Self { base_lookback }
    }

    /// The effective lookback for this window: `clamp(⌊L0·f⌋, 5, 30)` where
    /// `f` scales with the ATR-to-price ratio.
    pub fn adaptive_lookback(&self, candles: &[Candle]) -> usize {
        let v_ratio = volatility_ratio(candles);

        let factor = if v_ratio < dec!(1.0) {
            dec!(0.5)
        } else if v_ratio > dec!(3.0) {
            dec!(1.5)
        } else {
            dec!(1.0)
        };

        let scaled = Decimal::from(self.base_lookback) * factor;
        let floored = scaled.floor().to_u64().unwrap_or(self.base_lookback as u64) as usize;
        floored.clamp(MIN_LOOKBACK, MAX_LOOKBACK)
    }

    /// Emits all swing points in the window, sorted by index ascending.
    pub fn detect(&self, candles: &[Candle]) -> Vec<SwingPoint> {
        let lookback = self.adaptive_lookback(candles);
        let n = candles.len();
        if n < 2 * lookback + 1 {
            return Vec::new();
        }

        let mut swings = Vec::new();

        for i in lookback..(n - lookback) {
            if self.is_swing_high(candles, i, lookback) {
                swings.push(SwingPoint {
                    index: i,
                    price: candles[i].high,
                    kind: SwingKind::High,
                    timestamp: candles[i].timestamp,
                });
            }
            if self.is_swing_low(candles, i, lookback) {
                swings.push(SwingPoint {
                    index: i,
                    price: candles[i].low,
                    kind: SwingKind::Low,
                    timestamp: candles[i].timestamp,
                });
            }
        }

        swings
    }

    fn is_swing_high(&self, candles: &[Candle], index: usize, range: usize) -> bool {
        let high = candles[index].high;
        for j in index.saturating_sub(range)..=(index + range).min(candles.len() - 1) {
            if j == index {
                continue;
            }
            if high <= candles[j].high * (Decimal::ONE + DOMINANCE_MARGIN) {
                return false;
            }
        }
        true
    }

    fn is_swing_low(&self, candles: &[Candle], index: usize, range: usize) -> bool {
        let low = candles[index].low;
        for j in index.saturating_sub(range)..=(index + range).min(candles.len() - 1) {
            if j == index {
                continue;
            }
            if low >= candles[j].low * (Decimal::ONE - DOMINANCE_MARGIN) {
                return false;
            }
        }
        true
    }
}

/// `ATR(14) / mean(HLC3 over 20) · 100` for the tail of the window.
fn volatility_ratio(candles: &[Candle]) -> Decimal {
    let atr = average_true_range(candles, ATR_PERIOD);
    let mean = mean_typical_price(candles, MEAN_PRICE_PERIOD);
    if mean == Decimal::ZERO {
        return Decimal::ZERO;
    }
    atr / mean * dec!(100)
}

fn average_true_range(candles: &[Candle], period: usize) -> Decimal {
    if candles.len() < period + 1 {
        return Decimal::ZERO;
    }

    let start = candles.len() - period;
    let mut tr_sum = Decimal::ZERO;
    for i in start..candles.len() {
        let high = candles[i].high;
        let low = candles[i].low;
        let close_prev = candles[i - 1].close;

        let tr = (high - low)
            .max((high - close_prev).abs())
            .max((low - close_prev).abs());
        tr_sum += tr;
    }

    tr_sum / Decimal::from(period as u64)
}

fn mean_typical_price(candles: &[Candle], period: usize) -> Decimal {
    if candles.is_empty() {
        return Decimal::ZERO;
    }
    let take = period.min(candles.len());
    let start = candles.len() - take;
    let sum: Decimal = candles[start..].iter().map(|c| c.hlc3()).sum();
    sum / Decimal::from(take as u64)
}
