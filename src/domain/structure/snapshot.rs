use crate::domain::market::Candle;
use crate::domain::structure::event::{Direction, EventKind, Significance, StructureEvent};
use crate::domain::structure::fvg::FairValueGap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The running structural interpretation of one timeframe, derived from the
/// most recent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStructure {
    Bullish,
    Bearish,
    BullishChoch,
    BearishChoch,
    Neutral,
}

impl MarketStructure {
    pub fn from_last_event(event: Option<&StructureEvent>) -> Self {
        match event {
            None => MarketStructure::Neutral,
            Some(e) => match (e.kind, e.direction) {
                (EventKind::Bos, Direction::Bullish) => MarketStructure::Bullish,
                (EventKind::Bos, Direction::Bearish) => MarketStructure::Bearish,
                (EventKind::Choch, Direction::Bullish) => MarketStructure::BullishChoch,
                (EventKind::Choch, Direction::Bearish) => MarketStructure::BearishChoch,
            },
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, MarketStructure::Neutral)
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, MarketStructure::Bullish | MarketStructure::BullishChoch)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, MarketStructure::Bearish | MarketStructure::BearishChoch)
    }
}

impl fmt::Display for MarketStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStructure::Bullish => write!(f, "Bullish"),
            MarketStructure::Bearish => write!(f, "Bearish"),
            MarketStructure::BullishChoch => write!(f, "Bullish (CHOCH)"),
            MarketStructure::BearishChoch => write!(f, "Bearish (CHOCH)"),
            MarketStructure::Neutral => write!(f, "Neutral"),
        }
    }
}

/// Immutable per-timeframe analysis result published to the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSnapshot {
    pub structure: MarketStructure,
    pub last_event: Option<StructureEvent>,
    /// Newest unmitigated gaps, at most five, newest first.
    pub active_fvgs: Vec<FairValueGap>,
    /// Gaps already mitigated but not yet pruned; the alert generator diffs
    /// these against the previous snapshot's active set.
    pub mitigated_fvgs: Vec<FairValueGap>,
    pub trend_strength: Decimal,
    pub confidence: Decimal,
}

impl StructureSnapshot {
    /// The default snapshot for windows too short to analyze.
    pub fn neutral() -> Self {
        Self {
            structure: MarketStructure::Neutral,
            last_event: None,
            active_fvgs: Vec::new(),
            mitigated_fvgs: Vec::new(),
            trend_strength: Decimal::ZERO,
            confidence: Decimal::ZERO,
        }
    }
}

/// Confidence in the current structure reading, 0..=100.
///
/// Scored from the last five events: their count, how many were major, and
/// how aligned they are with the latest direction.
pub fn confidence(events: &[StructureEvent]) -> Decimal {
    let tail_start = events.len().saturating_sub(5);
    let last5 = &events[tail_start..];
    let Some(latest) = last5.last() else {
        return Decimal::ZERO;
    };

    let count = Decimal::from(last5.len() as u64);
    let major_count = Decimal::from(
        last5
            .iter()
            .filter(|e| e.significance == Significance::Major)
            .count() as u64,
    );
    let same_direction = Decimal::from(
        last5
            .iter()
            .filter(|e| e.direction == latest.direction)
            .count() as u64,
    );

    let score =
        dec!(50) + dec!(10) * count + dec!(15) * major_count + dec!(20) * (same_direction / count);
    score.clamp(Decimal::ZERO, dec!(100))
}

/// Directional pressure over the last 20 candles, 0..=100: percentage of
/// bullish candles plus a body-size kicker.
pub fn trend_strength(candles: &[Candle]) -> Decimal {
    let tail_start = candles.len().saturating_sub(20);
    let window = &candles[tail_start..];
    if window.is_empty() {
        return Decimal::ZERO;
    }
    let last_close = match window.last() {
        Some(c) if c.close > Decimal::ZERO => c.close,
        _ => return Decimal::ZERO,
    };

    let len = Decimal::from(window.len() as u64);
    let bullish = Decimal::from(window.iter().filter(|c| c.is_bullish()).count() as u64);
    let bullish_pct = bullish / len * dec!(100);

    let avg_body: Decimal = window.iter().map(|c| c.body()).sum::<Decimal>() / len;
    let body_pct = avg_body / last_close * dec!(100);

    (bullish_pct + dec!(5) * body_pct).clamp(Decimal::ZERO, dec!(100))
}
