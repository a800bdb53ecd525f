use crate::domain::market::Timeframe;
use crate::domain::structure::{MarketStructure, StructureSnapshot};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One timeframe's contribution to an instrument signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeEntry {
    pub timeframe: Timeframe,
    pub snapshot: StructureSnapshot,
    pub has_valid_signal: bool,
    /// Percentage distance of the current price from the last event's break
    /// price; the configured "far" sentinel when no event exists.
    pub proximity_pct: Decimal,
}

/// Whether price sits on the bullish or bearish side of the structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Upper,
    Lower,
}

impl FromStr for SignalDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upper" => Ok(SignalDirection::Upper),
            "lower" => Ok(SignalDirection::Lower),
            _ => anyhow::bail!("Invalid direction: '{}'. Must be 'upper' or 'lower'", s),
        }
    }
}

/// The cross-timeframe signal published to the Signal Store. A plain value:
/// producers copy on publish, consumers read immutable views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSignal {
    pub symbol: String,
    pub current_price: Decimal,
    pub entries: Vec<TimeframeEntry>,
    /// Count of entries with a valid signal.
    pub matching_timeframes: usize,
    /// Structure of the highest-confidence valid entry.
    pub overall_structure: MarketStructure,
    pub latest_event_desc: Option<String>,
    pub total_fvgs: usize,
    pub avg_proximity_pct: Decimal,
    pub mean_confidence: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl InstrumentSignal {
    pub fn direction(&self) -> Option<SignalDirection> {
        if self.overall_structure.is_bullish() {
            Some(SignalDirection::Upper)
        } else if self.overall_structure.is_bearish() {
            Some(SignalDirection::Lower)
        } else {
            None
        }
    }
}
