use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Break of Structure: a close beyond a swing extreme in the direction of
    /// the prevailing structure.
    Bos,
    /// Change of Character: a close beyond a swing extreme against the
    /// prevailing structure.
    Choch,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Bos => write!(f, "BOS"),
            EventKind::Choch => write!(f, "CHOCH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bullish => write!(f, "Bullish"),
            Direction::Bearish => write!(f, "Bearish"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Significance {
    Minor,
    Major,
}

/// A confirmed BOS or CHOCH on one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureEvent {
    pub kind: EventKind,
    pub direction: Direction,
    pub break_price: Decimal,
    pub broken_level: Decimal,
    /// Candle index within the analyzed window where the break closed.
    pub index: usize,
    pub timestamp: i64,
    pub significance: Significance,
}

impl StructureEvent {
    pub fn new(
        kind: EventKind,
        direction: Direction,
        break_price: Decimal,
        broken_level: Decimal,
        index: usize,
        timestamp: i64,
    ) -> Self {
        Self {
            kind,
            direction,
            break_price,
            broken_level,
            index,
            timestamp,
            significance: significance_of(break_price, broken_level),
        }
    }

    /// Human-readable description used in signals and alert messages.
    pub fn describe(&self) -> String {
        format!(
            "{} {} @ {} (level {})",
            self.kind, self.direction, self.break_price, self.broken_level
        )
    }
}

/// Major iff the break clears the broken level by at least 1%.
fn significance_of(break_price: Decimal, broken_level: Decimal) -> Significance {
    if broken_level == Decimal::ZERO {
        return Significance::Minor;
    }
    let move_pct = ((break_price - broken_level).abs() / broken_level) * dec!(100);
    if move_pct >= dec!(1.0) {
        Significance::Major
    } else {
        Significance::Minor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significance_boundary() {
        // 0.5% move -> Minor
        let e = StructureEvent::new(
            EventKind::Bos,
            Direction::Bullish,
            dec!(100.5),
            dec!(100.0),
            10,
            0,
        );
        assert_eq!(e.significance, Significance::Minor);

        // Exactly 1% -> Major
        let e = StructureEvent::new(
            EventKind::Bos,
            Direction::Bullish,
            dec!(101.0),
            dec!(100.0),
            10,
            0,
        );
        assert_eq!(e.significance, Significance::Major);

        // Bearish 2% break -> Major
        let e = StructureEvent::new(
            EventKind::Choch,
            Direction::Bearish,
            dec!(98.0),
            dec!(100.0),
            10,
            0,
        );
        assert_eq!(e.significance, Significance::Major);
    }

    #[test]
    fn test_describe_contains_kind_and_direction() {
        let e = StructureEvent::new(
            EventKind::Choch,
            Direction::Bearish,
            dec!(95),
            dec!(100),
            31,
            1700000000,
        );
        let text = e.describe();
        assert!(text.contains("CHOCH"));
        assert!(text.contains("Bearish"));
    }
}
