//! Cross-timeframe assembly scenarios: alignment counting, acceptance
//! gating, overall-structure selection and batch ordering.

mod helpers;

use helpers::{breakout_series, quiet_candle};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use smcscan::application::aggregator::BatchAggregator;
use smcscan::application::analyzer::TimeframeAnalyzer;
use smcscan::domain::market::{Candle, Timeframe};
use smcscan::domain::signal::TimeframeEntry;
use smcscan::domain::structure::event::{Direction, EventKind, StructureEvent};
use smcscan::domain::structure::{MarketStructure, StructureSnapshot};

fn flat_series(symbol: &str) -> Vec<Candle> {
    (0..25).map(|i| quiet_candle(symbol, i)).collect()
}

fn manual_entry(
    tf: Timeframe,
    structure: MarketStructure,
    confidence: Decimal,
    event_ts: i64,
) -> TimeframeEntry {
    let last_event = if structure.is_neutral() {
        None
    } else {
        let direction = if structure.is_bullish() {
            Direction::Bullish
        } else {
            Direction::Bearish
        };
        Some(StructureEvent::new(
            EventKind::Bos,
            direction,
            dec!(100.5),
            dec!(100.0),
            22,
            event_ts,
        ))
    };
    let has_valid_signal = !structure.is_neutral() && confidence > dec!(50);
    TimeframeEntry {
        timeframe: tf,
        snapshot: StructureSnapshot {
            structure,
            last_event,
            active_fvgs: Vec::new(),
            mitigated_fvgs: Vec::new(),
            trend_strength: dec!(60),
            confidence,
        },
        has_valid_signal,
        proximity_pct: dec!(1.0),
    }
}

#[test]
fn scenario_5_cross_timeframe_acceptance() {
    // 5m/15m/30m non-neutral with confidence {80, 65, 55}; 1h/2h/4h neutral.
    // matchingTimeframes = 3, overall taken from the 5m entry, published
    // under minMatchingTimeframes = 2.
    let aggregator = BatchAggregator::default();
    let entries = vec![
        manual_entry(Timeframe::FiveMin, MarketStructure::Bullish, dec!(80), 900),
        manual_entry(Timeframe::FifteenMin, MarketStructure::Bearish, dec!(65), 800),
        manual_entry(Timeframe::ThirtyMin, MarketStructure::Bearish, dec!(55), 700),
        manual_entry(Timeframe::OneHour, MarketStructure::Neutral, dec!(0), 0),
        manual_entry(Timeframe::TwoHour, MarketStructure::Neutral, dec!(0), 0),
        manual_entry(Timeframe::FourHour, MarketStructure::Neutral, dec!(0), 0),
    ];

    let signal = aggregator
        .assemble_from_entries("X", dec!(101.0), entries)
        .expect("published");

    assert_eq!(signal.matching_timeframes, 3);
    // The 5m entry has the top confidence, so its structure wins even though
    // two lower-timeframe reads disagree.
    assert_eq!(signal.overall_structure, MarketStructure::Bullish);
    assert_eq!(signal.mean_confidence, (dec!(80) + dec!(65) + dec!(55)) / dec!(3));
    // Entries come back ranked by confidence
    assert_eq!(signal.entries[0].timeframe, Timeframe::FiveMin);
}

#[test]
fn acceptance_via_full_analysis() {
    // Three timeframes carry the breakout window, three are flat: the
    // instrument publishes with matchingTimeframes = 3.
    let aggregator = BatchAggregator::default();
    let series = vec![
        (Timeframe::FiveMin, breakout_series("X", 100.50)),
        (Timeframe::FifteenMin, breakout_series("X", 100.50)),
        (Timeframe::ThirtyMin, breakout_series("X", 100.50)),
        (Timeframe::OneHour, flat_series("X")),
        (Timeframe::TwoHour, flat_series("X")),
        (Timeframe::FourHour, flat_series("X")),
    ];

    let signal = aggregator
        .assemble("X", dec!(100.6), &series)
        .unwrap()
        .expect("published");

    assert_eq!(signal.matching_timeframes, 3);
    assert_eq!(signal.overall_structure, MarketStructure::Bullish);
    assert!(signal.mean_confidence > dec!(50));

    // Invariant: every published signal satisfies the alignment minimum.
    assert!(signal.matching_timeframes >= 2);
}

#[test]
fn single_valid_timeframe_not_published() {
    let aggregator = BatchAggregator::default();
    let series = vec![
        (Timeframe::FiveMin, breakout_series("X", 100.50)),
        (Timeframe::FifteenMin, flat_series("X")),
        (Timeframe::ThirtyMin, flat_series("X")),
    ];

    assert!(aggregator.assemble("X", dec!(100.6), &series).unwrap().is_none());
}

#[test]
fn batch_sorted_by_alignment_then_confidence() {
    let aggregator = BatchAggregator::default();

    let two_valid = vec![
        manual_entry(Timeframe::FiveMin, MarketStructure::Bullish, dec!(95), 900),
        manual_entry(Timeframe::FifteenMin, MarketStructure::Bullish, dec!(90), 800),
        manual_entry(Timeframe::ThirtyMin, MarketStructure::Neutral, dec!(0), 0),
    ];
    let three_valid = vec![
        manual_entry(Timeframe::FiveMin, MarketStructure::Bullish, dec!(60), 900),
        manual_entry(Timeframe::FifteenMin, MarketStructure::Bullish, dec!(58), 800),
        manual_entry(Timeframe::ThirtyMin, MarketStructure::Bullish, dec!(55), 700),
    ];

    let mut batch = vec![
        aggregator
            .assemble_from_entries("CONFIDENT", dec!(101.0), two_valid)
            .unwrap(),
        aggregator
            .assemble_from_entries("ALIGNED", dec!(101.0), three_valid)
            .unwrap(),
    ];

    BatchAggregator::sort_batch(&mut batch);

    // Alignment outranks confidence
    assert_eq!(batch[0].symbol, "ALIGNED");
    assert_eq!(batch[1].symbol, "CONFIDENT");
}
