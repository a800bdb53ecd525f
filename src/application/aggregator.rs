use crate::application::analyzer::TimeframeAnalyzer;
use crate::domain::errors::InvalidCandleError;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::signal::{InstrumentSignal, TimeframeEntry};
use crate::domain::structure::{MarketStructure, StructureSnapshot};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// An entry only counts toward alignment above this confidence.
const MIN_SIGNAL_CONFIDENCE: Decimal = dec!(50);

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub min_matching_timeframes: usize,
    /// Proximity recorded for entries without a structure event.
    pub proximity_far_sentinel: Decimal,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_matching_timeframes: 2,
            proximity_far_sentinel: dec!(999.0),
        }
    }
}

/// Runs the per-timeframe analyzer across an instrument's timeframes and
/// assembles the cross-timeframe signal.
#[derive(Debug, Clone, Default)]
pub struct BatchAggregator {
    analyzer: TimeframeAnalyzer,
    config: AggregatorConfig,
}

impl BatchAggregator {
    pub fn new(analyzer: TimeframeAnalyzer, config: AggregatorConfig) -> Self {
        Self { analyzer, config }
    }

    /// Analyzes every timeframe series and assembles the instrument signal.
    ///
    /// Returns `None` when fewer than the configured minimum of timeframes
    /// carry a valid signal; such instruments are not publishable.
    pub fn assemble(
        &self,
        symbol: &str,
        current_price: Decimal,
        series: &[(Timeframe, Vec<Candle>)],
    ) -> Result<Option<InstrumentSignal>, InvalidCandleError> {
        let mut entries = Vec::with_capacity(series.len());

        for (timeframe, candles) in series {
            let snapshot = self.analyzer.analyze(candles, *timeframe)?;
            entries.push(self.entry_for(*timeframe, snapshot, current_price));
        }

        Ok(self.assemble_from_entries(symbol, current_price, entries))
    }

    fn entry_for(
        &self,
        timeframe: Timeframe,
        snapshot: StructureSnapshot,
        current_price: Decimal,
    ) -> TimeframeEntry {
        let proximity_pct = match (&snapshot.last_event, current_price > Decimal::ZERO) {
            (Some(event), true) => {
                (current_price - event.break_price).abs() / current_price * dec!(100)
            }
            _ => self.config.proximity_far_sentinel,
        };

        let has_valid_signal = !snapshot.structure.is_neutral()
            && snapshot.last_event.is_some()
            && snapshot.confidence > MIN_SIGNAL_CONFIDENCE;

        TimeframeEntry {
            timeframe,
            snapshot,
            has_valid_signal,
            proximity_pct,
        }
    }

    /// Cross-timeframe assembly over already-analyzed entries.
    pub fn assemble_from_entries(
        &self,
        symbol: &str,
        current_price: Decimal,
        mut entries: Vec<TimeframeEntry>,
    ) -> Option<InstrumentSignal> {
        let matching_timeframes = entries.iter().filter(|e| e.has_valid_signal).count();
        if matching_timeframes < self.config.min_matching_timeframes {
            return None;
        }

        // Rank by confidence; the top valid entry decides the overall read.
        entries.sort_by(|a, b| b.snapshot.confidence.cmp(&a.snapshot.confidence));

        let top = entries
            .iter()
            .find(|e| e.has_valid_signal)
            .expect("matching_timeframes >= 1 guarantees a valid entry");
        let overall_structure = top.snapshot.structure;

        let latest_event_desc = entries
            .iter()
            .filter(|e| e.has_valid_signal)
            .filter_map(|e| e.snapshot.last_event.as_ref())
            .max_by_key(|e| e.timestamp)
            .map(|e| e.describe());

        let valid_count = Decimal::from(matching_timeframes as u64);
        let mean_confidence = entries
            .iter()
            .filter(|e| e.has_valid_signal)
            .map(|e| e.snapshot.confidence)
            .sum::<Decimal>()
            / valid_count;
        let avg_proximity_pct = entries
            .iter()
            .filter(|e| e.has_valid_signal)
            .map(|e| e.proximity_pct)
            .sum::<Decimal>()
            / valid_count;

        let total_fvgs = entries.iter().map(|e| e.snapshot.active_fvgs.len()).sum();

        Some(InstrumentSignal {
            symbol: symbol.to_string(),
            current_price,
            entries,
            matching_timeframes,
            overall_structure,
            latest_event_desc,
            total_fvgs,
            avg_proximity_pct,
            mean_confidence,
            updated_at: Utc::now(),
        })
    }

    /// Batch ordering: strongest alignment first, then mean confidence.
    pub fn sort_batch(signals: &mut [InstrumentSignal]) {
        signals.sort_by(|a, b| {
            b.matching_timeframes
                .cmp(&a.matching_timeframes)
                .then_with(|| b.mean_confidence.cmp(&a.mean_confidence))
        });
    }
}
