use crate::domain::errors::InvalidCandleError;
use crate::domain::market::Candle;
use crate::domain::structure::event::{Direction, EventKind, StructureEvent};
use crate::domain::structure::swing::{SwingKind, SwingPoint};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables for BOS/CHOCH detection. Percentages are whole-number percent
/// (0.3 means 0.3%).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureParams {
    pub bos_threshold_pct: Decimal,
    pub choch_threshold_pct: Decimal,
    pub min_structure_distance_pct: Decimal,
    pub structure_lock_bars: usize,
}

impl Default for StructureParams {
    fn default() -> Self {
        Self {
            bos_threshold_pct: dec!(0.3),
            choch_threshold_pct: dec!(0.5),
            min_structure_distance_pct: dec!(1.0),
            structure_lock_bars: 5,
        }
    }
}

/// Hysteresis state carried across candles: the lock horizon plus references
/// to the most recent BOS in each direction. A plain value, stepped candle by
/// candle.
#[derive(Debug, Clone, Default)]
pub struct StructureState {
    pub lock_until: usize,
    pub last_bullish_bos: Option<StructureEvent>,
    pub last_bearish_bos: Option<StructureEvent>,
    pub events: Vec<StructureEvent>,
}

impl StructureState {
    pub fn last_event(&self) -> Option<&StructureEvent> {
        self.events.last()
    }
}

/// Emits BOS/CHOCH events from swings and closes with noise thresholds,
/// minimum-distance and lock-bar hysteresis.
#[derive(Debug, Clone, Default)]
pub struct StructureStateMachine {
    params: StructureParams,
}

impl StructureStateMachine {
    pub fn new(params: StructureParams) -> Self {
        Self { params }
    }

    /// Runs the machine over the whole window, starting at `start_index`
    /// (the analyzer passes `max(L, 1)`).
    ///
    /// Candles with non-monotonic timestamps are dropped with a warning;
    /// inverted OHLC aborts the run.
    pub fn run(
        &self,
        candles: &[Candle],
        swings: &[SwingPoint],
        start_index: usize,
    ) -> Result<StructureState, InvalidCandleError> {
        let mut state = StructureState::default();
        let mut last_ts = i64::MIN;

        for (index, candle) in candles.iter().enumerate() {
            candle.validate()?;

            if candle.timestamp <= last_ts {
                warn!(
                    "StructureStateMachine [{}]: dropping candle at index {} with non-monotonic timestamp {} (last {})",
                    candle.symbol, index, candle.timestamp, last_ts
                );
                continue;
            }
            last_ts = candle.timestamp;

            if index < start_index.max(1) {
                continue;
            }

            state = self.step(state, candles, swings, index);
        }

        Ok(state)
    }

    /// Advances the state for the candle at `index`, emitting at most one
    /// event. CHOCH wins when both a BOS and a CHOCH qualify on the same
    /// candle.
    pub fn step(
        &self,
        mut state: StructureState,
        candles: &[Candle],
        swings: &[SwingPoint],
        index: usize,
    ) -> StructureState {
        if index < state.lock_until {
            return state;
        }

        let close = candles[index].close;
        let timestamp = candles[index].timestamp;
        let last_high = most_recent_swing(swings, index, SwingKind::High);
        let last_low = most_recent_swing(swings, index, SwingKind::Low);

        // CHOCH first: a regime change outranks a continuation break.
        if let Some(high) = last_high {
            if state.last_bearish_bos.is_some()
                && close > high.price * self.breakout_multiplier(self.params.choch_threshold_pct)
                && self.clears_distance(close, high.price, state.last_bearish_bos.as_ref())
            {
                let event = StructureEvent::new(
                    EventKind::Choch,
                    Direction::Bullish,
                    close,
                    high.price,
                    index,
                    timestamp,
                );
                state.last_bearish_bos = None;
                return self.emit(state, event, index);
            }
        }

        if let Some(low) = last_low {
            if state.last_bullish_bos.is_some()
                && close < low.price * self.breakdown_multiplier(self.params.choch_threshold_pct)
                && self.clears_distance(close, low.price, state.last_bullish_bos.as_ref())
            {
                let event = StructureEvent::new(
                    EventKind::Choch,
                    Direction::Bearish,
                    close,
                    low.price,
                    index,
                    timestamp,
                );
                state.last_bullish_bos = None;
                return self.emit(state, event, index);
            }
        }

        if let Some(high) = last_high {
            if close > high.price * self.breakout_multiplier(self.params.bos_threshold_pct)
                && self.clears_distance(close, high.price, state.last_bearish_bos.as_ref())
            {
                let event = StructureEvent::new(
                    EventKind::Bos,
                    Direction::Bullish,
                    close,
                    high.price,
                    index,
                    timestamp,
                );
                state.last_bullish_bos = Some(event.clone());
                return self.emit(state, event, index);
            }
        }

        if let Some(low) = last_low {
            if close < low.price * self.breakdown_multiplier(self.params.bos_threshold_pct)
                && self.clears_distance(close, low.price, state.last_bullish_bos.as_ref())
            {
                let event = StructureEvent::new(
                    EventKind::Bos,
                    Direction::Bearish,
                    close,
                    low.price,
                    index,
                    timestamp,
                );
                state.last_bearish_bos = Some(event.clone());
                return self.emit(state, event, index);
            }
        }

        state
    }

    fn emit(
        &self,
        mut state: StructureState,
        event: StructureEvent,
        index: usize,
    ) -> StructureState {
        state.lock_until = index + self.params.structure_lock_bars;
        state.events.push(event);
        state
    }

    fn breakout_multiplier(&self, threshold_pct: Decimal) -> Decimal {
        Decimal::ONE + threshold_pct / dec!(100)
    }

    fn breakdown_multiplier(&self, threshold_pct: Decimal) -> Decimal {
        Decimal::ONE - threshold_pct / dec!(100)
    }

    /// The break must sit far enough from the opposite-direction BOS it is
    /// reacting against, measured against the broken level.
    fn clears_distance(
        &self,
        break_price: Decimal,
        broken_level: Decimal,
        opposite_bos: Option<&StructureEvent>,
    ) -> bool {
        let Some(prior) = opposite_bos else {
            return true;
        };
        let min_distance = broken_level * self.params.min_structure_distance_pct / dec!(100);
        (break_price - prior.break_price).abs() > min_distance
    }
}

fn most_recent_swing(swings: &[SwingPoint], before: usize, kind: SwingKind) -> Option<&SwingPoint> {
    swings
        .iter()
        .filter(|s| s.kind == kind && s.index < before)
        .next_back()
}
