use crate::domain::errors::InvalidCandleError;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::structure::snapshot::{confidence, trend_strength};
use crate::domain::structure::{
    FvgParams, FvgTracker, MarketStructure, StructureParams, StructureSnapshot,
    StructureStateMachine, SwingDetector,
};

/// Tunables for a single analyzer pass.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub swing_base_lookback: usize,
    pub structure: StructureParams,
    pub fvg: FvgParams,
}

impl AnalyzerConfig {
    pub fn with_defaults() -> Self {
        Self {
            swing_base_lookback: 20,
            structure: StructureParams::default(),
            fvg: FvgParams::default(),
        }
    }
}

/// Composes swing detection, the structure state machine and the FVG tracker
/// into one pass over a candle window.
///
/// Pure function of its inputs: it owns no state across calls, so one
/// instance can be shared by every symbol worker.
#[derive(Debug, Clone)]
pub struct TimeframeAnalyzer {
    swing_detector: SwingDetector,
    state_machine: StructureStateMachine,
    fvg_tracker: FvgTracker,
    min_candles: usize,
}

impl TimeframeAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let base = if config.swing_base_lookback == 0 {
            20
        } else {
            config.swing_base_lookback
        };
        Self {
            swing_detector: SwingDetector::new(base),
            state_machine: StructureStateMachine::new(config.structure),
            fvg_tracker: FvgTracker::new(config.fvg),
            min_candles: base + 3,
        }
    }

    /// Analyzes one timeframe's window and returns its snapshot.
    ///
    /// Windows shorter than `L0 + 3` candles yield the neutral default.
    pub fn analyze(
        &self,
        candles: &[Candle],
        timeframe: Timeframe,
    ) -> Result<StructureSnapshot, InvalidCandleError> {
        if candles.len() < self.min_candles {
            return Ok(StructureSnapshot::neutral());
        }

        let swings = self.swing_detector.detect(candles);
        let lookback = self.swing_detector.adaptive_lookback(candles);
        let state = self.state_machine.run(candles, &swings, lookback)?;
        let gaps = self
            .fvg_tracker
            .scan(candles, &state.events, timeframe.to_seconds());

        Ok(StructureSnapshot {
            structure: MarketStructure::from_last_event(state.last_event()),
            last_event: state.last_event().cloned(),
            active_fvgs: FvgTracker::active(&gaps),
            mitigated_fvgs: FvgTracker::mitigated(&gaps),
            trend_strength: trend_strength(candles),
            confidence: confidence(&state.events),
        })
    }
}

impl Default for TimeframeAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::with_defaults())
    }
}
