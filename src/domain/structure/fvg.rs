use crate::domain::market::Candle;
use crate::domain::structure::event::{Direction, StructureEvent};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Number of bars within which a gap counts as created "near structure".
const NEAR_STRUCTURE_BARS: usize = 3;
/// Gaps below this quality are pruned from the table.
const MIN_QUALITY: Decimal = dec!(20);
/// Consumers only ever see the newest few unmitigated gaps.
const MAX_ACTIVE: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FvgParams {
    pub min_fvg_size_pct: Decimal,
    /// Prune horizon in bars of the analyzed timeframe.
    pub prune_bars: i64,
}

impl Default for FvgParams {
    fn default() -> Self {
        Self {
            min_fvg_size_pct: dec!(0.2),
            prune_bars: 50,
        }
    }
}

/// A three-candle imbalance and its lifecycle.
///
/// Once `mitigated` is set it never clears; pruning removes gaps that aged
/// out or never scored high enough to matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub id: u64,
    pub direction: Direction,
    pub upper_bound: Decimal,
    pub lower_bound: Decimal,
    pub size_pct: Decimal,
    pub created_at: i64,
    pub created_index: usize,
    pub mitigated: bool,
    pub mitigated_at: Option<i64>,
    pub quality_score: Decimal,
    pub near_structure: bool,
}

/// Detects fair value gaps in a candle window, scores them, applies
/// first-touch mitigation and prunes stale or low-quality entries.
#[derive(Debug, Clone, Default)]
pub struct FvgTracker {
    params: FvgParams,
}

impl FvgTracker {
    pub fn new(params: FvgParams) -> Self {
        Self { params }
    }

    /// Full pass over the window. `bar_interval` is the analyzed timeframe's
    /// bar length in seconds; `events` are the structure events of the same
    /// timeframe (for the near-structure bonus).
    pub fn scan(
        &self,
        candles: &[Candle],
        events: &[StructureEvent],
        bar_interval: i64,
    ) -> Vec<FairValueGap> {
        let Some(last) = candles.last() else {
            return Vec::new();
        };
        let last_index = candles.len() - 1;

        let mut gaps = Vec::new();
        let mut next_id = 0u64;

        for i in 2..candles.len() {
            if let Some(mut gap) = detect_at(candles, i, &self.params) {
                gap.id = next_id;
                next_id += 1;
                gap.near_structure = events
                    .iter()
                    .any(|e| gap.created_index.abs_diff(e.index) <= NEAR_STRUCTURE_BARS);
                apply_mitigation(&mut gap, &candles[i + 1..]);
                gap.quality_score = quality_score(&gap, last_index);
                gaps.push(gap);
            }
        }

        // Prune by age and by quality.
        let max_age = self.params.prune_bars * bar_interval;
        gaps.retain(|g| last.timestamp - g.created_at <= max_age && g.quality_score >= MIN_QUALITY);

        gaps
    }

    /// The newest unmitigated gaps, at most five, sorted newest first.
    pub fn active(gaps: &[FairValueGap]) -> Vec<FairValueGap> {
        let mut active: Vec<FairValueGap> = gaps.iter().filter(|g| !g.mitigated).cloned().collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        active.truncate(MAX_ACTIVE);
        active
    }

    /// Mitigated gaps still inside the prune horizon, newest first.
    pub fn mitigated(gaps: &[FairValueGap]) -> Vec<FairValueGap> {
        let mut mitigated: Vec<FairValueGap> =
            gaps.iter().filter(|g| g.mitigated).cloned().collect();
        mitigated.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        mitigated
    }
}

fn detect_at(candles: &[Candle], i: usize, params: &FvgParams) -> Option<FairValueGap> {
    let first = &candles[i - 2];
    let middle = &candles[i - 1];
    let third = &candles[i];

    if middle.close == Decimal::ZERO {
        return None;
    }

    // Bullish: the first candle's high never overlaps the third candle's low.
    if first.high < third.low {
        let size_pct = (third.low - first.high) / middle.close * dec!(100);
        if size_pct >= params.min_fvg_size_pct {
            return Some(FairValueGap {
                id: 0,
                direction: Direction::Bullish,
                upper_bound: third.low,
                lower_bound: first.high,
                size_pct,
                created_at: third.timestamp,
                created_index: i,
                mitigated: false,
                mitigated_at: None,
                quality_score: Decimal::ZERO,
                near_structure: false,
            });
        }
    }

    // Bearish mirror: first candle's low above the third candle's high.
    if first.low > third.high {
        let size_pct = (first.low - third.high) / middle.close * dec!(100);
        if size_pct >= params.min_fvg_size_pct {
            return Some(FairValueGap {
                id: 0,
                direction: Direction::Bearish,
                upper_bound: first.low,
                lower_bound: third.high,
                size_pct,
                created_at: third.timestamp,
                created_index: i,
                mitigated: false,
                mitigated_at: None,
                quality_score: Decimal::ZERO,
                near_structure: false,
            });
        }
    }

    None
}

/// First revisit into the gap flags it mitigated; it never reopens.
fn apply_mitigation(gap: &mut FairValueGap, later: &[Candle]) {
    for candle in later {
        let touched = match gap.direction {
            Direction::Bullish => candle.low <= gap.lower_bound,
            Direction::Bearish => candle.high >= gap.upper_bound,
        };
        if touched {
            gap.mitigated = true;
            gap.mitigated_at = Some(candle.timestamp);
            return;
        }
    }
}

/// Size, structure proximity and recency tiers, 0..=100.
fn quality_score(gap: &FairValueGap, last_index: usize) -> Decimal {
    let mut score = Decimal::ZERO;

    score += if gap.size_pct >= dec!(1.0) {
        dec!(40)
    } else if gap.size_pct >= dec!(0.7) {
        dec!(30)
    } else if gap.size_pct >= dec!(0.5) {
        dec!(20)
    } else if gap.size_pct >= dec!(0.3) {
        dec!(10)
    } else {
        Decimal::ZERO
    };

    if gap.near_structure {
        score += dec!(30);
    }

    let bars_ago = last_index.saturating_sub(gap.created_index);
    score += if bars_ago <= 5 {
        dec!(30)
    } else if bars_ago <= 10 {
        dec!(20)
    } else if bars_ago <= 20 {
        dec!(10)
    } else {
        Decimal::ZERO
    };

    score.min(dec!(100))
}
