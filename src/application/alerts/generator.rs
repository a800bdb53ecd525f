use crate::domain::alert::{Alert, AlertKind, AlertPriority};
use crate::domain::signal::InstrumentSignal;
use crate::domain::structure::EventKind;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AlertGeneratorConfig {
    /// A signal whose proximity falls to this level has entered the zone.
    pub near_pct: Decimal,
    /// The previous snapshot must have been at least this far away.
    pub far_pct: Decimal,
    /// The same (symbol, kind) cannot fire twice inside this window.
    pub dedup_window: Duration,
}

impl Default for AlertGeneratorConfig {
    fn default() -> Self {
        Self {
            near_pct: dec!(2.0),
            far_pct: dec!(3.0),
            dedup_window: Duration::seconds(60),
        }
    }
}

/// Diffs consecutive store writes per symbol and emits typed alerts.
pub struct AlertGenerator {
    config: AlertGeneratorConfig,
    recent: HashMap<(String, AlertKind), DateTime<Utc>>,
}

impl AlertGenerator {
    pub fn new(config: AlertGeneratorConfig) -> Self {
        Self {
            config,
            recent: HashMap::new(),
        }
    }

    /// Produces the alerts implied by replacing `previous` with `current`.
    /// The first snapshot for a symbol never alerts.
    pub fn diff(
        &mut self,
        previous: Option<&InstrumentSignal>,
        current: &InstrumentSignal,
    ) -> Vec<Alert> {
        let Some(previous) = previous else {
            return Vec::new();
        };

        let mut alerts = Vec::new();

        if self.is_bos_entry(previous, current) {
            alerts.push(self.emit(
                current,
                AlertKind::BosEntry,
                AlertPriority::High,
                format!(
                    "{}: price {} entered the BOS zone (proximity {:.2}% -> {:.2}%)",
                    current.symbol,
                    current.current_price,
                    previous.avg_proximity_pct,
                    current.avg_proximity_pct
                ),
            ));
        }

        if self.is_bos_break(previous, current) {
            alerts.push(self.emit(
                current,
                AlertKind::BosBreak,
                AlertPriority::High,
                format!(
                    "{}: structure break, now {}",
                    current.symbol, current.overall_structure
                ),
            ));
        }

        if self.is_trend_change(previous, current) {
            alerts.push(self.emit(
                current,
                AlertKind::TrendChange,
                AlertPriority::Medium,
                format!(
                    "{}: trend changed {} -> {} on CHOCH",
                    current.symbol, previous.overall_structure, current.overall_structure
                ),
            ));
        }

        if let Some(gap_desc) = mitigated_gap(previous, current) {
            alerts.push(self.emit(
                current,
                AlertKind::FvgMitigated,
                AlertPriority::Medium,
                format!("{}: fair value gap {} mitigated", current.symbol, gap_desc),
            ));
        }

        alerts.into_iter().flatten().collect()
    }

    fn is_bos_entry(&self, previous: &InstrumentSignal, current: &InstrumentSignal) -> bool {
        previous.avg_proximity_pct > self.config.far_pct
            && current.avg_proximity_pct <= self.config.near_pct
    }

    fn is_bos_break(&self, previous: &InstrumentSignal, current: &InstrumentSignal) -> bool {
        let prev_top = previous.entries.first().map(|e| e.snapshot.structure);
        let curr_top = current.entries.first().map(|e| e.snapshot.structure);

        let top_went_neutral = matches!(
            (prev_top, curr_top),
            (Some(p), Some(c)) if !p.is_neutral() && c.is_neutral()
        );

        let direction_flipped = (previous.overall_structure.is_bullish()
            && current.overall_structure.is_bearish())
            || (previous.overall_structure.is_bearish()
                && current.overall_structure.is_bullish());
        let event_advanced = match (latest_event_ts(previous), latest_event_ts(current)) {
            (Some(prev_ts), Some(curr_ts)) => curr_ts > prev_ts,
            _ => false,
        };

        top_went_neutral || (event_advanced && direction_flipped)
    }

    fn is_trend_change(&self, previous: &InstrumentSignal, current: &InstrumentSignal) -> bool {
        if previous.overall_structure == current.overall_structure {
            return false;
        }

        let prev_ts = latest_event_ts(previous).unwrap_or(i64::MIN);
        current.entries.iter().any(|entry| {
            entry
                .snapshot
                .last_event
                .as_ref()
                .is_some_and(|e| e.kind == EventKind::Choch && e.timestamp > prev_ts)
        })
    }

    /// Applies the (symbol, kind) dedup window; returns None when suppressed.
    fn emit(
        &mut self,
        signal: &InstrumentSignal,
        kind: AlertKind,
        priority: AlertPriority,
        message: String,
    ) -> Option<Alert> {
        let key = (signal.symbol.clone(), kind);
        let now = Utc::now();

        if let Some(last) = self.recent.get(&key) {
            if now - *last < self.config.dedup_window {
                debug!(
                    "AlertGenerator [{}]: suppressed duplicate {} within dedup window",
                    signal.symbol, kind
                );
                return None;
            }
        }

        self.recent.insert(key, now);
        Some(Alert::new(&signal.symbol, kind, priority, message))
    }
}

fn latest_event_ts(signal: &InstrumentSignal) -> Option<i64> {
    signal
        .entries
        .iter()
        .filter_map(|e| e.snapshot.last_event.as_ref())
        .map(|e| e.timestamp)
        .max()
}

/// A gap that was active in the previous snapshot and is mitigated now, on
/// any tracked timeframe.
fn mitigated_gap(previous: &InstrumentSignal, current: &InstrumentSignal) -> Option<String> {
    for prev_entry in &previous.entries {
        let Some(curr_entry) = current
            .entries
            .iter()
            .find(|e| e.timeframe == prev_entry.timeframe)
        else {
            continue;
        };

        for gap in &prev_entry.snapshot.active_fvgs {
            let now_mitigated = curr_entry.snapshot.mitigated_fvgs.iter().any(|m| {
                m.direction == gap.direction
                    && m.created_at == gap.created_at
                    && m.lower_bound == gap.lower_bound
                    && m.upper_bound == gap.upper_bound
            });
            if now_mitigated {
                return Some(format!(
                    "[{} - {}] on {}",
                    gap.lower_bound, gap.upper_bound, prev_entry.timeframe
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Timeframe;
    use crate::domain::signal::TimeframeEntry;
    use crate::domain::structure::event::{Direction, StructureEvent};
    use crate::domain::structure::fvg::FairValueGap;
    use crate::domain::structure::{MarketStructure, StructureSnapshot};

    fn entry(
        tf: Timeframe,
        structure: MarketStructure,
        event: Option<StructureEvent>,
    ) -> TimeframeEntry {
        TimeframeEntry {
            timeframe: tf,
            snapshot: StructureSnapshot {
                structure,
                last_event: event,
                active_fvgs: Vec::new(),
                mitigated_fvgs: Vec::new(),
                trend_strength: dec!(60),
                confidence: dec!(75),
            },
            has_valid_signal: !structure.is_neutral(),
            proximity_pct: dec!(1.0),
        }
    }

    fn event(kind: EventKind, direction: Direction, ts: i64) -> StructureEvent {
        StructureEvent::new(kind, direction, dec!(100.5), dec!(100.0), 22, ts)
    }

    fn signal(proximity: Decimal, structure: MarketStructure) -> InstrumentSignal {
        let direction = if structure.is_bearish() {
            Direction::Bearish
        } else {
            Direction::Bullish
        };
        InstrumentSignal {
            symbol: "NIFTY50".to_string(),
            current_price: dec!(22000),
            entries: vec![entry(
                Timeframe::FiveMin,
                structure,
                Some(event(EventKind::Bos, direction, 1000)),
            )],
            matching_timeframes: 2,
            overall_structure: structure,
            latest_event_desc: None,
            total_fvgs: 0,
            avg_proximity_pct: proximity,
            mean_confidence: dec!(70),
            updated_at: Utc::now(),
        }
    }

    fn gap(created_at: i64) -> FairValueGap {
        FairValueGap {
            id: 0,
            direction: Direction::Bullish,
            upper_bound: dec!(100.0),
            lower_bound: dec!(99.0),
            size_pct: dec!(1.0),
            created_at,
            created_index: 10,
            mitigated: false,
            mitigated_at: None,
            quality_score: dec!(70),
            near_structure: false,
        }
    }

    #[test]
    fn test_first_snapshot_never_alerts() {
        let mut generator = AlertGenerator::new(AlertGeneratorConfig::default());
        let current = signal(dec!(1.5), MarketStructure::Bullish);
        assert!(generator.diff(None, &current).is_empty());
    }

    #[test]
    fn test_bos_entry_on_far_to_near_transition() {
        let mut generator = AlertGenerator::new(AlertGeneratorConfig::default());
        let previous = signal(dec!(4.0), MarketStructure::Bullish);
        let current = signal(dec!(1.5), MarketStructure::Bullish);

        let alerts = generator.diff(Some(&previous), &current);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::BosEntry);
        assert_eq!(alerts[0].priority, AlertPriority::High);
    }

    #[test]
    fn test_bos_entry_requires_far_start() {
        let mut generator = AlertGenerator::new(AlertGeneratorConfig::default());
        // Previous already inside the far threshold: no entry alert
        let previous = signal(dec!(2.5), MarketStructure::Bullish);
        let current = signal(dec!(1.5), MarketStructure::Bullish);

        assert!(generator.diff(Some(&previous), &current).is_empty());
    }

    #[test]
    fn test_bos_entry_dedup_within_window() {
        let mut generator = AlertGenerator::new(AlertGeneratorConfig::default());
        let previous = signal(dec!(4.0), MarketStructure::Bullish);
        let current = signal(dec!(1.5), MarketStructure::Bullish);

        assert_eq!(generator.diff(Some(&previous), &current).len(), 1);
        // Same transition seconds later: suppressed
        assert!(generator.diff(Some(&previous), &current).is_empty());
    }

    #[test]
    fn test_bos_break_on_direction_flip_with_new_event() {
        let mut generator = AlertGenerator::new(AlertGeneratorConfig::default());
        let previous = signal(dec!(1.5), MarketStructure::Bullish);
        let mut current = signal(dec!(1.5), MarketStructure::Bearish);
        // Direction flipped and the event timestamp advanced
        current.entries[0].snapshot.last_event =
            Some(event(EventKind::Bos, Direction::Bearish, 2000));

        let alerts = generator.diff(Some(&previous), &current);
        assert!(alerts.iter().any(|a| a.kind == AlertKind::BosBreak));
    }

    #[test]
    fn test_trend_change_requires_choch() {
        let mut generator = AlertGenerator::new(AlertGeneratorConfig::default());
        let previous = signal(dec!(1.5), MarketStructure::Bullish);

        // Structure changed but no CHOCH: no trend-change alert
        let mut without_choch = signal(dec!(1.5), MarketStructure::Bearish);
        without_choch.entries[0].snapshot.last_event =
            Some(event(EventKind::Bos, Direction::Bearish, 500));
        let alerts = generator.diff(Some(&previous), &without_choch);
        assert!(alerts.iter().all(|a| a.kind != AlertKind::TrendChange));

        let mut generator = AlertGenerator::new(AlertGeneratorConfig::default());
        let mut with_choch = signal(dec!(1.5), MarketStructure::BearishChoch);
        with_choch.entries[0].snapshot.last_event =
            Some(event(EventKind::Choch, Direction::Bearish, 2000));
        let alerts = generator.diff(Some(&previous), &with_choch);
        assert!(alerts.iter().any(|a| a.kind == AlertKind::TrendChange));
    }

    #[test]
    fn test_fvg_mitigated_transition() {
        let mut generator = AlertGenerator::new(AlertGeneratorConfig::default());

        let mut previous = signal(dec!(1.5), MarketStructure::Bullish);
        previous.entries[0].snapshot.active_fvgs = vec![gap(900)];

        let mut current = signal(dec!(1.5), MarketStructure::Bullish);
        let mut mitigated = gap(900);
        mitigated.mitigated = true;
        mitigated.mitigated_at = Some(1200);
        current.entries[0].snapshot.mitigated_fvgs = vec![mitigated];

        let alerts = generator.diff(Some(&previous), &current);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::FvgMitigated);
        assert_eq!(alerts[0].priority, AlertPriority::Medium);
    }

    #[test]
    fn test_still_active_gap_does_not_alert() {
        let mut generator = AlertGenerator::new(AlertGeneratorConfig::default());

        let mut previous = signal(dec!(1.5), MarketStructure::Bullish);
        previous.entries[0].snapshot.active_fvgs = vec![gap(900)];
        let mut current = signal(dec!(1.5), MarketStructure::Bullish);
        current.entries[0].snapshot.active_fvgs = vec![gap(900)];

        assert!(generator.diff(Some(&previous), &current).is_empty());
    }
}
