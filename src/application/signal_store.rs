use crate::domain::signal::{InstrumentSignal, SignalDirection};
use crate::domain::structure::MarketStructure;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Aliases for index names so dashboard searches like "bank nifty" land on
/// the right instrument.
const SEARCH_ALIASES: &[(&str, &str)] = &[
    ("bank nifty", "BANKNIFTY"),
    ("nifty bank", "BANKNIFTY"),
    ("nifty 50", "NIFTY50"),
    ("fin nifty", "FINNIFTY"),
    ("nifty fin", "FINNIFTY"),
];

/// A point-in-time copy of a stored signal, with staleness computed at read
/// time. Records are never evicted; consumers see `updated_at`.
#[derive(Debug, Clone, Serialize)]
pub struct StoredSignal {
    #[serde(flatten)]
    pub signal: InstrumentSignal,
    pub stale: bool,
}

/// Filter applied to store reads.
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub min_matches: Option<usize>,
    pub direction: Option<SignalDirection>,
    pub structure: Option<MarketStructure>,
    /// Keep only signals whose average proximity is within ±N%.
    pub proximity_within: Option<Decimal>,
}

impl SignalFilter {
    fn matches(&self, signal: &InstrumentSignal) -> bool {
        if let Some(min) = self.min_matches {
            if signal.matching_timeframes < min {
                return false;
            }
        }
        if let Some(direction) = self.direction {
            if signal.direction() != Some(direction) {
                return false;
            }
        }
        if let Some(structure) = self.structure {
            if signal.overall_structure != structure {
                return false;
            }
        }
        if let Some(band) = self.proximity_within {
            if signal.avg_proximity_pct > band {
                return false;
            }
        }
        true
    }
}

/// Holds the most recent `InstrumentSignal` per symbol.
///
/// Reads return copies; writes replace whole records. The store is the only
/// mutable state shared across symbol workers.
pub struct SignalStore {
    signals: RwLock<HashMap<String, InstrumentSignal>>,
    favorites: RwLock<HashSet<String>>,
    stale_after: Duration,
}

impl SignalStore {
    pub fn new(stale_after_seconds: i64) -> Self {
        Self {
            signals: RwLock::new(HashMap::new()),
            favorites: RwLock::new(HashSet::new()),
            stale_after: Duration::seconds(stale_after_seconds),
        }
    }

    /// Replaces the record for the signal's symbol, returning the previous
    /// record (the alert generator diffs against it).
    pub async fn insert(&self, signal: InstrumentSignal) -> Option<InstrumentSignal> {
        let mut signals = self.signals.write().await;
        signals.insert(signal.symbol.clone(), signal)
    }

    pub async fn get(&self, symbol: &str) -> Option<StoredSignal> {
        let signals = self.signals.read().await;
        signals.get(symbol).map(|s| self.wrap(s.clone()))
    }

    /// All records passing the filter, strongest alignment first.
    pub async fn query(&self, filter: &SignalFilter) -> Vec<StoredSignal> {
        let signals = self.signals.read().await;
        let mut matched: Vec<StoredSignal> = signals
            .values()
            .filter(|s| filter.matches(s))
            .map(|s| self.wrap(s.clone()))
            .collect();

        matched.sort_by(|a, b| {
            b.signal
                .matching_timeframes
                .cmp(&a.signal.matching_timeframes)
                .then_with(|| b.signal.mean_confidence.cmp(&a.signal.mean_confidence))
        });
        matched
    }

    /// Case-insensitive substring search over stored symbols, with the index
    /// alias table consulted first. At most `limit` results.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<StoredSignal> {
        let needle = normalize(query);
        if needle.is_empty() {
            return Vec::new();
        }

        let alias_target = SEARCH_ALIASES
            .iter()
            .find(|&&(alias, _)| normalize(alias) == needle)
            .map(|&(_, symbol)| symbol);

        let signals = self.signals.read().await;
        let mut matched: Vec<StoredSignal> = signals
            .values()
            .filter(|s| {
                alias_target.is_some_and(|target| s.symbol == target)
                    || normalize(&s.symbol).contains(&needle)
            })
            .map(|s| self.wrap(s.clone()))
            .collect();

        matched.sort_by(|a, b| a.signal.symbol.cmp(&b.signal.symbol));
        matched.truncate(limit);
        matched
    }

    pub async fn toggle_favorite(&self, symbol: &str) -> bool {
        let mut favorites = self.favorites.write().await;
        if favorites.remove(symbol) {
            false
        } else {
            favorites.insert(symbol.to_string());
            true
        }
    }

    pub async fn counts(&self) -> StoreCounts {
        let signals = self.signals.read().await;
        let favorites = self.favorites.read().await;

        let mut upper = 0usize;
        let mut lower = 0usize;
        for signal in signals.values() {
            match signal.direction() {
                Some(SignalDirection::Upper) => upper += 1,
                Some(SignalDirection::Lower) => lower += 1,
                None => {}
            }
        }

        StoreCounts {
            total: signals.len(),
            upper,
            lower,
            favorites: favorites.len(),
        }
    }

    fn wrap(&self, signal: InstrumentSignal) -> StoredSignal {
        let stale = Utc::now() - signal.updated_at > self.stale_after;
        StoredSignal { signal, stale }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreCounts {
    pub total: usize,
    pub upper: usize,
    pub lower: usize,
    pub favorites: usize,
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signal(symbol: &str, structure: MarketStructure, matches: usize) -> InstrumentSignal {
        InstrumentSignal {
            symbol: symbol.to_string(),
            current_price: dec!(22000),
            entries: vec![],
            matching_timeframes: matches,
            overall_structure: structure,
            latest_event_desc: None,
            total_fvgs: 1,
            avg_proximity_pct: dec!(1.5),
            mean_confidence: dec!(70),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_returns_previous() {
        let store = SignalStore::new(360);
        assert!(
            store
                .insert(signal("NIFTY50", MarketStructure::Bullish, 2))
                .await
                .is_none()
        );
        let prev = store
            .insert(signal("NIFTY50", MarketStructure::Bearish, 3))
            .await
            .expect("previous record expected");
        assert_eq!(prev.overall_structure, MarketStructure::Bullish);
    }

    #[tokio::test]
    async fn test_get_returns_copy_with_staleness() {
        let store = SignalStore::new(360);
        let mut old = signal("NIFTY50", MarketStructure::Bullish, 2);
        old.updated_at = Utc::now() - Duration::seconds(600);
        store.insert(old).await;

        let stored = store.get("NIFTY50").await.unwrap();
        assert!(stored.stale);

        store
            .insert(signal("BANKNIFTY", MarketStructure::Bullish, 2))
            .await;
        assert!(!store.get("BANKNIFTY").await.unwrap().stale);
    }

    #[tokio::test]
    async fn test_query_filters_by_direction() {
        let store = SignalStore::new(360);
        store
            .insert(signal("UP1", MarketStructure::Bullish, 3))
            .await;
        store
            .insert(signal("DOWN1", MarketStructure::BearishChoch, 2))
            .await;

        let upper = store
            .query(&SignalFilter {
                direction: Some(SignalDirection::Upper),
                ..Default::default()
            })
            .await;
        assert_eq!(upper.len(), 1);
        assert_eq!(upper[0].signal.symbol, "UP1");
    }

    #[tokio::test]
    async fn test_query_sorts_by_alignment() {
        let store = SignalStore::new(360);
        store
            .insert(signal("WEAK", MarketStructure::Bullish, 2))
            .await;
        store
            .insert(signal("STRONG", MarketStructure::Bullish, 5))
            .await;

        let all = store.query(&SignalFilter::default()).await;
        assert_eq!(all[0].signal.symbol, "STRONG");
    }

    #[tokio::test]
    async fn test_query_proximity_band() {
        let store = SignalStore::new(360);
        let mut near = signal("NEAR", MarketStructure::Bullish, 2);
        near.avg_proximity_pct = dec!(0.8);
        let mut far = signal("FAR", MarketStructure::Bullish, 2);
        far.avg_proximity_pct = dec!(7.0);
        store.insert(near).await;
        store.insert(far).await;

        let within = store
            .query(&SignalFilter {
                proximity_within: Some(dec!(2.0)),
                ..Default::default()
            })
            .await;
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].signal.symbol, "NEAR");
    }

    #[tokio::test]
    async fn test_search_substring_case_insensitive() {
        let store = SignalStore::new(360);
        store
            .insert(signal("BANKNIFTY", MarketStructure::Bullish, 2))
            .await;
        store
            .insert(signal("NIFTY50", MarketStructure::Bullish, 2))
            .await;

        let results = store.search("nifty", 20).await;
        assert_eq!(results.len(), 2);

        let results = store.search("bank", 20).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].signal.symbol, "BANKNIFTY");
    }

    #[tokio::test]
    async fn test_search_alias_table() {
        let store = SignalStore::new(360);
        store
            .insert(signal("BANKNIFTY", MarketStructure::Bullish, 2))
            .await;

        let results = store.search("bank nifty", 20).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].signal.symbol, "BANKNIFTY");

        let results = store.search("nifty bank", 20).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_counts_and_favorites() {
        let store = SignalStore::new(360);
        store
            .insert(signal("UP1", MarketStructure::Bullish, 2))
            .await;
        store
            .insert(signal("DOWN1", MarketStructure::Bearish, 2))
            .await;

        assert!(store.toggle_favorite("UP1").await);
        let counts = store.counts().await;
        assert_eq!(counts.total, 2);
        assert_eq!(counts.upper, 1);
        assert_eq!(counts.lower, 1);
        assert_eq!(counts.favorites, 1);

        assert!(!store.toggle_favorite("UP1").await);
        assert_eq!(store.counts().await.favorites, 0);
    }
}
