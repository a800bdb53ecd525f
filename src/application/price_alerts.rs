use crate::domain::alert::{Alert, AlertKind, AlertPriority};
use crate::domain::market::Quote;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchDirection {
    /// Fire once price trades at or above the level.
    Above,
    /// Fire once price trades at or below the level.
    Below,
}

impl FromStr for WatchDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "above" => Ok(WatchDirection::Above),
            "below" => Ok(WatchDirection::Below),
            _ => anyhow::bail!("Invalid watch direction: '{}'. Must be 'above' or 'below'", s),
        }
    }
}

/// A user-defined price level watch. One-shot: it stays in the registry
/// after firing, flagged `triggered`, until the client deletes it.
#[derive(Debug, Clone, Serialize)]
pub struct PriceWatch {
    pub id: Uuid,
    pub symbol: String,
    pub level: Decimal,
    pub direction: WatchDirection,
    pub created_at: DateTime<Utc>,
    pub triggered: bool,
}

/// Registry of price watches, checked against every fresh quote during a
/// scan tick.
#[derive(Default)]
pub struct PriceWatchRegistry {
    watches: RwLock<Vec<PriceWatch>>,
}

impl PriceWatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, symbol: &str, level: Decimal, direction: WatchDirection) -> PriceWatch {
        let watch = PriceWatch {
            id: Uuid::new_v4(),
            symbol: symbol.to_uppercase(),
            level,
            direction,
            created_at: Utc::now(),
            triggered: false,
        };
        self.watches.write().await.push(watch.clone());
        watch
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let mut watches = self.watches.write().await;
        let before = watches.len();
        watches.retain(|w| w.id != id);
        watches.len() != before
    }

    pub async fn list(&self) -> Vec<PriceWatch> {
        self.watches.read().await.clone()
    }

    /// Fires every untriggered watch the quote satisfies and returns the
    /// alerts to publish. A fired watch never fires again.
    pub async fn check_quote(&self, quote: &Quote) -> Vec<Alert> {
        let mut watches = self.watches.write().await;
        let mut alerts = Vec::new();

        for watch in watches
            .iter_mut()
            .filter(|w| !w.triggered && w.symbol == quote.symbol)
        {
            let hit = match watch.direction {
                WatchDirection::Above => quote.price >= watch.level,
                WatchDirection::Below => quote.price <= watch.level,
            };
            if !hit {
                continue;
            }

            watch.triggered = true;
            alerts.push(Alert::new(
                &watch.symbol,
                AlertKind::PriceAlert,
                AlertPriority::Low,
                format!(
                    "{}: price {} crossed {} level {}",
                    watch.symbol,
                    quote.price,
                    match watch.direction {
                        WatchDirection::Above => "above",
                        WatchDirection::Below => "below",
                    },
                    watch.level
                ),
            ));
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(symbol: &str, price: Decimal) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price,
            change_pct: dec!(0.1),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_above_watch_fires_once() {
        let registry = PriceWatchRegistry::new();
        registry
            .add("NIFTY50", dec!(22000), WatchDirection::Above)
            .await;

        assert!(
            registry
                .check_quote(&quote("NIFTY50", dec!(21900)))
                .await
                .is_empty()
        );

        let alerts = registry.check_quote(&quote("NIFTY50", dec!(22010))).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::PriceAlert);
        assert_eq!(alerts[0].priority, AlertPriority::Low);

        // One-shot: the same quote does not fire again
        assert!(
            registry
                .check_quote(&quote("NIFTY50", dec!(22010)))
                .await
                .is_empty()
        );
        assert!(registry.list().await[0].triggered);
    }

    #[tokio::test]
    async fn test_below_watch_and_symbol_isolation() {
        let registry = PriceWatchRegistry::new();
        registry
            .add("BANKNIFTY", dec!(47000), WatchDirection::Below)
            .await;

        // Other symbols never match
        assert!(
            registry
                .check_quote(&quote("NIFTY50", dec!(1)))
                .await
                .is_empty()
        );

        let alerts = registry
            .check_quote(&quote("BANKNIFTY", dec!(46950)))
            .await;
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("below"));
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = PriceWatchRegistry::new();
        let watch = registry
            .add("NIFTY50", dec!(22000), WatchDirection::Above)
            .await;

        assert!(registry.remove(watch.id).await);
        assert!(!registry.remove(watch.id).await);
        assert!(registry.list().await.is_empty());
    }
}
