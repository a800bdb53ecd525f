use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    #[serde(rename = "BOS_ENTRY")]
    BosEntry,
    #[serde(rename = "BOS_BREAK")]
    BosBreak,
    #[serde(rename = "FVG_MITIGATED")]
    FvgMitigated,
    #[serde(rename = "TREND_CHANGE")]
    TrendChange,
    #[serde(rename = "PRICE_ALERT")]
    PriceAlert,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::BosEntry => write!(f, "BOS_ENTRY"),
            AlertKind::BosBreak => write!(f, "BOS_BREAK"),
            AlertKind::FvgMitigated => write!(f, "FVG_MITIGATED"),
            AlertKind::TrendChange => write!(f, "TREND_CHANGE"),
            AlertKind::PriceAlert => write!(f, "PRICE_ALERT"),
        }
    }
}

impl std::str::FromStr for AlertKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BOS_ENTRY" => Ok(AlertKind::BosEntry),
            "BOS_BREAK" => Ok(AlertKind::BosBreak),
            "FVG_MITIGATED" => Ok(AlertKind::FvgMitigated),
            "TREND_CHANGE" => Ok(AlertKind::TrendChange),
            "PRICE_ALERT" => Ok(AlertKind::PriceAlert),
            _ => anyhow::bail!("Unknown alert type: '{}'", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertPriority {
    Low,
    Medium,
    High,
}

/// A typed notification emitted by the alert generator and fanned out by the
/// subscription bus. `emittedAt` serializes as RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub priority: AlertPriority,
    #[serde(rename = "emittedAt")]
    pub emitted_at: DateTime<Utc>,
    pub read: bool,
}

impl Alert {
    pub fn new(symbol: &str, kind: AlertKind, priority: AlertPriority, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            kind,
            message,
            priority,
            emitted_at: Utc::now(),
            read: false,
        }
    }
}
