use thiserror::Error;

/// Errors raised while loading or validating configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown timeframe token: '{token}'")]
    UnknownTimeframe { token: String },

    #[error("Missing required setting: {key}")]
    Missing { key: String },
}

/// Errors surfaced by candle providers.
#[derive(Debug, Error)]
pub enum CandleSourceError {
    /// Network failures and 5xx responses; retried with backoff.
    #[error("Transient candle source failure for {symbol}: {reason}")]
    Transient { symbol: String, reason: String },

    /// 401/403 from the provider; surfaced as "authentication required".
    #[error("Candle source authentication required: {reason}")]
    Auth { reason: String },

    /// Payload the adapter could not turn into an ordered candle series.
    #[error("Invalid candle source response for {symbol}: {reason}")]
    InvalidResponse { symbol: String, reason: String },
}

impl CandleSourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CandleSourceError::Transient { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, CandleSourceError::Auth { .. })
    }
}

/// A candle whose OHLC ordering is inverted. Aborts the symbol's current tick.
#[derive(Debug, Error)]
#[error("Invalid candle for {symbol} at {timestamp}: {reason}")]
pub struct InvalidCandleError {
    pub symbol: String,
    pub timestamp: i64,
    pub reason: String,
}
