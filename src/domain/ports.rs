use crate::domain::errors::CandleSourceError;
use crate::domain::market::{Candle, Quote, Timeframe};
use async_trait::async_trait;

/// A source of candle series and quotes. Implemented by the live broker
/// adapter and by the deterministic mock generator.
///
/// Contract: candles come back sorted by timestamp ascending, contiguous at
/// the requested timeframe's interval, at most `lookback` of them.
#[async_trait]
pub trait CandleProvider: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Candle>, CandleSourceError>;

    async fn latest_quote(&self, symbol: &str) -> Result<Quote, CandleSourceError>;

    /// Whether the provider can serve requests (e.g. broker session valid).
    fn is_ready(&self) -> bool;
}
