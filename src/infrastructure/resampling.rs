use crate::domain::errors::CandleSourceError;
use crate::domain::market::resample::{bars_per_target, resample};
use crate::domain::market::{Candle, Quote, Timeframe};
use crate::domain::ports::CandleProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Wraps a provider that only serves a base timeframe and synthesizes the
/// higher ones by resampling.
///
/// Useful against broker feeds that cap intraday history at small intervals;
/// the scanner keeps requesting its full timeframe set and never notices.
pub struct ResamplingProvider {
    inner: Arc<dyn CandleProvider>,
    base: Timeframe,
}

impl ResamplingProvider {
    pub fn new(inner: Arc<dyn CandleProvider>, base: Timeframe) -> Self {
        Self { inner, base }
    }
}

#[async_trait]
impl CandleProvider for ResamplingProvider {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Candle>, CandleSourceError> {
        if timeframe == self.base {
            return self.inner.fetch_candles(symbol, timeframe, lookback).await;
        }

        let factor = bars_per_target(self.base, timeframe);
        let base_lookback = lookback.saturating_mul(factor);
        let base_candles = self
            .inner
            .fetch_candles(symbol, self.base, base_lookback)
            .await?;

        let mut resampled = resample(&base_candles, timeframe);
        if resampled.len() > lookback {
            resampled.drain(..resampled.len() - lookback);
        }

        debug!(
            "ResamplingProvider [{}]: {} {} bars -> {} {} bars",
            symbol,
            base_candles.len(),
            self.base,
            resampled.len(),
            timeframe
        );

        Ok(resampled)
    }

    async fn latest_quote(&self, symbol: &str) -> Result<Quote, CandleSourceError> {
        self.inner.latest_quote(symbol).await
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }
}
