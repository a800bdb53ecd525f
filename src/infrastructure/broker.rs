use crate::domain::errors::CandleSourceError;
use crate::domain::market::{Candle, Quote, Timeframe};
use crate::domain::ports::CandleProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// Matches the scheduler's per-fetch deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_RETRIES: u32 = 3;

/// Candle provider backed by the broker's REST API.
///
/// Error mapping: 401/403 become `Auth` (operators must re-login), 5xx and
/// transport failures become `Transient` (the scheduler backs off), anything
/// the adapter cannot turn into an ordered series is `InvalidResponse`.
pub struct BrokerCandleProvider {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct BarDto {
    timestamp: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    #[serde(default)]
    volume: Decimal,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    candles: Vec<BarDto>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    price: Decimal,
    #[serde(default)]
    change_pct: Decimal,
    timestamp: i64,
}

impl BrokerCandleProvider {
    pub fn new(base_url: String, api_key: String, api_secret: String) -> Self {
        Self {
            client: retrying_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
        }
    }

    /// Builds `{base}{path}?{params}` with proper query encoding.
    fn endpoint(
        &self,
        symbol: &str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Url, CandleSourceError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path)).map_err(|e| {
            CandleSourceError::InvalidResponse {
                symbol: symbol.to_string(),
                reason: format!("invalid broker URL: {}", e),
            }
        })?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        symbol: &str,
        url: Url,
    ) -> Result<T, CandleSourceError> {
        let response = self
            .client
            .get(url)
            .header("X-API-KEY", &self.api_key)
            .header("X-API-SECRET", &self.api_secret)
            .send()
            .await
            .map_err(|e| CandleSourceError::Transient {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("BrokerCandleProvider: authentication rejected by broker");
                Err(CandleSourceError::Auth {
                    reason: format!("broker returned {}", response.status()),
                })
            }
            status if status.is_server_error() => Err(CandleSourceError::Transient {
                symbol: symbol.to_string(),
                reason: format!("broker returned {}", status),
            }),
            status if !status.is_success() => Err(CandleSourceError::InvalidResponse {
                symbol: symbol.to_string(),
                reason: format!("unexpected status {}", status),
            }),
            _ => response
                .json::<T>()
                .await
                .map_err(|e| CandleSourceError::InvalidResponse {
                    symbol: symbol.to_string(),
                    reason: format!("malformed payload: {}", e),
                }),
        }
    }
}

#[async_trait]
impl CandleProvider for BrokerCandleProvider {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Candle>, CandleSourceError> {
        let limit = lookback.to_string();
        let url = self.endpoint(
            symbol,
            "/v1/candles",
            &[
                ("symbol", symbol),
                ("timeframe", timeframe.token()),
                ("limit", &limit),
            ],
        )?;

        let payload: CandleResponse = self.get_json(symbol, url).await?;
        debug!(
            "BrokerCandleProvider [{}]: fetched {} bars on {}",
            symbol,
            payload.candles.len(),
            timeframe
        );

        let mut candles: Vec<Candle> = payload
            .candles
            .into_iter()
            .map(|bar| Candle {
                symbol: symbol.to_string(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                timestamp: bar.timestamp,
            })
            .collect();

        // The adapter guarantees ascending order to the core.
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);

        Ok(candles)
    }

    async fn latest_quote(&self, symbol: &str) -> Result<Quote, CandleSourceError> {
        let url = self.endpoint(symbol, "/v1/quote", &[("symbol", symbol)])?;

        let payload: QuoteResponse = self.get_json(symbol, url).await?;
        Ok(Quote {
            symbol: symbol.to_string(),
            price: payload.price,
            change_pct: payload.change_pct,
            timestamp: payload.timestamp,
        })
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

/// A reqwest client with transient-retry middleware, timed to stay inside
/// the scheduler's fetch deadline even after a retry.
fn retrying_client() -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);

    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new());

    ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}
