use crate::application::aggregator::BatchAggregator;
use crate::application::alerts::AlertService;
use crate::application::price_alerts::PriceWatchRegistry;
use crate::application::signal_store::SignalStore;
use crate::domain::errors::{CandleSourceError, InvalidCandleError};
use crate::domain::market::Timeframe;
use crate::domain::ports::CandleProvider;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{self, timeout};
use tracing::{debug, error, info, warn};

/// Per-request timeout for provider calls.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
/// Base delay for the per-symbol retry backoff.
const BACKOFF_BASE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a scan immediately; the periodic cadence restarts afterwards.
    Rescan,
    Shutdown,
}

/// Point-in-time scheduler health, surfaced by `GET /stats`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStatus {
    pub last_scan_time: Option<DateTime<Utc>>,
    pub last_scan_duration_ms: Option<u64>,
    pub next_scan_at: Option<DateTime<Utc>>,
    pub symbols_analyzed: usize,
    pub signals_published: usize,
    pub symbols_failed: usize,
    pub ticks: u64,
}

impl ScanStatus {
    pub fn next_scan_in_seconds(&self) -> i64 {
        self.next_scan_at
            .map(|at| (at - Utc::now()).num_seconds().max(0))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    pub scan_interval: Duration,
    pub max_concurrent_symbols: usize,
    pub candle_lookback: usize,
    pub max_fetch_failures: u32,
}

#[derive(Debug, Error)]
enum SymbolScanError {
    #[error(transparent)]
    Source(#[from] CandleSourceError),
    #[error(transparent)]
    InvalidCandle(#[from] InvalidCandleError),
    #[error("fetch timed out after {0:?}")]
    FetchTimeout(Duration),
    #[error("worker deadline expired")]
    DeadlineExpired,
}

#[derive(Debug, Default)]
struct SymbolHealth {
    consecutive_failures: u32,
    skip_until: Option<Instant>,
}

/// Drives periodic re-analysis: one tick every `scan_interval`, one
/// independent unit of work per symbol, bounded worker concurrency.
///
/// Failures are isolated per symbol and retried with jittered exponential
/// backoff bounded at the tick interval. A worker that outlives its soft
/// deadline is cancelled and publishes nothing.
pub struct ScanScheduler {
    provider: Arc<dyn CandleProvider>,
    aggregator: Arc<BatchAggregator>,
    store: Arc<SignalStore>,
    alerts: Arc<AlertService>,
    watches: Arc<PriceWatchRegistry>,
    config: SchedulerConfig,
    status: Arc<RwLock<ScanStatus>>,
    health: HashMap<String, SymbolHealth>,
}

impl ScanScheduler {
    pub fn new(
        provider: Arc<dyn CandleProvider>,
        aggregator: Arc<BatchAggregator>,
        store: Arc<SignalStore>,
        alerts: Arc<AlertService>,
        watches: Arc<PriceWatchRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            provider,
            aggregator,
            store,
            alerts,
            watches,
            config,
            status: Arc::new(RwLock::new(ScanStatus::default())),
            health: HashMap::new(),
        }
    }

    pub fn status_handle(&self) -> Arc<RwLock<ScanStatus>> {
        Arc::clone(&self.status)
    }

    pub async fn run(mut self, mut cmd_rx: Receiver<SchedulerCommand>) {
        info!(
            "ScanScheduler: started, {} symbols x {} timeframes every {:?}",
            self.config.symbols.len(),
            self.config.timeframes.len(),
            self.config.scan_interval
        );

        let mut interval = time::interval(self.config.scan_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.scan_once().await;
                }

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::Rescan) => {
                            info!("ScanScheduler: forced rescan requested");
                            self.scan_once().await;
                            interval.reset();
                        }
                        Some(SchedulerCommand::Shutdown) | None => {
                            info!("ScanScheduler: shutting down");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// One full tick: fan out a worker per healthy symbol and tally results.
    pub async fn scan_once(&mut self) {
        let started = Instant::now();
        let deadline = self
            .config
            .scan_interval
            .saturating_sub(Duration::from_secs(1))
            .max(Duration::from_secs(1));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_symbols));
        let mut workers: JoinSet<(String, Result<bool, SymbolScanError>)> = JoinSet::new();

        let now = Instant::now();
        let mut analyzed = 0usize;

        for symbol in self.config.symbols.clone() {
            if let Some(health) = self.health.get(&symbol) {
                if health.skip_until.is_some_and(|until| now < until) {
                    debug!("ScanScheduler [{}]: skipped, backing off", symbol);
                    continue;
                }
            }
            analyzed += 1;

            let provider = Arc::clone(&self.provider);
            let aggregator = Arc::clone(&self.aggregator);
            let store = Arc::clone(&self.store);
            let alerts = Arc::clone(&self.alerts);
            let watches = Arc::clone(&self.watches);
            let semaphore = Arc::clone(&semaphore);
            let timeframes = self.config.timeframes.clone();
            let lookback = self.config.candle_lookback;

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (symbol, Err(SymbolScanError::DeadlineExpired)),
                };
                let result = match timeout(
                    deadline,
                    scan_symbol(
                        provider, aggregator, store, alerts, watches, &symbol, &timeframes,
                        lookback,
                    ),
                )
                .await
                {
                    Ok(result) => result,
                    // Soft deadline hit: the partial result is discarded.
                    Err(_) => Err(SymbolScanError::DeadlineExpired),
                };
                (symbol, result)
            });
        }

        let mut published = 0usize;
        let mut failed = 0usize;

        while let Some(joined) = workers.join_next().await {
            let Ok((symbol, result)) = joined else {
                failed += 1;
                continue;
            };
            match result {
                Ok(was_published) => {
                    if was_published {
                        published += 1;
                    }
                    self.note_success(&symbol);
                }
                Err(err) => {
                    failed += 1;
                    self.note_failure(&symbol, &err);
                }
            }
        }

        let elapsed = started.elapsed();
        info!(
            "ScanScheduler: tick done in {:?} ({} analyzed, {} published, {} failed)",
            elapsed, analyzed, published, failed
        );

        let mut status = self.status.write().await;
        status.last_scan_time = Some(Utc::now());
        status.last_scan_duration_ms = Some(elapsed.as_millis() as u64);
        status.next_scan_at = Some(
            Utc::now()
                + chrono::Duration::from_std(self.config.scan_interval)
                    .unwrap_or_else(|_| chrono::Duration::seconds(120)),
        );
        status.symbols_analyzed = analyzed;
        status.signals_published = published;
        status.symbols_failed = failed;
        status.ticks += 1;
    }

    fn note_success(&mut self, symbol: &str) {
        if let Some(health) = self.health.get_mut(symbol) {
            if health.consecutive_failures > 0 {
                info!("ScanScheduler [{}]: recovered", symbol);
            }
            health.consecutive_failures = 0;
            health.skip_until = None;
        }
    }

    fn note_failure(&mut self, symbol: &str, err: &SymbolScanError) {
        match err {
            SymbolScanError::Source(source) if source.is_auth() => {
                // Operators must act; the store keeps serving the last known
                // snapshot, which goes stale on its own.
                error!(
                    "ScanScheduler [{}]: authentication required: {}",
                    symbol, source
                );
            }
            SymbolScanError::InvalidCandle(invalid) => {
                warn!(
                    "ScanScheduler [{}]: tick aborted on invalid candle: {}",
                    symbol, invalid
                );
            }
            other => {
                warn!("ScanScheduler [{}]: scan failed: {}", symbol, other);
            }
        }

        let health = self.health.entry(symbol.to_string()).or_default();
        health.consecutive_failures += 1;

        let exponent = health.consecutive_failures.min(8);
        let backoff = BACKOFF_BASE
            .saturating_mul(2u32.saturating_pow(exponent.saturating_sub(1)))
            .min(self.config.scan_interval);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
        health.skip_until = Some(Instant::now() + backoff + jitter);

        if health.consecutive_failures >= self.config.max_fetch_failures {
            warn!(
                "ScanScheduler [{}]: unhealthy after {} consecutive failures, skipping a cycle",
                symbol, health.consecutive_failures
            );
            health.skip_until = Some(Instant::now() + self.config.scan_interval);
        }
    }
}

/// One independent unit of work: fetch every timeframe, aggregate, publish.
#[allow(clippy::too_many_arguments)]
async fn scan_symbol(
    provider: Arc<dyn CandleProvider>,
    aggregator: Arc<BatchAggregator>,
    store: Arc<SignalStore>,
    alerts: Arc<AlertService>,
    watches: Arc<PriceWatchRegistry>,
    symbol: &str,
    timeframes: &[Timeframe],
    lookback: usize,
) -> Result<bool, SymbolScanError> {
    let quote = timeout(FETCH_TIMEOUT, provider.latest_quote(symbol))
        .await
        .map_err(|_| SymbolScanError::FetchTimeout(FETCH_TIMEOUT))??;

    for alert in watches.check_quote(&quote).await {
        alerts.publish(alert).await;
    }

    let mut series = Vec::with_capacity(timeframes.len());
    for timeframe in timeframes {
        let candles = timeout(
            FETCH_TIMEOUT,
            provider.fetch_candles(symbol, *timeframe, lookback),
        )
        .await
        .map_err(|_| SymbolScanError::FetchTimeout(FETCH_TIMEOUT))??;
        series.push((*timeframe, candles));
    }

    let Some(signal) = aggregator.assemble(symbol, quote.price, &series)? else {
        debug!("ScanScheduler [{}]: below alignment minimum, not published", symbol);
        return Ok(false);
    };

    let previous = store.insert(signal.clone()).await;
    alerts.on_store_write(previous.as_ref(), &signal).await;
    Ok(true)
}
