use crate::application::aggregator::{AggregatorConfig, BatchAggregator};
use crate::application::alerts::{AlertBus, AlertGeneratorConfig, AlertService};
use crate::application::analyzer::{AnalyzerConfig, TimeframeAnalyzer};
use crate::application::price_alerts::PriceWatchRegistry;
use crate::application::scheduler::{ScanScheduler, SchedulerCommand, SchedulerConfig};
use crate::application::signal_store::SignalStore;
use crate::config::{Config, Mode};
use crate::domain::errors::CandleSourceError;
use crate::domain::ports::CandleProvider;
use crate::infrastructure::broker::BrokerCandleProvider;
use crate::infrastructure::mock::MockCandleProvider;
use crate::infrastructure::resampling::ResamplingProvider;
use crate::interfaces::http::{AppState, build_router};
use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Wires configuration into the running system: provider, aggregator,
/// scheduler, store, alert pipeline and the HTTP surface.
pub struct Application {
    config: Config,
    scheduler: ScanScheduler,
    cmd_tx: mpsc::Sender<SchedulerCommand>,
    cmd_rx: mpsc::Receiver<SchedulerCommand>,
    bus: Arc<AlertBus>,
    state: Arc<AppState>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        let mut provider: Arc<dyn CandleProvider> = match config.mode {
            Mode::Mock => {
                info!("Application: using deterministic mock candle provider");
                Arc::new(MockCandleProvider::new())
            }
            Mode::Broker => {
                let provider = BrokerCandleProvider::new(
                    config.broker_base_url.clone(),
                    config.broker_api_key.clone(),
                    config.broker_api_secret.clone(),
                );
                if !provider.is_ready() {
                    return Err(CandleSourceError::Auth {
                        reason: "broker credentials missing".to_string(),
                    })
                    .context("candle provider is not ready");
                }
                info!(
                    "Application: using broker candle provider at {}",
                    config.broker_base_url
                );
                Arc::new(provider)
            }
        };

        if let Some(base) = config.resample_base {
            info!("Application: resampling higher timeframes from {base} bars");
            provider = Arc::new(ResamplingProvider::new(provider, base));
        }

        let analyzer = TimeframeAnalyzer::new(AnalyzerConfig {
            swing_base_lookback: config.swing_base_lookback,
            structure: config.structure_params(),
            fvg: config.fvg_params(),
        });
        let aggregator = Arc::new(BatchAggregator::new(
            analyzer,
            AggregatorConfig {
                min_matching_timeframes: config.min_matching_timeframes,
                proximity_far_sentinel: config.proximity_far_sentinel,
            },
        ));

        let store = Arc::new(SignalStore::new(3 * config.scan_interval_seconds as i64));
        let bus = Arc::new(AlertBus::new(
            config.alert_buffer,
            config.subscriber_queue_depth,
        ));
        let alerts = Arc::new(AlertService::new(
            AlertGeneratorConfig {
                near_pct: config.proximity_near_pct,
                far_pct: config.proximity_far_pct,
                dedup_window: ChronoDuration::seconds(60),
            },
            Arc::clone(&bus),
        ));

        let watches = Arc::new(PriceWatchRegistry::new());

        let scheduler = ScanScheduler::new(
            provider,
            aggregator,
            Arc::clone(&store),
            alerts,
            Arc::clone(&watches),
            SchedulerConfig {
                symbols: config.symbols.clone(),
                timeframes: config.timeframes.clone(),
                scan_interval: Duration::from_secs(config.scan_interval_seconds),
                max_concurrent_symbols: config.max_concurrent_symbols,
                candle_lookback: config.candle_lookback,
                max_fetch_failures: config.max_fetch_failures,
            },
        );

        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let state = Arc::new(AppState {
            store,
            bus: Arc::clone(&bus),
            status: scheduler.status_handle(),
            scheduler_tx: cmd_tx.clone(),
            watches,
        });

        Ok(Self {
            config,
            scheduler,
            cmd_tx,
            cmd_rx,
            bus,
            state,
        })
    }

    pub async fn run(self) -> Result<()> {
        let scheduler_handle = tokio::spawn(self.scheduler.run(self.cmd_rx));

        let addr: SocketAddr = format!("{}:{}", self.config.server_bind, self.config.server_port)
            .parse()
            .context("invalid server bind address")?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        info!("Application: HTTP surface listening on http://{addr}");

        let router = build_router(Arc::clone(&self.state));
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server failed")?;

        // Orderly teardown: stop scanning, then drain the alert bus.
        let _ = self.cmd_tx.send(SchedulerCommand::Shutdown).await;
        let _ = scheduler_handle.await;
        self.bus.close().await;
        info!("Application: shutdown complete");

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Application: failed to install Ctrl+C handler: {e}");
    }
    info!("Application: shutdown signal received");
}
