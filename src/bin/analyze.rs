//! One-shot analysis: run the full per-timeframe pipeline for a symbol
//! against the deterministic mock provider and print the result as JSON.
//!
//! Usage: `analyze [SYMBOL]` (defaults to NIFTY50)

use smcscan::application::aggregator::{AggregatorConfig, BatchAggregator};
use smcscan::application::analyzer::TimeframeAnalyzer;
use smcscan::domain::market::Timeframe;
use smcscan::domain::ports::CandleProvider;
use smcscan::infrastructure::mock::MockCandleProvider;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let symbol = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "NIFTY50".to_string())
        .to_uppercase();

    let provider = MockCandleProvider::new();
    let aggregator = BatchAggregator::new(TimeframeAnalyzer::default(), AggregatorConfig::default());

    let quote = provider.latest_quote(&symbol).await?;

    let mut series = Vec::new();
    for timeframe in Timeframe::all() {
        let candles = provider.fetch_candles(&symbol, timeframe, 100).await?;
        series.push((timeframe, candles));
    }

    match aggregator.assemble(&symbol, quote.price, &series)? {
        Some(signal) => println!("{}", serde_json::to_string_pretty(&signal)?),
        None => println!(
            "{}",
            serde_json::json!({
                "symbol": symbol,
                "published": false,
                "reason": "fewer timeframes aligned than the configured minimum",
            })
        ),
    }

    Ok(())
}
