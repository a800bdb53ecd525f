use crate::domain::market::{Candle, Timeframe};

/// Resamples an ordered base-timeframe series into `target` candles.
///
/// Bars are bucketed by the target period grid: open from the first bar of a
/// bucket, close from the last, high/low as extremes, volumes summed. The
/// trailing partial bucket is emitted as well, mirroring how live feeds show
/// the forming candle.
pub fn resample(base: &[Candle], target: Timeframe) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::new();

    for candle in base {
        let period_start = target.period_start(candle.timestamp);

        match out.last_mut() {
            Some(current) if current.timestamp == period_start => {
                current.high = current.high.max(candle.high);
                current.low = current.low.min(candle.low);
                current.close = candle.close;
                current.volume += candle.volume;
            }
            _ => {
                out.push(Candle {
                    symbol: candle.symbol.clone(),
                    open: candle.open,
                    high: candle.high,
                    low: candle.low,
                    close: candle.close,
                    volume: candle.volume,
                    timestamp: period_start,
                });
            }
        }
    }

    out
}

/// How many base bars cover one target bar; fetches are padded by this factor
/// so a resampled window still spans the requested lookback.
pub fn bars_per_target(base: Timeframe, target: Timeframe) -> usize {
    (target.to_seconds() / base.to_seconds()).max(1) as usize
}
