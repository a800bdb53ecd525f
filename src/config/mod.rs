//! Configuration for smcscan.
//!
//! All settings load from environment variables with sensible defaults so a
//! bare `smcscan` run scans the default universe against the mock provider.
//! Validation happens once at startup; any violation is fatal (exit 64).

use crate::domain::errors::ConfigError;
use crate::domain::market::Timeframe;
use crate::domain::structure::{FvgParams, StructureParams};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;

/// Which candle provider backs the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Mock,
    Broker,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Mode::Mock),
            "broker" => Ok(Mode::Broker),
            _ => Err(ConfigError::InvalidValue {
                key: "SMC_MODE".to_string(),
                value: s.to_string(),
                reason: "must be 'mock' or 'broker'".to_string(),
            }),
        }
    }
}

const DEFAULT_SYMBOLS: &str = "NIFTY50,BANKNIFTY,FINNIFTY,RELIANCE,HDFCBANK,TCS,INFY,SBIN";

/// Process-wide configuration, initialized at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    /// When set, higher timeframes are resampled from this base interval
    /// instead of fetched directly.
    pub resample_base: Option<Timeframe>,

    // Scheduler
    pub scan_interval_seconds: u64,
    pub max_concurrent_symbols: usize,
    pub max_fetch_failures: u32,
    pub candle_lookback: usize,

    // Structure detection
    pub swing_base_lookback: usize,
    pub bos_threshold_pct: Decimal,
    pub choch_threshold_pct: Decimal,
    pub min_structure_distance_pct: Decimal,
    pub structure_lock_bars: usize,
    pub min_fvg_size_pct: Decimal,
    pub fvg_prune_bars: i64,

    // Aggregation & alerts
    pub min_matching_timeframes: usize,
    pub proximity_near_pct: Decimal,
    pub proximity_far_pct: Decimal,
    /// Proximity recorded for entries with no structure event.
    pub proximity_far_sentinel: Decimal,
    pub alert_buffer: usize,
    pub subscriber_queue_depth: usize,

    // Broker provider
    pub broker_base_url: String,
    pub broker_api_key: String,
    pub broker_api_secret: String,

    // HTTP surface
    pub server_bind: String,
    pub server_port: u16,
}

impl Config {
    /// Loads and validates the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = Mode::from_str(&env_or("SMC_MODE", "mock"))?;

        let symbols: Vec<String> = env_or("SMC_SYMBOLS", DEFAULT_SYMBOLS)
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        let timeframes = parse_timeframes(&env_or("SMC_TIMEFRAMES", "5m,15m,30m,1h,2h,4h"))?;

        let resample_base = match env::var("SMC_RESAMPLE_FROM") {
            Ok(raw) if !raw.trim().is_empty() => Some(Timeframe::from_str(raw.trim()).map_err(
                |_| ConfigError::UnknownTimeframe {
                    token: raw.trim().to_string(),
                },
            )?),
            _ => None,
        };

        let config = Self {
            mode,
            symbols,
            timeframes,
            resample_base,
            scan_interval_seconds: env_parse("SCAN_INTERVAL_SECONDS", 120)?,
            max_concurrent_symbols: env_parse("MAX_CONCURRENT_SYMBOLS", 8)?,
            max_fetch_failures: env_parse("MAX_FETCH_FAILURES", 3)?,
            candle_lookback: env_parse("CANDLE_LOOKBACK", 100)?,
            swing_base_lookback: env_parse("SWING_BASE_LOOKBACK", 20)?,
            bos_threshold_pct: env_parse("BOS_THRESHOLD_PCT", dec!(0.3))?,
            choch_threshold_pct: env_parse("CHOCH_THRESHOLD_PCT", dec!(0.5))?,
            min_structure_distance_pct: env_parse("MIN_STRUCTURE_DISTANCE_PCT", dec!(1.0))?,
            structure_lock_bars: env_parse("STRUCTURE_LOCK_BARS", 5)?,
            min_fvg_size_pct: env_parse("MIN_FVG_SIZE_PCT", dec!(0.2))?,
            fvg_prune_bars: env_parse("FVG_PRUNE_BARS", 50)?,
            min_matching_timeframes: env_parse("MIN_MATCHING_TIMEFRAMES", 2)?,
            proximity_near_pct: env_parse("PROXIMITY_NEAR_PCT", dec!(2.0))?,
            proximity_far_pct: env_parse("PROXIMITY_FAR_PCT", dec!(3.0))?,
            proximity_far_sentinel: env_parse("PROXIMITY_FAR_SENTINEL", dec!(999.0))?,
            alert_buffer: env_parse("ALERT_BUFFER", 100)?,
            subscriber_queue_depth: env_parse("SUBSCRIBER_QUEUE_DEPTH", 32)?,
            broker_base_url: env_or("BROKER_BASE_URL", ""),
            broker_api_key: env_or("BROKER_API_KEY", ""),
            broker_api_secret: env_or("BROKER_API_SECRET", ""),
            server_bind: env_or("SERVER_BIND", "127.0.0.1"),
            server_port: env_parse("SERVER_PORT", 8686)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Missing {
                key: "SMC_SYMBOLS".to_string(),
            });
        }
        if self.timeframes.is_empty() {
            return Err(ConfigError::Missing {
                key: "SMC_TIMEFRAMES".to_string(),
            });
        }

        range_check(
            "SCAN_INTERVAL_SECONDS",
            self.scan_interval_seconds >= 10,
            &self.scan_interval_seconds.to_string(),
            "must be at least 10 seconds",
        )?;
        range_check(
            "MAX_CONCURRENT_SYMBOLS",
            self.max_concurrent_symbols >= 1,
            &self.max_concurrent_symbols.to_string(),
            "must be at least 1",
        )?;
        range_check(
            "MIN_MATCHING_TIMEFRAMES",
            (1..=self.timeframes.len()).contains(&self.min_matching_timeframes),
            &self.min_matching_timeframes.to_string(),
            "must be between 1 and the number of timeframes",
        )?;
        range_check(
            "BOS_THRESHOLD_PCT",
            self.bos_threshold_pct > Decimal::ZERO,
            &self.bos_threshold_pct.to_string(),
            "must be positive",
        )?;
        range_check(
            "CHOCH_THRESHOLD_PCT",
            self.choch_threshold_pct > Decimal::ZERO,
            &self.choch_threshold_pct.to_string(),
            "must be positive",
        )?;
        range_check(
            "MIN_STRUCTURE_DISTANCE_PCT",
            self.min_structure_distance_pct >= Decimal::ZERO,
            &self.min_structure_distance_pct.to_string(),
            "must not be negative",
        )?;
        range_check(
            "STRUCTURE_LOCK_BARS",
            self.structure_lock_bars >= 1,
            &self.structure_lock_bars.to_string(),
            "must be at least 1",
        )?;
        range_check(
            "MIN_FVG_SIZE_PCT",
            self.min_fvg_size_pct >= Decimal::ZERO,
            &self.min_fvg_size_pct.to_string(),
            "must not be negative",
        )?;
        range_check(
            "FVG_PRUNE_BARS",
            self.fvg_prune_bars >= 1,
            &self.fvg_prune_bars.to_string(),
            "must be at least 1",
        )?;
        range_check(
            "PROXIMITY_NEAR_PCT",
            self.proximity_near_pct > Decimal::ZERO
                && self.proximity_near_pct < self.proximity_far_pct,
            &self.proximity_near_pct.to_string(),
            "must be positive and below PROXIMITY_FAR_PCT",
        )?;
        range_check(
            "SWING_BASE_LOOKBACK",
            self.swing_base_lookback >= 5,
            &self.swing_base_lookback.to_string(),
            "must be at least 5",
        )?;
        range_check(
            "CANDLE_LOOKBACK",
            self.candle_lookback >= self.swing_base_lookback + 3,
            &self.candle_lookback.to_string(),
            "must cover the swing lookback plus three candles",
        )?;

        if self.mode == Mode::Broker && self.broker_base_url.is_empty() {
            return Err(ConfigError::Missing {
                key: "BROKER_BASE_URL".to_string(),
            });
        }

        if let Some(base) = self.resample_base {
            for tf in &self.timeframes {
                range_check(
                    "SMC_RESAMPLE_FROM",
                    tf.to_seconds() % base.to_seconds() == 0,
                    base.token(),
                    &format!("{} is not a multiple of the resample base", tf),
                )?;
            }
        }

        Ok(())
    }

    pub fn structure_params(&self) -> StructureParams {
        StructureParams {
            bos_threshold_pct: self.bos_threshold_pct,
            choch_threshold_pct: self.choch_threshold_pct,
            min_structure_distance_pct: self.min_structure_distance_pct,
            structure_lock_bars: self.structure_lock_bars,
        }
    }

    pub fn fvg_params(&self) -> FvgParams {
        FvgParams {
            min_fvg_size_pct: self.min_fvg_size_pct,
            prune_bars: self.fvg_prune_bars,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
            reason: "failed to parse".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_timeframes(raw: &str) -> Result<Vec<Timeframe>, ConfigError> {
    let mut timeframes = Vec::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let tf = Timeframe::from_str(token).map_err(|_| ConfigError::UnknownTimeframe {
            token: token.to_string(),
        })?;
        if !timeframes.contains(&tf) {
            timeframes.push(tf);
        }
    }
    Ok(timeframes)
}

fn range_check(key: &str, ok: bool, value: &str, reason: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            mode: Mode::Mock,
            symbols: vec!["NIFTY50".to_string(), "BANKNIFTY".to_string()],
            timeframes: Timeframe::all(),
            resample_base: None,
            scan_interval_seconds: 120,
            max_concurrent_symbols: 8,
            max_fetch_failures: 3,
            candle_lookback: 100,
            swing_base_lookback: 20,
            bos_threshold_pct: dec!(0.3),
            choch_threshold_pct: dec!(0.5),
            min_structure_distance_pct: dec!(1.0),
            structure_lock_bars: 5,
            min_fvg_size_pct: dec!(0.2),
            fvg_prune_bars: 50,
            min_matching_timeframes: 2,
            proximity_near_pct: dec!(2.0),
            proximity_far_pct: dec!(3.0),
            proximity_far_sentinel: dec!(999.0),
            alert_buffer: 100,
            subscriber_queue_depth: 32,
            broker_base_url: String::new(),
            broker_api_key: String::new(),
            broker_api_secret: String::new(),
            server_bind: "127.0.0.1".to_string(),
            server_port: 8686,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(Mode::from_str("mock").unwrap(), Mode::Mock);
        assert_eq!(Mode::from_str("BROKER").unwrap(), Mode::Broker);
        assert!(Mode::from_str("paper").is_err());
    }

    #[test]
    fn test_unknown_timeframe_token_rejected() {
        assert!(parse_timeframes("5m,15m").is_ok());
        assert!(matches!(
            parse_timeframes("5m,1w"),
            Err(ConfigError::UnknownTimeframe { .. })
        ));
    }

    #[test]
    fn test_near_must_be_below_far() {
        let mut config = base_config();
        config.proximity_near_pct = dec!(4.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_matches_bounded_by_timeframes() {
        let mut config = base_config();
        config.min_matching_timeframes = 7;
        assert!(config.validate().is_err());
        config.min_matching_timeframes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_broker_mode_requires_base_url() {
        let mut config = base_config();
        config.mode = Mode::Broker;
        assert!(config.validate().is_err());
        config.broker_base_url = "https://broker.example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lookback_must_cover_swing_window() {
        let mut config = base_config();
        config.candle_lookback = 20;
        assert!(config.validate().is_err());
    }
}
