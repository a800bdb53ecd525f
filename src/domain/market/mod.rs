pub mod candle;
pub mod resample;
pub mod timeframe;

pub use candle::{Candle, Quote};
pub use timeframe::Timeframe;
