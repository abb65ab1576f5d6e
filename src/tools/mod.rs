//! One module per tool. Each exposes an `execute` that pulls data through
//! the provider, runs the analytics, and assembles a typed response.

pub mod dex;
pub mod full_analysis;
pub mod indicators;
pub mod levels;
pub mod multi_timeframe;
pub mod patterns;
pub mod price;
pub mod response_types;
pub mod signals;

/// Candle window depth used by the analytics tools.
pub const DEFAULT_PERIODS: usize = 100;
