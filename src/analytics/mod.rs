//! The analytics kernel: indicator engine, pattern recognizer, level
//! analyzer and signal aggregator. Everything here is a pure function over
//! an immutable candle slice; no component retains state between calls.

pub mod indicators;
pub mod levels;
pub mod patterns;
pub mod signals;
