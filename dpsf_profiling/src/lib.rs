//! # DPSF Profiling
//!
//! Caller-owned frame-rate counters and timing profiling for particle
//! simulations.
//!
//! Every counter here is an ordinary value owned by whoever measures with it.
//! There is no global state: construct one, feed it every frame, query it.
//!
//! ## Example
//!
//! ```rust
//! use dpsf_profiling::{FrameRateCounter, Profiler};
//!
//! let mut fps = FrameRateCounter::new();
//! for _ in 0..60 {
//!     fps.update(1.0 / 60.0);
//! }
//! assert_eq!(fps.current_fps().round(), 60.0);
//!
//! let mut profiler = Profiler::new();
//! profiler.record("update", std::time::Duration::from_micros(250));
//! assert_eq!(profiler.get_stats("update").map(|s| s.call_count), Some(1));
//! ```

pub mod frame_rate;
pub mod profiler;

pub use frame_rate::{FrameRateCounter, FrameRateStats};
pub use profiler::{Profiler, ScopeStats};
