//! Process configuration shared by the SpiralTorch sphere crates.
//!
//! Everything here is resolved from the environment once per process:
//! [`execution`] holds the determinism and parallelism knobs consulted by the
//! resampling backends, [`tracing`] installs the global subscriber.

pub mod execution;
pub mod tracing;
