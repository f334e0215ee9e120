//! # statecodec-observability
//!
//! Structured logging for StateCodec.
//!
//! Every StateCodec crate logs through `tracing`. Decodings log at `debug!`
//! when they suspend on a request or drop an event candidate, allocation
//! steps go to `trace!`, and batch drivers summarise at `info!`. This crate
//! installs a subscriber for them, emitting either human-readable text or
//! JSON compatible with ELK, Loki and CloudWatch.
//! Log levels are configurable per component.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
