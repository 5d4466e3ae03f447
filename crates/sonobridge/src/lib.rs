//! Sonobridge — Playback/OS Audio Bridge
//!
//! Frequency-band visualization from live playback and background-audio
//! session coordination.
//!
//! ## Quick start
//!
//! ```no_run
//! use sonobridge::config::BridgeConfig;
//! use sonobridge::session::BridgeEngine;
//! use sonobridge::visualizer::{SyntheticCapture, SyntheticSignal};
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod session;
pub mod visualizer;

#[cfg(test)]
mod testing;
