//! Cardiovascular timing features from synchronized multi-channel recordings.
//!
//! ECG R-peaks are the timing reference; BCG J-peaks, PPG pulse feet and
//! IMU-derived BCG landmarks are located relative to them and turned into
//! pulse-transit-time series.

pub mod channels;
pub mod config;
pub mod detectors;
pub mod error;
pub mod filters;
pub mod io;
pub mod metrics;
pub mod plot;
pub mod recording;
pub mod sanitize;
pub mod signal;
pub mod stats;

pub use channels::*;
pub use config::PipelineConfig;
pub use detectors::*;
pub use error::{PipelineError, Result};
pub use metrics::*;
pub use recording::{session_ids, Recording, SessionData, SessionReport};
pub use signal::*;
