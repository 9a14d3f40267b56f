//! Digital filter bank. Every stage returns a new signal of the same length.

pub mod butterworth;
pub mod savgol;
pub mod smoothing;
pub mod transforms;

pub use butterworth::{bandpass, Butterworth};
pub use savgol::derivative;
pub use smoothing::smooth;
pub use transforms::{amplitude_entropy, square, vector_magnitude};
