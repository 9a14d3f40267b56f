pub mod correct;
pub mod peaks;

pub use correct::correct_peaks;
pub use peaks::{
    detect_conditioned, detect_peaks, detect_valleys, references_within, window_extremum,
};
