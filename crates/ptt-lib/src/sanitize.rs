//! Outlier handling for raw channels.

use crate::config::SanitizeStrategy;
use crate::signal::Signal;
use crate::stats;

const TRIM_LOW_Q: f64 = 0.01;
const TRIM_HIGH_Q: f64 = 0.98;
const CLIP_Z: f64 = 2.0;

/// Keep only samples within the [1st, 98th] percentile, closing the gaps.
///
/// The result is shorter than the input and its time axis no longer lines
/// up with other channels.
pub fn quantile_trim(signal: &Signal) -> Signal {
    let low = stats::quantile(&signal.data, TRIM_LOW_Q);
    let high = stats::quantile(&signal.data, TRIM_HIGH_Q);
    let data = signal
        .data
        .iter()
        .copied()
        .filter(|x| (low..=high).contains(x))
        .collect();
    Signal::new(signal.name.clone(), signal.fs, data)
}

/// Replace samples with `|z| > 2` by the series median. Length is preserved.
pub fn zscore_clip(signal: &Signal) -> Signal {
    let mean = stats::mean(&signal.data);
    let sd = stats::std_dev(&signal.data);
    if sd == 0.0 {
        return signal.clone();
    }
    let median = stats::median(&signal.data);
    let data = signal
        .data
        .iter()
        .map(|&x| if ((x - mean) / sd).abs() > CLIP_Z { median } else { x })
        .collect();
    Signal::new(signal.name.clone(), signal.fs, data)
}

pub fn apply(signal: &Signal, strategy: SanitizeStrategy) -> Signal {
    match strategy {
        SanitizeStrategy::None => signal.clone(),
        SanitizeStrategy::QuantileTrim => quantile_trim(signal),
        SanitizeStrategy::ZScoreClip => zscore_clip(signal),
    }
}
