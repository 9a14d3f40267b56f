use crate::error::{PipelineError, Result};
use crate::signal::Signal;

/// Elementwise square, widening the contrast between peaks and the baseline.
pub fn square(signal: &Signal) -> Signal {
    signal.derive("Squared", signal.data.iter().map(|x| x * x).collect())
}

/// Elementwise `-(|x| * ln|x|)`, defined as 0 at `x == 0`.
///
/// Despite the historical "Shannon entropy" name this is an amplitude-weighted
/// log magnitude of each sample, not an entropy over a distribution. Values
/// near `|x| == 1` map to 0, which suppresses a 1 g gravity offset on
/// accelerometer axes.
pub fn amplitude_entropy(signal: &Signal) -> Signal {
    signal.derive(
        "Entropy",
        signal.data.iter().map(|&x| amplitude_entropy_sample(x)).collect(),
    )
}

pub fn amplitude_entropy_sample(x: f64) -> f64 {
    let mag = x.abs();
    if mag == 0.0 {
        0.0
    } else {
        -(mag * mag.ln())
    }
}

/// Euclidean magnitude across equally long axes.
pub fn vector_magnitude(axes: &[&Signal]) -> Result<Signal> {
    let Some(first) = axes.first() else {
        return Err(PipelineError::invalid("magnitude", "no axes"));
    };
    if let Some(odd) = axes.iter().find(|a| a.len() != first.len()) {
        return Err(PipelineError::invalid(
            "magnitude",
            format!(
                "axis {} has {} samples, {} has {}",
                odd.name,
                odd.len(),
                first.name,
                first.len()
            ),
        ));
    }
    let data = (0..first.len())
        .map(|i| axes.iter().map(|a| a.data[i].powi(2)).sum::<f64>().sqrt())
        .collect();
    Ok(first.derive("Magnitude", data))
}
