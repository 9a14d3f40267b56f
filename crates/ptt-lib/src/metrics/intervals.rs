use crate::error::{PipelineError, Result};
use crate::signal::{Events, RRSeries};
use serde::{Deserialize, Serialize};

/// Mean heart rate in beats per minute, rounded to one decimal.
pub fn heart_rate(peaks: &Events, fs: u32) -> Result<f64> {
    if peaks.len() < 2 {
        return Err(PipelineError::InsufficientEvents {
            required: 2,
            found: peaks.len(),
        });
    }
    let rr = RRSeries::from_events(peaks, fs);
    let mean_rr = rr.rr.iter().sum::<f64>() / rr.rr.len() as f64;
    Ok(round_to(60.0 / mean_rr, 1))
}

/// Pulse transit time in milliseconds for each (reference, event) pair.
///
/// The two sequences must already correspond one-to-one.
pub fn pulse_transit_times(reference: &Events, events: &Events, fs: u32) -> Result<Vec<f64>> {
    if reference.len() != events.len() {
        return Err(PipelineError::AlignmentMismatch {
            reference: reference.len(),
            events: events.len(),
        });
    }
    Ok(reference
        .indices
        .iter()
        .zip(&events.indices)
        .map(|(&r, &e)| (e as f64 - r as f64) * 1000.0 / fs as f64)
        .collect())
}

/// Summary of a pulse-transit-time series (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PttSummary {
    pub n: usize,
    pub mean_ms: f64,
    pub sd_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

pub fn summarize_ptt(ptt: &[f64]) -> Option<PttSummary> {
    if ptt.is_empty() {
        return None;
    }
    let n = ptt.len();
    let mean = ptt.iter().sum::<f64>() / n as f64;
    let sd = if n > 1 {
        (ptt.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
    } else {
        0.0
    };
    Some(PttSummary {
        n,
        mean_ms: mean,
        sd_ms: sd,
        min_ms: ptt.iter().copied().fold(f64::INFINITY, f64::min),
        max_ms: ptt.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
