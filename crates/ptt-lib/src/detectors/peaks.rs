use crate::config::{DetectorConfig, Extremum, SearchWindow};
use crate::error::{PipelineError, Result};
use crate::signal::{Events, Signal};
use crate::stats;

/// Index of the first extremum of `data[start..end]`, bounds clipped to the
/// signal. Fails with `EmptyWindow` if nothing remains after clipping.
pub fn window_extremum(data: &[f64], start: isize, end: isize, extremum: Extremum) -> Result<usize> {
    let n = data.len();
    let lo = start.max(0) as usize;
    let hi = end.clamp(0, n as isize) as usize;
    if lo >= hi {
        return Err(PipelineError::EmptyWindow {
            start,
            end,
            len: n,
        });
    }
    let slice = &data[lo..hi];
    let offset = match extremum {
        Extremum::Max => stats::argmax(slice),
        Extremum::Min => stats::argmin(slice),
    };
    offset.map(|o| lo + o).ok_or(PipelineError::EmptyWindow {
        start,
        end,
        len: n,
    })
}

/// Refractory-window peak scan over a filtered signal.
///
/// Starting `start_offset_s` into the signal, each window of one refractory
/// period is searched for its first maximum. Windows whose maximum is below
/// `mean + threshold_std * std` are skipped whole; otherwise the peak is
/// refined over the following half window and the scan resumes one
/// refractory period after it. The trailing partial window is checked once.
pub fn detect_peaks(signal: &Signal, cfg: &DetectorConfig) -> Result<Events> {
    cfg.validate(signal.fs)?;
    let data = &signal.data;
    let n = data.len();
    let distance = signal.samples_for(cfg.refractory_s);
    let delta = distance / 2;
    let sd = stats::std_dev(data);
    if sd == 0.0 {
        // A constant signal has no landmarks.
        return Ok(Events::default());
    }
    let threshold = stats::mean(data) + cfg.threshold_std * sd;
    log::debug!(
        "{}: scanning {} samples, refractory {} samples, threshold {:.4}",
        signal.name,
        n,
        distance,
        threshold
    );

    let mut peaks = Vec::new();
    let mut start = signal.samples_for(cfg.start_offset_s);
    while start < n {
        if start + distance < n {
            let peak = window_extremum(
                data,
                start as isize,
                (start + distance) as isize,
                Extremum::Max,
            )?;
            if data[peak] < threshold {
                start += distance;
                continue;
            }
            let peak = window_extremum(
                data,
                peak as isize,
                (peak + delta) as isize,
                Extremum::Max,
            )?;
            peaks.push(peak);
            start = peak + distance;
        } else {
            let peak = window_extremum(data, start as isize, n as isize, Extremum::Max)?;
            if data[peak] > threshold {
                peaks.push(peak);
            }
            break;
        }
    }
    Ok(Events::from_indices(peaks))
}

/// One extremum per reference event, searched in
/// `[reference + lbound * fs, reference + ubound * fs]`.
pub fn detect_conditioned(
    signal: &Signal,
    reference: &Events,
    window: &SearchWindow,
    extremum: Extremum,
) -> Result<Events> {
    window.validate()?;
    let fs = signal.fs as f64;
    let lo_off = (window.lbound_s * fs) as isize;
    let hi_off = (window.ubound_s * fs) as isize;
    let indices = reference
        .indices
        .iter()
        .map(|&r| {
            let r = r as isize;
            window_extremum(&signal.data, r + lo_off, r + hi_off + 1, extremum)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Events::from_indices(indices))
}

/// Reference events whose whole `[r + lbound * fs, r + ubound * fs]` window
/// lies inside a signal of `len` samples.
///
/// Detections on a clipped window land on the clip edge, so references near
/// either end of the recording are dropped instead of paired.
pub fn references_within(
    reference: &Events,
    window: &SearchWindow,
    fs: u32,
    len: usize,
) -> Events {
    let fs = fs as f64;
    let lo_off = (window.lbound_s * fs) as isize;
    let hi_off = (window.ubound_s * fs) as isize;
    let len = len as isize;
    Events::from_indices(
        reference
            .indices
            .iter()
            .copied()
            .filter(|&r| {
                let r = r as isize;
                r + lo_off >= 0 && r + hi_off < len
            })
            .collect(),
    )
}

/// Minima in the `width_s` windows right before and right after each peak.
/// Returns `(backward, forward)`, both aligned one-to-one with `peaks`.
pub fn detect_valleys(signal: &Signal, peaks: &Events, width_s: f64) -> Result<(Events, Events)> {
    let w = signal.samples_for(width_s) as isize;
    let mut backward = Vec::with_capacity(peaks.len());
    let mut forward = Vec::with_capacity(peaks.len());
    for &p in &peaks.indices {
        let p = p as isize;
        backward.push(window_extremum(&signal.data, p - w, p, Extremum::Min)?);
        forward.push(window_extremum(&signal.data, p + 1, p + w + 1, Extremum::Min)?);
    }
    Ok((Events::from_indices(backward), Events::from_indices(forward)))
}
