use crate::{
    channels::{ChannelKind, ChannelRecord},
    config::{BcgConfig, Extremum},
    detectors::{correct_peaks, detect_conditioned, detect_valleys},
    error::Result,
    filters,
    metrics::pulse_transit_times,
    sanitize,
    signal::{Events, Signal},
};
use serde::{Deserialize, Serialize};

/// Processed ballistocardiogram with I-J-K landmarks for every heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcgRecord {
    pub raw: Signal,
    /// Bandpass → smoothing.
    pub filtered: Signal,
    /// R-peaks the landmarks were searched from, one per J-peak.
    pub r_peaks: Events,
    pub j_peaks: Events,
    pub i_valleys: Events,
    pub k_valleys: Events,
}

impl BcgRecord {
    /// Locate one J-peak after each R-peak, then the I and K valleys around it.
    ///
    /// Every J window must fit inside the recording; trailing R-peaks are
    /// expected to be dropped with `references_within` beforehand.
    pub fn process(raw: &Signal, r_peaks: &Events, cfg: &BcgConfig) -> Result<Self> {
        cfg.validate(raw.fs)?;
        let raw = sanitize::apply(raw, cfg.sanitize);
        let bandpassed = filters::bandpass(&raw, &cfg.bandpass)?;
        let smoothed = filters::smooth(&bandpassed, &cfg.smoothing)?;
        let filtered = raw.derive("Filtered", smoothed.data);

        let mut j_peaks = detect_conditioned(&filtered, r_peaks, &cfg.j_window, Extremum::Max)?;
        if let Some(radius) = cfg.correction_radius_s {
            j_peaks = correct_peaks(&raw, &j_peaks, radius, Extremum::Max)?;
        }
        let (i_valleys, k_valleys) = detect_valleys(&filtered, &j_peaks, cfg.valley_width_s)?;
        log::info!("{}: {} J-peaks", raw.name, j_peaks.len());
        Ok(Self {
            raw,
            filtered,
            r_peaks: r_peaks.clone(),
            j_peaks,
            i_valleys,
            k_valleys,
        })
    }

    /// R-to-J intervals in milliseconds.
    pub fn transit_times(&self) -> Result<Vec<f64>> {
        pulse_transit_times(&self.r_peaks, &self.j_peaks, self.raw.fs)
    }
}

impl ChannelRecord for BcgRecord {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Bcg
    }
    fn raw(&self) -> &Signal {
        &self.raw
    }
    fn filtered(&self) -> &Signal {
        &self.filtered
    }
    fn events(&self) -> &Events {
        &self.j_peaks
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::f64::consts::PI;

    /// One damped I-J-K oscillation per beat, `delay` samples after the beat,
    /// riding on a large respiratory swing.
    pub(crate) fn synthetic_bcg(fs: u32, beats: &[usize], delay: usize, len: usize) -> Signal {
        let data = (0..len)
            .map(|i| {
                let t = i as f64 / fs as f64;
                let breathing = 3.0 * (2.0 * PI * 0.25 * t).sin();
                breathing
                    + beats
                        .iter()
                        .map(|&b| {
                            let dt = (i as f64 - (b + delay) as f64) / fs as f64;
                            (-0.5 * (dt / 0.06).powi(2)).exp() * (2.0 * PI * 4.0 * dt).cos()
                        })
                        .sum::<f64>()
            })
            .collect();
        Signal::new("BCG", fs, data)
    }

    #[test]
    fn j_peaks_follow_each_r_peak() {
        let fs = 2000;
        let beats: Vec<usize> = (0..10).map(|k| 1000 + 1600 * k).collect();
        let bcg = synthetic_bcg(fs, &beats, 450, 1000 + 1600 * 10);
        let r_peaks = Events::from_indices(beats.clone());
        let record = BcgRecord::process(&bcg, &r_peaks, &BcgConfig::default()).expect("bcg");

        assert_eq!(record.j_peaks.len(), beats.len());
        assert_eq!(record.i_valleys.len(), beats.len());
        assert_eq!(record.k_valleys.len(), beats.len());
        for ((j, i), k) in record
            .j_peaks
            .indices
            .iter()
            .zip(&record.i_valleys.indices)
            .zip(&record.k_valleys.indices)
        {
            assert!(i < j && j < k);
        }
        assert_eq!(record.r_peaks, r_peaks);
        let ptt = record.transit_times().expect("ptt");
        for ms in ptt {
            assert!((ms - 225.0).abs() < 15.0, "R-J interval {ms} ms");
        }
    }

    #[test]
    fn last_r_peak_too_close_to_end_fails_the_channel() {
        let fs = 2000;
        let beats = vec![1000, 2600];
        let bcg = synthetic_bcg(fs, &beats, 450, 2700);
        let r_peaks = Events::from_indices(beats);
        let err = BcgRecord::process(&bcg, &r_peaks, &BcgConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyWindow { .. }));
    }
}
