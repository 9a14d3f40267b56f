use crate::{
    channels::{ChannelKind, ChannelRecord},
    config::{EcgConfig, Extremum},
    detectors::{correct_peaks, detect_peaks},
    error::Result,
    filters,
    metrics::heart_rate,
    sanitize,
    signal::{Events, RRSeries, Signal},
};
use serde::{Deserialize, Serialize};

/// Processed ECG: Pan–Tompkins style envelope, R-peaks and heart rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcgRecord {
    pub raw: Signal,
    /// Bandpass → derivative → square → moving average.
    pub filtered: Signal,
    /// Peaks found on the envelope, before correction.
    pub detected: Events,
    /// Peaks re-anchored to the raw waveform.
    pub r_peaks: Events,
    pub heart_rate_bpm: f64,
}

impl EcgRecord {
    pub fn process(raw: &Signal, cfg: &EcgConfig) -> Result<Self> {
        cfg.validate(raw.fs)?;
        let raw = sanitize::apply(raw, cfg.sanitize);
        let bandpassed = filters::bandpass(&raw, &cfg.bandpass)?;
        let slope = filters::derivative(&bandpassed, &cfg.derivative)?;
        let energy = filters::square(&slope);
        let envelope = filters::smooth(&energy, &cfg.smoothing)?;
        let filtered = raw.derive("Filtered", envelope.data);

        let detected = detect_peaks(&filtered, &cfg.detector)?;
        let r_peaks = correct_peaks(&raw, &detected, cfg.correction_radius_s, Extremum::Max)?;
        let heart_rate_bpm = heart_rate(&r_peaks, raw.fs)?;
        log::info!(
            "{}: {} R-peaks, heart rate {:.1} bpm",
            raw.name,
            r_peaks.len(),
            heart_rate_bpm
        );
        Ok(Self {
            raw,
            filtered,
            detected,
            r_peaks,
            heart_rate_bpm,
        })
    }

    pub fn rr(&self) -> RRSeries {
        RRSeries::from_events(&self.r_peaks, self.raw.fs)
    }
}

impl ChannelRecord for EcgRecord {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Ecg
    }
    fn raw(&self) -> &Signal {
        &self.raw
    }
    fn filtered(&self) -> &Signal {
        &self.filtered
    }
    fn events(&self) -> &Events {
        &self.r_peaks
    }
}
