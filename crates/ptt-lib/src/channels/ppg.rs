use crate::{
    channels::{ChannelKind, ChannelRecord},
    config::{Extremum, PpgConfig},
    detectors::detect_conditioned,
    error::Result,
    filters,
    metrics::pulse_transit_times,
    sanitize,
    signal::{Events, Signal},
};
use serde::{Deserialize, Serialize};

/// Processed photoplethysmogram with pulse feet and maximum upstrokes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpgRecord {
    pub raw: Signal,
    /// Bandpass → smoothing.
    pub filtered: Signal,
    /// First derivative of `filtered`. Upstrokes are located here.
    pub derivative: Signal,
    /// R-peaks the troughs were searched from, one per trough.
    pub r_peaks: Events,
    pub troughs: Events,
    pub upstrokes: Events,
}

impl PpgRecord {
    /// Filtered minimum after each R-peak, steepest rise after each minimum,
    /// then (with `refine_foot`) the raw curvature maximum before each rise.
    pub fn process(raw: &Signal, r_peaks: &Events, cfg: &PpgConfig) -> Result<Self> {
        cfg.validate(raw.fs)?;
        let raw = sanitize::apply(raw, cfg.sanitize);
        let bandpassed = filters::bandpass(&raw, &cfg.bandpass)?;
        let smoothed = filters::smooth(&bandpassed, &cfg.smoothing)?;
        let filtered = raw.derive("Filtered", smoothed.data);
        let derivative = filters::derivative(&filtered, &cfg.derivative)?;

        let minima = detect_conditioned(&filtered, r_peaks, &cfg.trough_window, Extremum::Min)?;
        let upstrokes =
            detect_conditioned(&derivative, &minima, &cfg.upstroke_window, Extremum::Max)?;
        let troughs = if cfg.refine_foot {
            let curvature = filters::derivative(&raw, &cfg.foot_curvature)?;
            detect_conditioned(&curvature, &upstrokes, &cfg.foot_window, Extremum::Max)?
        } else {
            minima
        };
        log::info!(
            "{}: {} troughs, {} upstrokes",
            raw.name,
            troughs.len(),
            upstrokes.len()
        );
        Ok(Self {
            raw,
            filtered,
            derivative,
            r_peaks: r_peaks.clone(),
            troughs,
            upstrokes,
        })
    }

    /// R-to-trough intervals in milliseconds.
    pub fn transit_times(&self) -> Result<Vec<f64>> {
        pulse_transit_times(&self.r_peaks, &self.troughs, self.raw.fs)
    }

    /// R-to-maximum-upstroke intervals in milliseconds.
    pub fn upstroke_times(&self) -> Result<Vec<f64>> {
        pulse_transit_times(&self.r_peaks, &self.upstrokes, self.raw.fs)
    }
}

impl ChannelRecord for PpgRecord {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Ppg
    }
    fn raw(&self) -> &Signal {
        &self.raw
    }
    fn filtered(&self) -> &Signal {
        &self.filtered
    }
    fn events(&self) -> &Events {
        &self.troughs
    }
}
