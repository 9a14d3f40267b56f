use serde::{Deserialize, Serialize};

/// Named, uniformly sampled series. Index `i` corresponds to time `i / fs`.
///
/// Processing stages never mutate a signal; each stage returns a new one
/// via [`Signal::derive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    /// Uniform sampling frequency in Hz
    pub fs: u32,
    /// Samples
    pub data: Vec<f64>,
}

impl Signal {
    pub fn new(name: impl Into<String>, fs: u32, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            fs,
            data,
        }
    }

    /// New signal on the same time axis, named after this one plus a stage tag.
    pub fn derive(&self, stage: &str, data: Vec<f64>) -> Self {
        Self {
            name: format!("{} ({})", self.name, stage),
            fs: self.fs,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs as f64
    }

    /// Number of whole samples covering `seconds`, truncated like an integer cast.
    pub fn samples_for(&self, seconds: f64) -> usize {
        samples_for(self.fs, seconds)
    }
}

pub fn samples_for(fs: u32, seconds: f64) -> usize {
    (seconds * fs as f64).max(0.0) as usize
}

/// Point events on a timeline (e.g., R-peak indices)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Boolean marker sequence of length `len`, true at each event index.
    /// Indices outside `[0, len)` are ignored.
    pub fn to_markers(&self, len: usize) -> Vec<bool> {
        let mut markers = vec![false; len];
        for &i in &self.indices {
            if let Some(slot) = markers.get_mut(i) {
                *slot = true;
            }
        }
        markers
    }
}

/// RR intervals (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn from_events(events: &Events, fs: u32) -> Self {
        let mut rr = Vec::new();
        for w in events.indices.windows(2) {
            let dt = (w[1] as f64 - w[0] as f64) / fs as f64;
            rr.push(dt);
        }
        Self { rr }
    }

    /// Beat-to-beat heart rate in beats per minute.
    pub fn instantaneous_bpm(&self) -> Vec<f64> {
        self.rr
            .iter()
            .filter(|&&dt| dt > 0.0)
            .map(|dt| 60.0 / dt)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_follow_event_indices() {
        let events = Events::from_indices(vec![0, 3, 9]);
        let markers = events.to_markers(5);
        assert_eq!(markers, vec![true, false, false, true, false]);
    }

    #[test]
    fn rr_series_from_events() {
        let events = Events::from_indices(vec![100, 900, 1700]);
        let rr = RRSeries::from_events(&events, 2000);
        assert_eq!(rr.rr.len(), 2);
        for bpm in rr.instantaneous_bpm() {
            assert!((bpm - 150.0).abs() < 1e-9);
        }
    }

    #[test]
    fn derived_signal_keeps_time_axis() {
        let raw = Signal::new("ECG", 2000, vec![1.0, 2.0]);
        let filtered = raw.derive("Filtered", vec![0.0, 0.0]);
        assert_eq!(filtered.name, "ECG (Filtered)");
        assert_eq!(filtered.fs, 2000);
        assert_eq!(raw.samples_for(0.2), 400);
    }
}
