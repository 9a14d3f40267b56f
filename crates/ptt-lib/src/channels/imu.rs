use crate::{
    channels::{BcgRecord, ChannelKind, ChannelRecord},
    config::ImuConfig,
    error::{PipelineError, Result},
    filters,
    signal::{Events, Signal},
};
use serde::{Deserialize, Serialize};

/// Accelerometer-derived BCG.
///
/// One to three axes are collapsed to their magnitude, passed through the
/// amplitude-entropy transform and then processed exactly like a BCG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImuRecord {
    /// Entropy-transformed magnitude fed into the BCG pipeline.
    pub derived: Signal,
    pub bcg: BcgRecord,
}

impl ImuRecord {
    pub fn process(axes: &[Signal], r_peaks: &Events, cfg: &ImuConfig) -> Result<Self> {
        let combined = match axes {
            [] => return Err(PipelineError::invalid("imu", "no accelerometer axes")),
            [single] => single.clone(),
            many => {
                let refs: Vec<&Signal> = many.iter().collect();
                filters::vector_magnitude(&refs)?
            }
        };
        let derived = filters::amplitude_entropy(&combined);
        log::debug!(
            "{}: {} axes, {} samples",
            derived.name,
            axes.len(),
            derived.len()
        );
        let bcg = BcgRecord::process(&derived, r_peaks, &cfg.bcg)?;
        Ok(Self { derived, bcg })
    }

    pub fn j_peaks(&self) -> &Events {
        &self.bcg.j_peaks
    }

    pub fn r_peaks(&self) -> &Events {
        &self.bcg.r_peaks
    }

    pub fn transit_times(&self) -> Result<Vec<f64>> {
        self.bcg.transit_times()
    }
}

impl ChannelRecord for ImuRecord {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Imu
    }
    fn raw(&self) -> &Signal {
        &self.bcg.raw
    }
    fn filtered(&self) -> &Signal {
        &self.bcg.filtered
    }
    fn events(&self) -> &Events {
        &self.bcg.j_peaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::bcg::tests::synthetic_bcg;

    /// Vertical axis kept below 1/e, where the entropy transform is monotonic.
    fn axes(fs: u32, beats: &[usize], len: usize) -> Vec<Signal> {
        let bcg = synthetic_bcg(fs, beats, 450, len);
        let z = bcg.data.iter().map(|v| 0.2 + 0.01 * v).collect();
        vec![
            Signal::new("acc_x", fs, vec![0.0; len]),
            Signal::new("acc_y", fs, vec![0.0; len]),
            Signal::new("acc_z", fs, z),
        ]
    }

    #[test]
    fn three_axes_yield_one_j_peak_per_beat() {
        let fs = 2000;
        let beats: Vec<usize> = (0..10).map(|k| 1000 + 1600 * k).collect();
        let r_peaks = Events::from_indices(beats.clone());
        let record = ImuRecord::process(&axes(fs, &beats, 17_000), &r_peaks, &ImuConfig::default())
            .expect("imu");
        assert_eq!(record.derived.name, "acc_x (Magnitude) (Entropy)");
        assert_eq!(record.j_peaks().len(), beats.len());
        for ms in record.transit_times().expect("ptt") {
            assert!((ms - 225.0).abs() < 15.0, "R-J interval {ms} ms");
        }
    }

    #[test]
    fn single_axis_skips_magnitude() {
        let fs = 2000;
        let beats: Vec<usize> = (0..6).map(|k| 1000 + 1600 * k).collect();
        let z = axes(fs, &beats, 11_000).pop().expect("z axis");
        let record =
            ImuRecord::process(&[z], &Events::from_indices(beats), &ImuConfig::default())
                .expect("imu");
        assert_eq!(record.derived.name, "acc_z (Entropy)");
    }

    #[test]
    fn unequal_axes_are_invalid() {
        let fs = 2000;
        let beats: Vec<usize> = (0..6).map(|k| 1000 + 1600 * k).collect();
        let mut axes = axes(fs, &beats, 11_000);
        axes[1].data.truncate(10_000);
        let err = ImuRecord::process(&axes, &Events::from_indices(beats), &ImuConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidParameter { stage: "magnitude", .. }
        ));
    }

    #[test]
    fn no_axes_is_invalid() {
        let err = ImuRecord::process(&[], &Events::default(), &ImuConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { stage: "imu", .. }));
    }
}
