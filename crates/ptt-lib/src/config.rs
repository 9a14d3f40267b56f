//! Immutable parameter sets for every filter stage, detector and channel.
//!
//! All structs deserialize from TOML with per-field defaults, so a config
//! file only needs to name what it overrides.

use crate::error::{PipelineError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_FS: u32 = 2000;

/// Zero-phase Butterworth bandpass parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandpassConfig {
    pub lowcut_hz: f64,
    pub highcut_hz: f64,
    pub order: usize,
}

impl BandpassConfig {
    pub fn new(lowcut_hz: f64, highcut_hz: f64, order: usize) -> Self {
        Self {
            lowcut_hz,
            highcut_hz,
            order,
        }
    }

    pub fn validate(&self, fs: u32) -> Result<()> {
        let nyquist = fs as f64 / 2.0;
        if self.order == 0 {
            return Err(PipelineError::invalid("bandpass", "order must be at least 1"));
        }
        if !(self.lowcut_hz > 0.0 && self.lowcut_hz < nyquist) {
            return Err(PipelineError::invalid(
                "bandpass",
                format!("low cutoff {} Hz outside (0, {})", self.lowcut_hz, nyquist),
            ));
        }
        if !(self.highcut_hz > 0.0 && self.highcut_hz < nyquist) {
            return Err(PipelineError::invalid(
                "bandpass",
                format!("high cutoff {} Hz outside (0, {})", self.highcut_hz, nyquist),
            ));
        }
        if self.lowcut_hz >= self.highcut_hz {
            return Err(PipelineError::invalid(
                "bandpass",
                format!(
                    "low cutoff {} Hz must be below high cutoff {} Hz",
                    self.lowcut_hz, self.highcut_hz
                ),
            ));
        }
        Ok(())
    }
}

/// Savitzky–Golay derivative parameters: polynomial order `p`, odd window
/// length `w`, derivative order `m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavGolConfig {
    pub polyorder: usize,
    pub window: usize,
    pub deriv: usize,
}

impl SavGolConfig {
    pub fn new(polyorder: usize, window: usize, deriv: usize) -> Self {
        Self {
            polyorder,
            window,
            deriv,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window % 2 == 0 {
            return Err(PipelineError::invalid(
                "derivative",
                format!("window length {} must be odd", self.window),
            ));
        }
        if self.window <= self.polyorder {
            return Err(PipelineError::invalid(
                "derivative",
                format!(
                    "window length {} must exceed polynomial order {}",
                    self.window, self.polyorder
                ),
            ));
        }
        if self.deriv > self.polyorder {
            return Err(PipelineError::invalid(
                "derivative",
                format!(
                    "derivative order {} exceeds polynomial order {}",
                    self.deriv, self.polyorder
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollingStatistic {
    Mean,
    Median,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowShape {
    #[default]
    Boxcar,
    Triangular,
}

/// Smoothing stage: a trailing rolling statistic or an exponential moving average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SmoothingConfig {
    Rolling {
        window_ms: f64,
        statistic: RollingStatistic,
        #[serde(default)]
        shape: WindowShape,
    },
    Ema {
        span: f64,
    },
}

impl SmoothingConfig {
    pub fn rolling_mean(window_ms: f64) -> Self {
        Self::Rolling {
            window_ms,
            statistic: RollingStatistic::Mean,
            shape: WindowShape::Boxcar,
        }
    }

    pub fn ema(span: f64) -> Self {
        Self::Ema { span }
    }

    /// Rolling window length in samples for `fs`.
    pub fn window_samples(&self, fs: u32) -> Option<usize> {
        match self {
            Self::Rolling { window_ms, .. } => Some((window_ms * fs as f64 * 1e-3) as usize),
            Self::Ema { .. } => None,
        }
    }

    pub fn validate(&self, fs: u32) -> Result<()> {
        match *self {
            Self::Rolling {
                window_ms,
                statistic,
                shape,
            } => {
                if self.window_samples(fs).unwrap_or(0) == 0 {
                    return Err(PipelineError::invalid(
                        "smoothing",
                        format!("{window_ms} ms is shorter than one sample at {fs} Hz"),
                    ));
                }
                if statistic == RollingStatistic::Median && shape != WindowShape::Boxcar {
                    return Err(PipelineError::invalid(
                        "smoothing",
                        "window shape weighting only applies to the rolling mean",
                    ));
                }
            }
            Self::Ema { span } => {
                if !(span >= 1.0) {
                    return Err(PipelineError::invalid(
                        "smoothing",
                        format!("EMA span {span} must be at least 1"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Outlier handling applied to a raw channel before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SanitizeStrategy {
    #[default]
    None,
    /// Drop samples outside the 1st–98th percentile. Shifts the time axis.
    QuantileTrim,
    /// Replace |z| > 2 samples with the median. Keeps the time axis.
    ZScoreClip,
}

impl SanitizeStrategy {
    pub fn preserves_alignment(self) -> bool {
        !matches!(self, Self::QuantileTrim)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Extremum {
    Max,
    Min,
}

/// Refractory-window scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum physiological inter-beat interval (seconds).
    pub refractory_s: f64,
    /// Samples skipped at the start of the scan (seconds).
    pub start_offset_s: f64,
    /// Threshold is `mean + threshold_std * std` of the scanned signal.
    pub threshold_std: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            refractory_s: 0.200,
            start_offset_s: 0.010,
            threshold_std: 1.5,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self, fs: u32) -> Result<()> {
        if (self.refractory_s * fs as f64) < 2.0 {
            return Err(PipelineError::invalid(
                "detector",
                format!("refractory period {} s spans fewer than 2 samples", self.refractory_s),
            ));
        }
        if self.start_offset_s < 0.0 {
            return Err(PipelineError::invalid("detector", "start offset is negative"));
        }
        Ok(())
    }
}

/// Search window relative to a reference event, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub lbound_s: f64,
    pub ubound_s: f64,
}

impl SearchWindow {
    pub fn new(lbound_s: f64, ubound_s: f64) -> Self {
        Self { lbound_s, ubound_s }
    }

    pub fn validate(&self) -> Result<()> {
        if self.lbound_s > self.ubound_s {
            return Err(PipelineError::invalid(
                "conditioned detector",
                format!("lower bound {} s above upper bound {} s", self.lbound_s, self.ubound_s),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcgConfig {
    pub sanitize: SanitizeStrategy,
    pub bandpass: BandpassConfig,
    pub derivative: SavGolConfig,
    pub smoothing: SmoothingConfig,
    pub detector: DetectorConfig,
    /// Half-width of the raw-signal correction window (seconds).
    pub correction_radius_s: f64,
}

impl Default for EcgConfig {
    fn default() -> Self {
        Self {
            sanitize: SanitizeStrategy::None,
            bandpass: BandpassConfig::new(5.0, 20.0, 1),
            derivative: SavGolConfig::new(3, 5, 1),
            smoothing: SmoothingConfig::rolling_mean(5.0),
            detector: DetectorConfig::default(),
            correction_radius_s: 0.070,
        }
    }
}

impl EcgConfig {
    pub fn validate(&self, fs: u32) -> Result<()> {
        self.bandpass.validate(fs)?;
        self.derivative.validate()?;
        self.smoothing.validate(fs)?;
        self.detector.validate(fs)?;
        if self.correction_radius_s >= self.detector.refractory_s {
            return Err(PipelineError::invalid(
                "corrector",
                "correction radius must be smaller than the refractory period",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BcgConfig {
    pub sanitize: SanitizeStrategy,
    pub bandpass: BandpassConfig,
    pub smoothing: SmoothingConfig,
    /// J-peak search window after each R-peak.
    pub j_window: SearchWindow,
    /// Width of the I/K valley windows on either side of a J-peak (seconds).
    pub valley_width_s: f64,
    /// Optional raw-signal re-anchoring of J-peaks.
    pub correction_radius_s: Option<f64>,
}

impl Default for BcgConfig {
    fn default() -> Self {
        Self {
            sanitize: SanitizeStrategy::ZScoreClip,
            bandpass: BandpassConfig::new(1.0, 10.0, 2),
            smoothing: SmoothingConfig::ema(20.0),
            j_window: SearchWindow::new(0.10, 0.35),
            valley_width_s: 0.050,
            correction_radius_s: None,
        }
    }
}

impl BcgConfig {
    pub fn validate(&self, fs: u32) -> Result<()> {
        self.bandpass.validate(fs)?;
        self.smoothing.validate(fs)?;
        self.j_window.validate()?;
        if (self.valley_width_s * fs as f64) < 1.0 {
            return Err(PipelineError::invalid(
                "valley detector",
                "valley window shorter than one sample",
            ));
        }
        if let Some(radius) = self.correction_radius_s {
            if (radius * fs as f64) < 1.0 {
                return Err(PipelineError::invalid(
                    "corrector",
                    "correction radius shorter than one sample",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpgConfig {
    pub sanitize: SanitizeStrategy,
    pub bandpass: BandpassConfig,
    pub smoothing: SmoothingConfig,
    pub derivative: SavGolConfig,
    /// Trough search window after each R-peak.
    pub trough_window: SearchWindow,
    /// Maximum-upstroke search window after each trough.
    pub upstroke_window: SearchWindow,
    /// Move each trough to the raw pulse foot. When off, troughs stay on the
    /// filtered minimum, which zero-phase filtering pulls ahead of the foot.
    pub refine_foot: bool,
    /// Second-derivative filter applied to the sanitized raw PPG.
    pub foot_curvature: SavGolConfig,
    /// Window around each upstroke where the raw curvature maximum marks the
    /// pulse foot.
    pub foot_window: SearchWindow,
}

impl Default for PpgConfig {
    fn default() -> Self {
        Self {
            sanitize: SanitizeStrategy::ZScoreClip,
            bandpass: BandpassConfig::new(0.5, 8.0, 2),
            smoothing: SmoothingConfig::ema(20.0),
            derivative: SavGolConfig::new(3, 21, 1),
            trough_window: SearchWindow::new(0.01, 0.40),
            upstroke_window: SearchWindow::new(0.0, 0.15),
            refine_foot: true,
            foot_curvature: SavGolConfig::new(3, 21, 2),
            foot_window: SearchWindow::new(-0.15, 0.0),
        }
    }
}

impl PpgConfig {
    pub fn validate(&self, fs: u32) -> Result<()> {
        self.bandpass.validate(fs)?;
        self.smoothing.validate(fs)?;
        self.derivative.validate()?;
        self.trough_window.validate()?;
        self.upstroke_window.validate()?;
        if self.refine_foot {
            self.foot_window.validate()?;
            if self.foot_curvature.deriv != 2 {
                return Err(PipelineError::invalid(
                    "ppg foot",
                    format!("foot curvature needs deriv = 2, got {}", self.foot_curvature.deriv),
                ));
            }
            self.foot_curvature.validate()?;
        }
        Ok(())
    }
}

/// IMU-derived BCG: axes are transformed and then run through a BCG pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    pub bcg: BcgConfig,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            bcg: BcgConfig {
                sanitize: SanitizeStrategy::None,
                ..BcgConfig::default()
            },
        }
    }
}

impl ImuConfig {
    pub fn validate(&self, fs: u32) -> Result<()> {
        self.bcg.validate(fs)
    }
}

/// Explicit column-name mapping for each channel role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMap {
    pub ecg: String,
    pub bcg: Option<String>,
    pub ppg: Option<String>,
    /// One to three accelerometer axes.
    pub imu: Vec<String>,
    /// Integer session/activity column; absent means one session.
    pub session: Option<String>,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            ecg: "ecg".into(),
            bcg: None,
            ppg: None,
            imu: Vec::new(),
            session: None,
        }
    }
}

impl ChannelMap {
    pub fn validate(&self) -> Result<()> {
        if self.ecg.trim().is_empty() {
            return Err(PipelineError::invalid("channel map", "ECG column name is empty"));
        }
        if self.imu.len() > 3 {
            return Err(PipelineError::invalid(
                "channel map",
                format!("{} IMU axes mapped, at most 3 allowed", self.imu.len()),
            ));
        }
        Ok(())
    }
}

/// Session id to human-readable activity name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionLabels(pub BTreeMap<String, String>);

impl SessionLabels {
    pub fn insert(&mut self, id: i64, label: impl Into<String>) {
        self.0.insert(id.to_string(), label.into());
    }

    pub fn label(&self, id: i64) -> String {
        self.0
            .get(&id.to_string())
            .cloned()
            .unwrap_or_else(|| format!("session {id}"))
    }
}

/// Top-level configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fs: u32,
    pub ecg: EcgConfig,
    pub bcg: BcgConfig,
    pub ppg: PpgConfig,
    pub imu: ImuConfig,
    pub channels: ChannelMap,
    pub labels: SessionLabels,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fs: DEFAULT_FS,
            ecg: EcgConfig::default(),
            bcg: BcgConfig::default(),
            ppg: PpgConfig::default(),
            imu: ImuConfig::default(),
            channels: ChannelMap::default(),
            labels: SessionLabels::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: PipelineConfig = toml::from_str(text).context("parsing pipeline config")?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Check every stage invariant against the configured sampling rate.
    pub fn validate(&self) -> Result<()> {
        if self.fs == 0 {
            return Err(PipelineError::invalid("recording", "sampling rate must be positive"));
        }
        self.ecg.validate(self.fs)?;
        self.bcg.validate(self.fs)?;
        self.ppg.validate(self.fs)?;
        self.imu.validate(self.fs)?;
        self.channels.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().expect("default config");
    }

    #[test]
    fn bandpass_rejects_cutoff_at_nyquist() {
        let err = BandpassConfig::new(5.0, 1000.0, 2).validate(2000).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { stage: "bandpass", .. }));
        assert!(BandpassConfig::new(20.0, 5.0, 2).validate(2000).is_err());
        assert!(BandpassConfig::new(0.0, 5.0, 2).validate(2000).is_err());
    }

    #[test]
    fn savgol_rejects_even_or_short_window() {
        assert!(SavGolConfig::new(3, 6, 1).validate().is_err());
        assert!(SavGolConfig::new(3, 3, 1).validate().is_err());
        assert!(SavGolConfig::new(2, 5, 3).validate().is_err());
        assert!(SavGolConfig::new(3, 5, 1).validate().is_ok());
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let text = r#"
fs = 1000

[ecg.bandpass]
lowcut_hz = 8.0
highcut_hz = 25.0
order = 2

[bcg.smoothing]
kind = "rolling"
window_ms = 20.0
statistic = "median"

[channels]
ecg = "chest sternum ECG"
ppg = "PPG finger"
imu = ["acc_x", "acc_y", "acc_z"]
session = "activity"

[labels]
1 = "sit"
2 = "walk"
"#;
        let cfg = PipelineConfig::from_toml_str(text).expect("parse");
        assert_eq!(cfg.fs, 1000);
        assert_eq!(cfg.ecg.bandpass, BandpassConfig::new(8.0, 25.0, 2));
        assert_eq!(cfg.ecg.derivative, SavGolConfig::new(3, 5, 1));
        assert_eq!(cfg.bcg.smoothing.window_samples(1000), Some(20));
        assert_eq!(cfg.channels.imu.len(), 3);
        assert_eq!(cfg.labels.label(2), "walk");
        assert_eq!(cfg.labels.label(7), "session 7");
        cfg.validate().expect("valid");
    }

    #[test]
    fn load_reports_the_failing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[bcg]\ncorrection_radius_s = 0.02\n").expect("write");
        let cfg = PipelineConfig::load(&good).expect("load");
        assert_eq!(cfg.bcg.correction_radius_s, Some(0.02));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "fs = \"fast\"\n").expect("write");
        let err = PipelineConfig::load(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("bad.toml"));
    }

    #[test]
    fn ppg_foot_refinement_is_configurable() {
        let cfg = PipelineConfig::from_toml_str("[ppg]\nrefine_foot = false\n").expect("parse");
        assert!(!cfg.ppg.refine_foot);
        cfg.validate().expect("valid");

        let mut ppg = PpgConfig {
            foot_curvature: SavGolConfig::new(3, 21, 1),
            ..PpgConfig::default()
        };
        let err = ppg.validate(2000).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { stage: "ppg foot", .. }));
        ppg.refine_foot = false;
        ppg.validate(2000).expect("unused curvature filter is not checked");
    }

    #[test]
    fn median_rejects_triangular_shape() {
        let cfg = SmoothingConfig::Rolling {
            window_ms: 10.0,
            statistic: RollingStatistic::Median,
            shape: WindowShape::Triangular,
        };
        assert!(cfg.validate(2000).is_err());
    }
}
