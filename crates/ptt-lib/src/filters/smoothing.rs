use crate::config::{RollingStatistic, SmoothingConfig, WindowShape};
use crate::error::Result;
use crate::signal::Signal;
use crate::stats;

/// Apply the configured smoothing stage.
///
/// Rolling windows are trailing (`[i + 1 - w, i]`); the first `w - 1`
/// samples use the partial window that is available.
pub fn smooth(signal: &Signal, cfg: &SmoothingConfig) -> Result<Signal> {
    cfg.validate(signal.fs)?;
    let data = match *cfg {
        SmoothingConfig::Rolling {
            statistic, shape, ..
        } => {
            let win = cfg.window_samples(signal.fs).unwrap_or(1);
            match statistic {
                RollingStatistic::Mean => rolling_mean(&signal.data, win, shape),
                RollingStatistic::Median => rolling_median(&signal.data, win),
            }
        }
        SmoothingConfig::Ema { span } => ema(&signal.data, span),
    };
    Ok(signal.derive("Smoothed", data))
}

pub fn rolling_mean(data: &[f64], win: usize, shape: WindowShape) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    if win <= 1 {
        return data.to_vec();
    }
    match shape {
        WindowShape::Boxcar => {
            let mut out = vec![0.0; data.len()];
            let mut acc = 0.0;
            for (i, &sample) in data.iter().enumerate() {
                acc += sample;
                if i >= win {
                    acc -= data[i - win];
                }
                out[i] = acc / (i + 1).min(win) as f64;
            }
            out
        }
        WindowShape::Triangular => {
            let weights = triangular_window(win);
            (0..data.len())
                .map(|i| {
                    let start = (i + 1).saturating_sub(win);
                    let w = &weights[win - (i + 1 - start)..];
                    let norm: f64 = w.iter().sum();
                    data[start..=i]
                        .iter()
                        .zip(w)
                        .map(|(x, k)| x * k)
                        .sum::<f64>()
                        / norm
                })
                .collect()
        }
    }
}

pub fn rolling_median(data: &[f64], win: usize) -> Vec<f64> {
    (0..data.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(win.max(1));
            stats::median(&data[start..=i])
        })
        .collect()
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, weighting every
/// past sample by `(1 - alpha)^age` and normalising by the weight total.
pub fn ema(data: &[f64], span: f64) -> Vec<f64> {
    let alpha = 2.0 / (span + 1.0);
    let decay = 1.0 - alpha;
    let mut num = 0.0;
    let mut den = 0.0;
    data.iter()
        .map(|&x| {
            num = x + decay * num;
            den = 1.0 + decay * den;
            num / den
        })
        .collect()
}

/// Symmetric triangular window of `m` non-zero weights.
fn triangular_window(m: usize) -> Vec<f64> {
    let half: Vec<f64> = (1..=(m + 1) / 2)
        .map(|n| {
            if m % 2 == 0 {
                (2 * n - 1) as f64 / m as f64
            } else {
                2.0 * n as f64 / (m + 1) as f64
            }
        })
        .collect();
    let mut w = half.clone();
    let mirror = if m % 2 == 0 { half.len() } else { half.len() - 1 };
    w.extend(half[..mirror].iter().rev());
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxcar_mean_uses_partial_windows_at_start() {
        let out = rolling_mean(&[2.0, 4.0, 6.0, 8.0], 2, WindowShape::Boxcar);
        assert_eq!(out, vec![2.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn triangular_window_shapes() {
        assert_eq!(triangular_window(3), vec![0.5, 1.0, 0.5]);
        assert_eq!(triangular_window(4), vec![0.25, 0.75, 0.75, 0.25]);
    }

    #[test]
    fn triangular_mean_weights_centre() {
        let out = rolling_mean(&[0.0, 0.0, 4.0, 0.0], 3, WindowShape::Triangular);
        assert_eq!(out.len(), 4);
        assert!((out[3] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rolling_median_rejects_spike() {
        let out = rolling_median(&[1.0, 1.0, 50.0, 1.0, 1.0], 3);
        assert_eq!(out[3], 1.0);
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn ema_matches_adjusted_weights() {
        let out = ema(&[1.0, 2.0, 3.0], 3.0);
        // alpha = 0.5: weights 1, 0.5, 0.25
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert!((out[1] - (2.0 + 0.5) / 1.5).abs() < 1e-12);
        assert!((out[2] - (3.0 + 1.0 + 0.25) / 1.75).abs() < 1e-12);
    }

    #[test]
    fn smoothing_preserves_length() {
        let sig = Signal::new("x", 2000, (0..100).map(|i| i as f64).collect());
        for cfg in [SmoothingConfig::rolling_mean(5.0), SmoothingConfig::ema(20.0)] {
            assert_eq!(smooth(&sig, &cfg).expect("smooth").len(), 100);
        }
        assert!(smooth(&sig, &SmoothingConfig::rolling_mean(0.1)).is_err());
    }
}
