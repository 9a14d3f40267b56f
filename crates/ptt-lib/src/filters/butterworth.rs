//! Butterworth bandpass design (bilinear transform, second-order sections)
//! and zero-phase forward-backward application.

use crate::config::BandpassConfig;
use crate::error::{PipelineError, Result};
use crate::signal::Signal;
use realfft::{num_complex::Complex, RealFftPlanner};
use std::f64::consts::PI;

/// One second-order section, `a[0]` normalised to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    fn response(&self, z_inv: Complex<f64>) -> Complex<f64> {
        let z2 = z_inv * z_inv;
        let num = self.b[0] + z_inv * self.b[1] + z2 * self.b[2];
        let den = self.a[0] + z_inv * self.a[1] + z2 * self.a[2];
        num / den
    }

    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (self.a[0] + self.a[1] + self.a[2])
    }
}

/// Cascade of biquads forming a digital Butterworth bandpass.
#[derive(Debug, Clone, PartialEq)]
pub struct Butterworth {
    sections: Vec<Biquad>,
}

impl Butterworth {
    /// Design an order-`N` bandpass (2N poles, N sections) with unit gain at
    /// the band centre.
    pub fn bandpass(cfg: &BandpassConfig, fs: u32) -> Result<Self> {
        cfg.validate(fs)?;
        let nyquist = fs as f64 / 2.0;
        // Pre-warp with a normalised design rate of 2 so the bilinear map is z = (4 + s) / (4 - s).
        let warp = |wn: f64| 4.0 * (PI * wn / 2.0).tan();
        let low = warp(cfg.lowcut_hz / nyquist);
        let high = warp(cfg.highcut_hz / nyquist);
        let bw = high - low;
        let w0_sq = low * high;

        let n = cfg.order;
        let mut z_poles = Vec::with_capacity(2 * n);
        for k in 0..n {
            let theta = PI * (2.0 * k as f64 - n as f64 + 1.0) / (2.0 * n as f64);
            let proto = -Complex::from_polar(1.0, theta);
            let half = proto * (bw / 2.0);
            let disc = (half * half - w0_sq).sqrt();
            for s in [half + disc, half - disc] {
                z_poles.push((4.0 + s) / (4.0 - s));
            }
        }

        let tol = 1e-10;
        let mut sections = Vec::with_capacity(n);
        let mut reals = Vec::new();
        for p in &z_poles {
            if p.im > tol {
                sections.push(Biquad {
                    b: [1.0, 0.0, -1.0],
                    a: [1.0, -2.0 * p.re, p.norm_sqr()],
                });
            } else if p.im.abs() <= tol {
                reals.push(p.re);
            }
        }
        reals.sort_by(|a, b| a.total_cmp(b));
        for pair in reals.chunks(2) {
            let (r1, r2) = match *pair {
                [r1, r2] => (r1, r2),
                [r1] => (r1, 0.0),
                _ => continue,
            };
            sections.push(Biquad {
                b: [1.0, 0.0, -1.0],
                a: [1.0, -(r1 + r2), r1 * r2],
            });
        }
        if sections.len() != n {
            return Err(PipelineError::invalid(
                "bandpass",
                format!("pole pairing produced {} sections for order {}", sections.len(), n),
            ));
        }

        let mut filter = Self { sections };
        let centre = 2.0 * (w0_sq.sqrt() / 4.0).atan();
        let gain = filter.response_at(centre).norm();
        if !(gain.is_finite() && gain > 0.0) {
            return Err(PipelineError::invalid("bandpass", "degenerate passband gain"));
        }
        for b in filter.sections[0].b.iter_mut() {
            *b /= gain;
        }
        Ok(filter)
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Complex response at normalised angular frequency `omega` (rad/sample).
    pub fn response_at(&self, omega: f64) -> Complex<f64> {
        let z_inv = Complex::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
    }

    /// Magnitude at `freq_hz` for a signal sampled at `fs`.
    pub fn gain_at(&self, freq_hz: f64, fs: u32) -> f64 {
        self.response_at(2.0 * PI * freq_hz / fs as f64).norm()
    }

    /// Single-pass magnitude response estimated from an `n`-sample impulse
    /// response. Returns `[frequency_hz, magnitude]` pairs up to Nyquist.
    pub fn magnitude_response(&self, fs: u32, n: usize) -> Result<Vec<[f64; 2]>> {
        if n < 2 {
            return Err(PipelineError::invalid("bandpass", "response length below 2"));
        }
        let mut impulse = vec![0.0; n];
        impulse[0] = 1.0;
        let mut state = vec![[0.0; 2]; self.sections.len()];
        let mut buffer = self.run(&impulse, &mut state);
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        let mut spectrum = fft.make_output_vec();
        fft.process(&mut buffer, &mut spectrum)
            .map_err(|e| PipelineError::invalid("bandpass", e.to_string()))?;
        let df = fs as f64 / n as f64;
        Ok(spectrum
            .iter()
            .enumerate()
            .map(|(i, c)| [i as f64 * df, c.norm()])
            .collect())
    }

    /// Steady-state section states for a unit step input.
    fn step_state(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        let mut zi = Vec::with_capacity(self.sections.len());
        for s in &self.sections {
            let g = s.dc_gain();
            let z2 = (s.b[2] - s.a[2] * g) * scale;
            let z1 = (s.b[1] - s.a[1] * g) * scale + z2;
            zi.push([z1, z2]);
            scale *= g;
        }
        zi
    }

    /// Causal pass, transposed direct form II per section.
    fn run(&self, x: &[f64], state: &mut [[f64; 2]]) -> Vec<f64> {
        let mut out = Vec::with_capacity(x.len());
        for &sample in x {
            let mut v = sample;
            for (s, z) in self.sections.iter().zip(state.iter_mut()) {
                let y = s.b[0] * v + z[0];
                z[0] = s.b[1] * v - s.a[1] * y + z[1];
                z[1] = s.b[2] * v - s.a[2] * y;
                v = y;
            }
            out.push(v);
        }
        out
    }

    /// Forward-backward filtering with odd reflection padding of
    /// `3 * (2 * sections + 1)` samples (at most `len - 1`).
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let n = x.len();
        let padlen = (3 * (2 * self.sections.len() + 1)).min(n - 1);
        let ext = odd_extend(x, padlen);
        let zi = self.step_state();

        let mut state = scaled(&zi, ext[0]);
        let mut forward = self.run(&ext, &mut state);
        forward.reverse();
        let mut state = scaled(&zi, forward[0]);
        let mut backward = self.run(&forward, &mut state);
        backward.reverse();
        backward[padlen..padlen + n].to_vec()
    }
}

fn scaled(zi: &[[f64; 2]], x0: f64) -> Vec<[f64; 2]> {
    zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect()
}

fn odd_extend(x: &[f64], padlen: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];
    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));
    ext
}

/// Zero-phase Butterworth bandpass of `signal`.
pub fn bandpass(signal: &Signal, cfg: &BandpassConfig) -> Result<Signal> {
    let filter = Butterworth::bandpass(cfg, signal.fs)?;
    Ok(signal.derive("Filtered", filter.filtfilt(&signal.data)))
}
