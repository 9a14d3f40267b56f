//! Synthetic multi-channel recordings for demos and end-to-end tests.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;

/// R-to-J delay of the simulated BCG (seconds).
pub const BCG_DELAY_S: f64 = 0.225;
/// R-to-foot delay of the simulated PPG (seconds).
pub const PPG_DELAY_S: f64 = 0.200;

pub struct SimulationSpec {
    pub fs: u32,
    pub sessions: usize,
    pub seconds: f64,
    pub base_hr_bpm: f64,
    pub seed: u64,
}

/// Column-oriented output, one row per sample, sessions back to back.
pub struct Simulated {
    pub activity: Vec<f64>,
    pub ecg: Vec<f64>,
    pub bcg: Vec<f64>,
    pub ppg: Vec<f64>,
    pub acc_x: Vec<f64>,
    pub acc_y: Vec<f64>,
    pub acc_z: Vec<f64>,
}

impl Simulated {
    pub fn columns(&self) -> [(&'static str, &[f64]); 7] {
        [
            ("activity", self.activity.as_slice()),
            ("ecg", self.ecg.as_slice()),
            ("bcg", self.bcg.as_slice()),
            ("ppg", self.ppg.as_slice()),
            ("acc_x", self.acc_x.as_slice()),
            ("acc_y", self.acc_y.as_slice()),
            ("acc_z", self.acc_z.as_slice()),
        ]
    }
}

pub fn simulate(spec: &SimulationSpec) -> Simulated {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let fs = spec.fs as f64;
    let len = (spec.seconds * fs) as usize;
    let mut out = Simulated {
        activity: Vec::new(),
        ecg: Vec::new(),
        bcg: Vec::new(),
        ppg: Vec::new(),
        acc_x: Vec::new(),
        acc_y: Vec::new(),
        acc_z: Vec::new(),
    };
    for session in 0..spec.sessions {
        let hr = spec.base_hr_bpm + 8.0 * session as f64;
        let beats = beat_times(&mut rng, hr, spec.seconds);
        for i in 0..len {
            let t = i as f64 / fs;
            let mut ecg = 0.05 * (2.0 * PI * 0.3 * t).sin();
            let mut bcg = 3.0 * (2.0 * PI * 0.25 * t).sin();
            let mut ppg = 2.0 * (2.0 * PI * 0.15 * t).sin();
            for &b in &beats {
                let dt = t - b;
                ecg += 1.2 * gauss(dt, 0.008) - 0.15 * gauss(dt - 0.025, 0.01);
                let dj = dt - BCG_DELAY_S;
                bcg += gauss(dj, 0.06) * (2.0 * PI * 4.0 * dj).cos();
                let dp = dt - PPG_DELAY_S;
                if dp >= 0.0 {
                    ppg += (1.0 - (-dp / 0.05).exp()) * (-dp / 0.4).exp();
                }
            }
            let noise = |rng: &mut StdRng, a: f64| rng.gen_range(-a..a);
            out.activity.push((session + 1) as f64);
            out.ecg.push(ecg + noise(&mut rng, 0.02));
            out.ppg.push(ppg + noise(&mut rng, 0.01));
            // Vertical axis sits below 1/e g so the entropy transform keeps polarity.
            out.acc_z.push(0.2 + 0.01 * bcg + noise(&mut rng, 0.0005));
            out.acc_x.push(noise(&mut rng, 0.0005));
            out.acc_y.push(noise(&mut rng, 0.0005));
            out.bcg.push(bcg + noise(&mut rng, 0.05));
        }
    }
    out
}

fn gauss(dt: f64, sigma: f64) -> f64 {
    (-0.5 * (dt / sigma).powi(2)).exp()
}

/// Beat onsets with a few percent RR jitter, leaving room after the last
/// beat for every downstream search window.
fn beat_times(rng: &mut StdRng, hr_bpm: f64, seconds: f64) -> Vec<f64> {
    let rr = 60.0 / hr_bpm;
    let mut beats = Vec::new();
    if !(rr > 0.0 && rr.is_finite()) {
        return beats;
    }
    let mut t = 0.5;
    while t + 0.8 < seconds {
        beats.push(t);
        t += rr * (1.0 + rng.gen_range(-0.03..0.03));
    }
    beats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_are_back_to_back_and_seeded() {
        let spec = SimulationSpec {
            fs: 500,
            sessions: 2,
            seconds: 4.0,
            base_hr_bpm: 70.0,
            seed: 3,
        };
        let a = simulate(&spec);
        let b = simulate(&spec);
        assert_eq!(a.ecg.len(), 4000);
        assert_eq!(a.activity[0], 1.0);
        assert_eq!(a.activity[3999], 2.0);
        assert_eq!(a.bcg, b.bcg);
        assert!(a.columns().iter().all(|(_, c)| c.len() == 4000));
    }

    #[test]
    fn non_positive_heart_rate_yields_no_beats() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(beat_times(&mut rng, 0.0, 10.0).is_empty());
        assert!(beat_times(&mut rng, -70.0, 10.0).is_empty());
        assert_eq!(beat_times(&mut rng, 60.0, 10.0).len(), 9);
    }
}
