use crate::config::SavGolConfig;
use crate::error::{PipelineError, Result};
use crate::signal::Signal;

/// Convolution weights producing the `deriv`-th derivative at the centre of
/// a `window`-long least-squares polynomial fit (unit sample spacing).
pub fn savgol_coefficients(cfg: &SavGolConfig) -> Result<Vec<f64>> {
    cfg.validate()?;
    let half = (cfg.window / 2) as isize;
    let positions: Vec<f64> = (-half..=half).map(|j| j as f64).collect();
    let terms = cfg.polyorder + 1;

    let mut normal = vec![vec![0.0; terms]; terms];
    for &t in &positions {
        for (r, row) in normal.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell += t.powi((r + c) as i32);
            }
        }
    }
    let mut unit = vec![0.0; terms];
    unit[cfg.deriv] = 1.0;
    let u = solve(normal, unit)?;
    let scale = factorial(cfg.deriv);
    Ok(positions
        .iter()
        .map(|&t| scale * (0..terms).map(|k| u[k] * t.powi(k as i32)).sum::<f64>())
        .collect())
}

/// Savitzky–Golay derivative. Interior samples use the sliding fit; the
/// first and last `window / 2` samples are evaluated on a polynomial fitted
/// to the first or last full window.
pub fn derivative(signal: &Signal, cfg: &SavGolConfig) -> Result<Signal> {
    let coeffs = savgol_coefficients(cfg)?;
    let data = &signal.data;
    let n = data.len();
    let w = cfg.window;
    if n < w {
        return Err(PipelineError::invalid(
            "derivative",
            format!("window length {} exceeds signal length {}", w, n),
        ));
    }
    let half = w / 2;
    let mut out = vec![0.0; n];
    for i in half..n - half {
        out[i] = coeffs
            .iter()
            .zip(&data[i - half..=i + half])
            .map(|(c, x)| c * x)
            .sum();
    }

    let head = polyfit(&data[..w], cfg.polyorder)?;
    for (i, slot) in out.iter_mut().enumerate().take(half) {
        *slot = poly_derivative(&head, cfg.deriv, i as f64 - half as f64);
    }
    let tail = polyfit(&data[n - w..], cfg.polyorder)?;
    for i in n - half..n {
        let t = (i - (n - w)) as f64 - half as f64;
        out[i] = poly_derivative(&tail, cfg.deriv, t);
    }
    Ok(signal.derive("Derivative", out))
}

/// Least-squares polynomial over positions centred on the window middle.
fn polyfit(ys: &[f64], order: usize) -> Result<Vec<f64>> {
    let half = (ys.len() / 2) as f64;
    let terms = order + 1;
    let mut normal = vec![vec![0.0; terms]; terms];
    let mut rhs = vec![0.0; terms];
    for (i, &y) in ys.iter().enumerate() {
        let t = i as f64 - half;
        for r in 0..terms {
            rhs[r] += y * t.powi(r as i32);
            for c in 0..terms {
                normal[r][c] += t.powi((r + c) as i32);
            }
        }
    }
    solve(normal, rhs)
}

fn poly_derivative(coeffs: &[f64], deriv: usize, t: f64) -> f64 {
    coeffs
        .iter()
        .enumerate()
        .skip(deriv)
        .map(|(k, c)| c * falling_factorial(k, deriv) * t.powi((k - deriv) as i32))
        .sum()
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

fn falling_factorial(k: usize, m: usize) -> f64 {
    (0..m).map(|j| (k - j) as f64).product()
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(PipelineError::invalid("derivative", "singular polynomial fit"));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_derivative_weights_match_reference() {
        // Cubic fit over five points reduces to the classic 5-point stencil.
        let coeffs = savgol_coefficients(&SavGolConfig::new(3, 5, 1)).expect("coeffs");
        let expected = [1.0 / 12.0, -8.0 / 12.0, 0.0, 8.0 / 12.0, -1.0 / 12.0];
        for (c, e) in coeffs.iter().zip(expected.iter()) {
            assert!((c - e).abs() < 1e-9, "{c} vs {e}");
        }
    }

    #[test]
    fn smoothing_weights_sum_to_one() {
        let coeffs = savgol_coefficients(&SavGolConfig::new(2, 7, 0)).expect("coeffs");
        assert!((coeffs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn derivative_of_quadratic_is_exact_everywhere() {
        let data: Vec<f64> = (0..50).map(|i| 0.5 * (i as f64).powi(2) - 3.0 * i as f64).collect();
        let sig = Signal::new("q", 100, data);
        let out = derivative(&sig, &SavGolConfig::new(3, 5, 1)).expect("derivative");
        assert_eq!(out.len(), 50);
        for (i, v) in out.data.iter().enumerate() {
            assert!((v - (i as f64 - 3.0)).abs() < 1e-6, "sample {i}: {v}");
        }
    }

    #[test]
    fn rejects_window_not_above_polyorder() {
        let sig = Signal::new("x", 100, vec![0.0; 20]);
        let err = derivative(&sig, &SavGolConfig::new(3, 3, 1)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { .. }));
    }

    #[test]
    fn rejects_signal_shorter_than_window() {
        let sig = Signal::new("x", 100, vec![0.0; 3]);
        assert!(derivative(&sig, &SavGolConfig::new(3, 5, 1)).is_err());
    }
}
