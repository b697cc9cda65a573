use crate::Float;
use nalgebra as na;

/// Least-squares solution of `a * x = b` through a thin QR decomposition.
///
/// Requires `a.nrows() >= a.ncols()`. Returns `None` when R is singular or the
/// solution is not finite.
pub fn least_squares(a: na::DMatrix<f64>, b: &na::DVector<f64>) -> Option<na::DVector<f64>> {
    if a.nrows() < a.ncols() || a.nrows() != b.len() {
        return None;
    }

    let qr_result = a.qr();
    let qty = qr_result.q().transpose() * b;
    let r = qr_result.r();

    let scale = r.diagonal().amax();
    let eps = scale * 1e-12;
    if scale == 0.0 || r.diagonal().iter().any(|d| d.abs() <= eps) {
        return None;
    }

    let beta_hat = r.solve_upper_triangular(&qty)?;

    if beta_hat.iter().all(|v| v.is_finite()) {
        Some(beta_hat)
    } else {
        None
    }
}

/// Thomas algorithm for a tridiagonal system.
///
/// `lower[i]` couples row `i + 1` to column `i`, `upper[i]` couples row `i`
/// to column `i + 1`. The system must be diagonally dominant.
pub fn solve_tridiagonal<F: Float>(lower: &[F], diag: &[F], upper: &[F], rhs: &[F]) -> Vec<F> {
    let n = diag.len();
    if n == 0 {
        return Vec::new();
    }

    let mut c = vec![F::zero(); n];
    let mut d = vec![F::zero(); n];

    c[0] = if n > 1 { upper[0] / diag[0] } else { F::zero() };
    d[0] = rhs[0] / diag[0];

    for i in 1..n {
        let m = diag[i] - lower[i - 1] * c[i - 1];
        if i < n - 1 {
            c[i] = upper[i] / m;
        }
        d[i] = (rhs[i] - lower[i - 1] * d[i - 1]) / m;
    }

    let mut x = d;
    for i in (0..n - 1).rev() {
        let next = x[i + 1];
        x[i] = x[i] - c[i] * next;
    }

    x
}

#[inline]
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }

    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// In-place softmax, shifted by the maximum for stability.
pub fn softmax(values: &mut [f64]) {
    let lse = log_sum_exp(values);
    values.iter_mut().for_each(|v| *v = (*v - lse).exp());
}
