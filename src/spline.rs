//! Natural cubic spline interpolation of sparse ball observations.

use crate::error::{Error, Result};
use crate::math::solve_tridiagonal;
use crate::track::{DenseTrack, Track};
use crate::Float;
use nalgebra as na;

/// Piecewise cubic through `(t[i], y[i])` with zero second derivative at both ends.
#[derive(Debug, Clone)]
pub struct NaturalCubicSpline<F: Float> {
    knots: Vec<F>,
    values: Vec<F>,
    // second derivatives at the knots
    m: Vec<F>,
}

impl<F: Float> NaturalCubicSpline<F> {
    /// `knots` must be strictly increasing and at least two long.
    pub fn new(knots: Vec<F>, values: Vec<F>) -> Option<Self> {
        let n = knots.len();
        if n < 2 || values.len() != n {
            return None;
        }

        if knots.windows(2).any(|w| !(w[1] > w[0])) {
            return None;
        }

        let h: Vec<F> = knots.windows(2).map(|w| w[1] - w[0]).collect();
        let mut m = vec![F::zero(); n];

        if n > 2 {
            let two = F::from_f64(2.0)?;
            let six = F::from_f64(6.0)?;

            let inner = n - 2;
            let mut lower = Vec::with_capacity(inner.saturating_sub(1));
            let mut diag = Vec::with_capacity(inner);
            let mut upper = Vec::with_capacity(inner.saturating_sub(1));
            let mut rhs = Vec::with_capacity(inner);

            for i in 1..n - 1 {
                diag.push(two * (h[i - 1] + h[i]));
                rhs.push(
                    six * ((values[i + 1] - values[i]) / h[i]
                        - (values[i] - values[i - 1]) / h[i - 1]),
                );

                if i < n - 2 {
                    upper.push(h[i]);
                    lower.push(h[i]);
                }
            }

            let solved = solve_tridiagonal(&lower, &diag, &upper, &rhs);
            m[1..n - 1].copy_from_slice(&solved);
        }

        Some(Self { knots, values, m })
    }

    /// Evaluates the spline. Outside the knot range the end segments are extended.
    pub fn eval(&self, t: F) -> F {
        let n = self.knots.len();
        let i = match self
            .knots
            .binary_search_by(|k| k.partial_cmp(&t).unwrap_or(std::cmp::Ordering::Less))
        {
            Ok(i) => return self.values[i],
            Err(0) => 0,
            Err(i) if i >= n => n - 2,
            Err(i) => i - 1,
        };

        let six = F::from_f64(6.0).unwrap_or_else(F::one);

        let h = self.knots[i + 1] - self.knots[i];
        let a = self.knots[i + 1] - t;
        let b = t - self.knots[i];

        (self.m[i] * a * a * a + self.m[i + 1] * b * b * b) / (six * h)
            + (self.values[i] / h - self.m[i] * h / six) * a
            + (self.values[i + 1] / h - self.m[i + 1] * h / six) * b
    }
}

/// Reconstructs one ball position per frame in `[first_frame, last_frame]`.
///
/// x and y are fitted independently against the frame number. A single
/// observation yields a one-frame track holding that observation.
pub fn interpolate(track: &Track) -> Result<DenseTrack> {
    if track.is_empty() {
        return Err(Error::EmptyTrack);
    }

    let first = track.first_frame();
    let last = track.last_frame();

    if track.len() == 1 {
        let obs = track.observations()[0];
        return DenseTrack::new(first, vec![obs.point()]);
    }

    let frames = track.frames();
    let sx = NaturalCubicSpline::new(frames.clone(), track.xs()).ok_or(Error::SingularSystem)?;
    let sy = NaturalCubicSpline::new(frames, track.ys()).ok_or(Error::SingularSystem)?;

    let points = (first..=last)
        .map(|f| {
            let t = f as f64;
            na::Point2::new(sx.eval(t), sy.eval(t))
        })
        .collect();

    DenseTrack::new(first, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Observation;

    #[test]
    fn single_observation_is_kept() {
        let track = Track::new(vec![Observation::new(7, 12.5, -3.0)]).unwrap();
        let dense = interpolate(&track).unwrap();

        assert_eq!(dense.len(), 1);
        assert_eq!(dense.first_frame(), 7);
        assert_eq!(dense.points()[0], na::Point2::new(12.5, -3.0));
    }

    #[test]
    fn two_observations_are_linear_and_exact_at_ends() {
        let track = Track::new(vec![
            Observation::new(2, 10.0, 100.0),
            Observation::new(6, 30.0, 60.0),
        ])
        .unwrap();
        let dense = interpolate(&track).unwrap();

        assert_eq!(dense.len(), 5);
        assert_eq!(dense.points()[0], na::Point2::new(10.0, 100.0));
        assert_eq!(dense.points()[4], na::Point2::new(30.0, 60.0));
        assert!((dense.points()[2].x - 20.0).abs() < 1e-9);
        assert!((dense.points()[2].y - 80.0).abs() < 1e-9);
    }

    #[test]
    fn passes_through_every_sample() {
        let obs = vec![
            Observation::new(0, 0.0, 5.0),
            Observation::new(3, 9.0, 1.0),
            Observation::new(4, 4.0, 7.0),
            Observation::new(9, -2.0, 0.5),
        ];
        let track = Track::new(obs.clone()).unwrap();
        let dense = interpolate(&track).unwrap();

        assert_eq!(dense.len(), 10);
        for o in obs {
            assert_eq!(dense.at_frame(o.frame), Some(o.point()));
        }
    }

    #[test]
    fn natural_spline_reproduces_lines() {
        let spline = NaturalCubicSpline::new(vec![0.0, 1.0, 2.5, 4.0], vec![1.0, 3.0, 6.0, 9.0])
            .unwrap();

        for i in 0..=40 {
            let t = i as f64 * 0.1;
            assert!((spline.eval(t) - (1.0 + 2.0 * t)).abs() < 1e-9);
        }
    }

    #[test]
    fn natural_boundary_has_zero_curvature() {
        let spline = NaturalCubicSpline::new(vec![0.0f64, 1.0, 2.0], vec![0.0, 1.0, 0.0]).unwrap();

        // m = [0, -3, 0]: the middle knot carries all the curvature
        assert!((spline.m[1] + 3.0).abs() < 1e-12);
        assert!((spline.eval(0.5) - 0.6875).abs() < 1e-12);
    }

    #[test]
    fn rejects_unordered_knots() {
        assert!(NaturalCubicSpline::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_none());
    }
}
