//! Multinomial logistic regression over landing zones.

use crate::config::TrainingParams;
use crate::court::Zone;
use crate::error::{Error, Result};
use crate::math::{log_sum_exp, softmax};
use crate::optim::Lbfgs;
use nalgebra as na;
use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};
use std::path::Path;

/// Fitted linear decision surface, one row per zone seen during fit.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneClassifier {
    classes: Vec<Zone>,
    coef: na::DMatrix<f64>,
    intercept: na::DVector<f64>,
}

#[derive(Serialize, Deserialize)]
struct ModelState {
    classes: Vec<Zone>,
    n_features: usize,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
}

fn to_matrix(x: ArrayView2<'_, f32>) -> na::DMatrix<f64> {
    na::DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[[i, j]] as f64)
}

struct CrossEntropy<'a> {
    x: &'a na::DMatrix<f64>,
    targets: Vec<usize>,
    n_classes: usize,
    alpha: f64,
}

impl CrossEntropy<'_> {
    fn unpack(&self, theta: &na::DVector<f64>) -> (na::DMatrix<f64>, na::DVector<f64>) {
        let (k, d) = (self.n_classes, self.x.ncols());
        let w = na::DMatrix::from_row_slice(k, d, &theta.as_slice()[..k * d]);
        let b = na::DVector::from_column_slice(&theta.as_slice()[k * d..]);

        (w, b)
    }
}

impl crate::optim::Objective for CrossEntropy<'_> {
    // sum of per-sample negative log-likelihoods + alpha / 2 * |W|^2
    fn evaluate(&self, theta: &na::DVector<f64>) -> (f64, na::DVector<f64>) {
        let (k, d) = (self.n_classes, self.x.ncols());
        let (w, b) = self.unpack(theta);

        let mut scores = self.x * w.transpose();
        let mut loss = 0.0;

        for (i, &t) in self.targets.iter().enumerate() {
            let mut row: Vec<f64> = (0..k).map(|c| scores[(i, c)] + b[c]).collect();
            loss += log_sum_exp(&row) - row[t];

            softmax(&mut row);
            row[t] -= 1.0;
            for c in 0..k {
                scores[(i, c)] = row[c];
            }
        }

        // scores now holds P - Y
        let grad_w = scores.transpose() * self.x + &w * self.alpha;
        let grad_b = scores.row_sum_tr();

        loss += 0.5 * self.alpha * w.norm_squared();

        let mut grad = na::DVector::zeros(k * (d + 1));
        for c in 0..k {
            for j in 0..d {
                grad[c * d + j] = grad_w[(c, j)];
            }
            grad[k * d + c] = grad_b[c];
        }

        (loss, grad)
    }
}

impl ZoneClassifier {
    /// Fits a fresh model. Rows of `x` pair with `y` by position.
    ///
    /// The output width of [`predict_proba`](Self::predict_proba) equals the
    /// number of distinct zones in `y`.
    pub fn fit(x: ArrayView2<'_, f32>, y: &[Zone], params: &TrainingParams) -> Result<Self> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} feature rows for {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();

        if classes.len() < 2 {
            return Err(Error::InsufficientClasses(classes.len()));
        }

        let targets = y
            .iter()
            .map(|z| classes.binary_search(z).unwrap_or_default())
            .collect();

        let xm = to_matrix(x);
        let (k, d) = (classes.len(), xm.ncols());
        let objective = CrossEntropy {
            x: &xm,
            targets,
            n_classes: k,
            alpha: 1.0 / params.inverse_regularization,
        };

        let solver = Lbfgs::new(params.max_iterations, params.tolerance);
        let min = solver.minimize(&objective, na::DVector::zeros(k * (d + 1)));

        if min.converged {
            tracing::debug!(iterations = min.iterations, loss = min.value, "classifier converged");
        } else {
            tracing::warn!(
                iterations = min.iterations,
                loss = min.value,
                "classifier did not converge; increase max_iterations"
            );
        }

        let (coef, intercept) = objective.unpack(&min.x);

        Ok(Self {
            classes,
            coef,
            intercept,
        })
    }

    #[inline]
    pub fn classes(&self) -> &[Zone] {
        &self.classes
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.coef.ncols()
    }

    fn check_dims(&self, x: &ArrayView2<'_, f32>) -> Result<()> {
        if x.ncols() != self.n_features() {
            return Err(Error::FeatureDimension {
                expected: self.n_features(),
                actual: x.ncols(),
            });
        }

        Ok(())
    }

    /// Raw class scores, `(n_samples, n_classes)`.
    pub fn decision_function(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f64>> {
        self.check_dims(&x)?;

        let scores = to_matrix(x) * self.coef.transpose();
        let k = self.classes.len();

        Ok(Array2::from_shape_fn((x.nrows(), k), |(i, c)| {
            scores[(i, c)] + self.intercept[c]
        }))
    }

    /// Probability rows over [`classes`](Self::classes), each summing to one.
    pub fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f64>> {
        let mut scores = self.decision_function(x)?;

        for mut row in scores.rows_mut() {
            if let Some(values) = row.as_slice_mut() {
                softmax(values);
            } else {
                let mut values = row.to_vec();
                softmax(&mut values);
                row.assign(&Array1::from(values));
            }
        }

        Ok(scores)
    }

    pub fn predict(&self, x: ArrayView2<'_, f32>) -> Result<Vec<Zone>> {
        let scores = self.decision_function(x)?;

        Ok(scores
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (i, &v)| {
                        if v > acc.1 {
                            (i, v)
                        } else {
                            acc
                        }
                    })
                    .0;

                self.classes[best]
            })
            .collect())
    }

    /// Fraction of samples whose predicted zone equals the label.
    pub fn score(&self, x: ArrayView2<'_, f32>, y: &[Zone]) -> Result<f64> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} feature rows for {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let hits = self
            .predict(x)?
            .iter()
            .zip(y)
            .filter(|(p, t)| p == t)
            .count();

        Ok(hits as f64 / y.len() as f64)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let state = ModelState {
            classes: self.classes.clone(),
            n_features: self.n_features(),
            coef: self
                .coef
                .row_iter()
                .map(|r| r.iter().copied().collect())
                .collect(),
            intercept: self.intercept.iter().copied().collect(),
        };

        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), &state)?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let state: ModelState = serde_json::from_reader(std::io::BufReader::new(file))?;

        let k = state.classes.len();
        if k < 2 {
            return Err(Error::InsufficientClasses(k));
        }

        if state.coef.len() != k
            || state.intercept.len() != k
            || state.coef.iter().any(|r| r.len() != state.n_features)
        {
            return Err(Error::ShapeMismatch(format!(
                "model file {} has inconsistent coefficient shapes",
                path.display()
            )));
        }

        let flat: Vec<f64> = state.coef.into_iter().flatten().collect();

        Ok(Self {
            classes: state.classes,
            coef: na::DMatrix::from_row_slice(k, state.n_features, &flat),
            intercept: na::DVector::from_vec(state.intercept),
        })
    }
}
