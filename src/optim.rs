//! Limited-memory BFGS for smooth unconstrained objectives.

use nalgebra as na;
use std::collections::VecDeque;

/// Objective value and gradient at a point.
pub trait Objective {
    fn evaluate(&self, x: &na::DVector<f64>) -> (f64, na::DVector<f64>);
}

impl<F> Objective for F
where
    F: Fn(&na::DVector<f64>) -> (f64, na::DVector<f64>),
{
    #[inline]
    fn evaluate(&self, x: &na::DVector<f64>) -> (f64, na::DVector<f64>) {
        self(x)
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: na::DVector<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

struct Correction {
    s: na::DVector<f64>,
    y: na::DVector<f64>,
    rho: f64,
}

// newest first, oldest dropped once full
struct History {
    pairs: VecDeque<Correction>,
    capacity: usize,
}

impl History {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            pairs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, item: Correction) {
        if self.pairs.len() == self.capacity {
            self.pairs.pop_back();
        }

        self.pairs.push_front(item);
    }

    fn clear(&mut self) {
        self.pairs.clear()
    }

    /// Two-loop recursion: approximate inverse Hessian applied to `g`.
    fn apply(&self, g: &na::DVector<f64>) -> na::DVector<f64> {
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(self.pairs.len());

        for c in self.pairs.iter() {
            let a = c.rho * c.s.dot(&q);
            q.axpy(-a, &c.y, 1.0);
            alphas.push(a);
        }

        if let Some(newest) = self.pairs.front() {
            let gamma = newest.s.dot(&newest.y) / newest.y.dot(&newest.y);
            q *= gamma;
        }

        for (c, a) in self.pairs.iter().zip(alphas).rev() {
            let b = c.rho * c.y.dot(&q);
            q.axpy(a - b, &c.s, 1.0);
        }

        q
    }
}

#[derive(Debug, Clone)]
pub struct Lbfgs {
    pub memory: usize,
    pub max_iterations: usize,
    /// Stop once `max |grad| <= tolerance`.
    pub tolerance: f64,
}

impl Lbfgs {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            memory: 10,
            max_iterations,
            tolerance,
        }
    }

    pub fn minimize<O: Objective>(&self, objective: &O, x0: na::DVector<f64>) -> Minimum {
        const ARMIJO: f64 = 1e-4;
        const MAX_BACKTRACKS: usize = 50;

        let mut x = x0;
        let (mut fx, mut g) = objective.evaluate(&x);
        let mut history = History::with_capacity(self.memory.max(1));

        let mut iterations = 0;
        let mut converged = g.amax() <= self.tolerance;

        while !converged && iterations < self.max_iterations {
            iterations += 1;

            let mut d = if history.pairs.is_empty() {
                -&g / g.norm().max(1.0)
            } else {
                -history.apply(&g)
            };

            let mut slope = d.dot(&g);
            if !(slope < 0.0) {
                // not a descent direction: restart from steepest descent
                history.clear();
                d = -&g / g.norm().max(1.0);
                slope = d.dot(&g);
            }

            let mut step = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let candidate = &x + &d * step;
                let (fc, gc) = objective.evaluate(&candidate);

                if fc.is_finite() && fc <= fx + ARMIJO * step * slope {
                    accepted = Some((candidate, fc, gc));
                    break;
                }

                step *= 0.5;
            }

            let (x_new, f_new, g_new) = match accepted {
                Some(v) => v,
                None => break,
            };

            let s = &x_new - &x;
            let y = &g_new - &g;
            let sy = s.dot(&y);
            if sy > 1e-10 {
                history.push(Correction { s, y, rho: 1.0 / sy });
            }

            x = x_new;
            fx = f_new;
            g = g_new;

            converged = g.amax() <= self.tolerance;
        }

        Minimum {
            x,
            value: fx,
            iterations,
            converged,
        }
    }
}
