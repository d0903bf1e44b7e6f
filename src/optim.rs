//! The two optimizers the benchmarked classifiers are configured with.

use crate::error::Result;
use crate::layers::{mismatch, Param};
use ndarray::{ArrayD, Zip};

/// How a classifier wants to be optimized.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OptimizerConfig {
    Sgd { lr: f32, momentum: f32 },
    Adam { lr: f32, betas: (f32, f32), eps: f32 },
}

impl OptimizerConfig {
    pub fn adam(lr: f32) -> OptimizerConfig {
        OptimizerConfig::Adam {
            lr,
            betas: (0.9, 0.999),
            eps: 1e-8,
        }
    }

    pub fn build(self) -> Box<dyn Optimizer> {
        match self {
            OptimizerConfig::Sgd { lr, momentum } => Box::new(Sgd::new(lr, momentum)),
            OptimizerConfig::Adam { lr, betas, eps } => Box::new(Adam::new(lr, betas, eps)),
        }
    }
}

pub trait Optimizer {
    /// Updates `params` in place from their latest gradients. Parameters must be passed in the
    /// same order on every step.
    fn step(&mut self, params: Vec<Param<'_>>) -> Result<()>;
}

/// Lazily creates one zeroed state tensor per parameter and checks that shapes did not change.
fn init_state(state: &mut Vec<ArrayD<f32>>, params: &[Param<'_>]) -> Result<()> {
    if state.is_empty() {
        *state = params
            .iter()
            .map(|p| ArrayD::zeros(p.value.raw_dim()))
            .collect();
    }
    let consistent = state.len() == params.len()
        && state
            .iter()
            .zip(params.iter())
            .all(|(s, p)| s.shape() == p.value.shape() && p.grad.shape() == p.value.shape());
    if !consistent {
        return Err(mismatch());
    }
    Ok(())
}

/// Stochastic gradient descent with classical momentum.
pub struct Sgd {
    lr: f32,
    momentum: f32,
    velocity: Vec<ArrayD<f32>>,
    initialized: bool,
}

impl Sgd {
    pub fn new(lr: f32, momentum: f32) -> Sgd {
        Sgd {
            lr,
            momentum,
            velocity: Vec::new(),
            initialized: false,
        }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: Vec<Param<'_>>) -> Result<()> {
        init_state(&mut self.velocity, &params)?;
        let (lr, momentum) = (self.lr, self.momentum);
        // The velocity starts out as the first gradient
        let first = !self.initialized;
        for (param, velocity) in params.into_iter().zip(self.velocity.iter_mut()) {
            Zip::from(&mut *param.value)
                .and(param.grad)
                .and(velocity)
                .for_each(|w, &g, v| {
                    *v = if first { g } else { momentum * *v + g };
                    *w -= lr * *v;
                });
        }
        self.initialized = true;
        Ok(())
    }
}

/// Adam with bias-corrected moment estimates.
pub struct Adam {
    lr: f32,
    betas: (f32, f32),
    eps: f32,
    t: i32,
    m: Vec<ArrayD<f32>>,
    v: Vec<ArrayD<f32>>,
}

impl Adam {
    pub fn new(lr: f32, betas: (f32, f32), eps: f32) -> Adam {
        Adam {
            lr,
            betas,
            eps,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<Param<'_>>) -> Result<()> {
        init_state(&mut self.m, &params)?;
        init_state(&mut self.v, &params)?;
        self.t += 1;
        let (b1, b2) = self.betas;
        let (lr, eps) = (self.lr, self.eps);
        let correction1 = 1. - b1.powi(self.t);
        let correction2 = 1. - b2.powi(self.t);

        for ((param, m), v) in params
            .into_iter()
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            Zip::from(&mut *param.value)
                .and(param.grad)
                .and(m)
                .and(v)
                .for_each(|w, &g, m, v| {
                    *m = b1 * *m + (1. - b1) * g;
                    *v = b2 * *v + (1. - b2) * g * g;
                    let m_hat = *m / correction1;
                    let v_hat = *v / correction2;
                    *w -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
        Ok(())
    }
}
